//! Trajectory persistence for range simulations.
//!
//! Recorded-class frames are stored in the `.rtrj` format:
//!
//! ```text
//! Header (40 bytes):
//!   Magic: "RTRJ" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression in the low 4 bits)
//!   Width: u32
//!   Height: u32
//!   Frame count: u64
//!   Recorded class: u32
//!   Reserved: 12 bytes
//!
//! Frame data (variable):
//!   Each frame is width * height little-endian f64 values, x-major,
//!   optionally LZ4 compressed
//!
//! Frame index table (frame_count * 16 bytes, at the end of the file):
//!   Offset: u64
//!   Stored size: u64
//! ```

mod format;
mod reader;
mod recorder;

pub use format::{
    CompressionType, FrameIndex, TRAJECTORY_MAGIC, TRAJECTORY_VERSION, TrajectoryHeader,
};
pub use reader::{FrameIterator, TrajectoryReader};
pub use recorder::{RecorderConfig, TrajectoryRecorder, TrajectoryStats};
