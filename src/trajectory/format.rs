//! Binary format definitions for trajectory files.

use std::io::{self, Read, Write};

/// Magic bytes identifying a trajectory file.
pub const TRAJECTORY_MAGIC: &[u8; 4] = b"RTRJ";

/// Current format version.
pub const TRAJECTORY_VERSION: u16 = 1;

/// Compression type for frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// Raw little-endian f64 values.
    #[default]
    None = 0,
    /// LZ4 block compression (requires the `lz4` feature).
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

/// Trajectory file header.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryHeader {
    /// Grid extent along x.
    pub width: u32,
    /// Grid extent along y.
    pub height: u32,
    pub frame_count: u64,
    /// Class the frames were recorded from.
    pub recorded_class: u32,
    pub compression: CompressionType,
}

impl TrajectoryHeader {
    /// Magic(4) + Version(2) + Flags(2) + Width(4) + Height(4) +
    /// FrameCount(8) + RecordedClass(4) + Reserved(12) = 40
    pub const SIZE: usize = 40;

    /// Size of one uncompressed frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 8
    }

    /// Values per frame.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(TRAJECTORY_MAGIC)?;
        w.write_all(&TRAJECTORY_VERSION.to_le_bytes())?;
        w.write_all(&(self.compression as u16).to_le_bytes())?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.frame_count.to_le_bytes())?;
        w.write_all(&self.recorded_class.to_le_bytes())?;
        w.write_all(&[0u8; 12])?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != TRAJECTORY_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid RTRJ magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != TRAJECTORY_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported RTRJ version: {version}"),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = u16::from_le_bytes(buf2);
        let compression = CompressionType::from_u8((flags & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown compression type in flags {flags:#06x}"),
            )
        })?;

        r.read_exact(&mut buf4)?;
        let width = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let height = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let frame_count = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let recorded_class = u32::from_le_bytes(buf4);

        let mut reserved = [0u8; 12];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            width,
            height,
            frame_count,
            recorded_class,
            compression,
        })
    }
}

/// Index entry for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    /// Byte offset from start of file.
    pub offset: u64,
    /// Stored size in bytes.
    pub size: u64,
}

impl FrameIndex {
    pub const SIZE: usize = 16;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.offset.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf8)?;
        let offset = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf8)?;
        let size = u64::from_le_bytes(buf8);

        Ok(Self { offset, size })
    }
}

/// Encode values as little-endian bytes into `out`.
pub fn encode_frame(data: &[f64], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(data.len() * 8);
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian bytes into `output`.
pub fn decode_frame(bytes: &[u8], output: &mut [f64]) -> io::Result<()> {
    if bytes.len() != output.len() * 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame size mismatch: {} bytes vs {} values",
                bytes.len(),
                output.len()
            ),
        ));
    }
    for (v, chunk) in output.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut b = [0u8; 8];
        b.copy_from_slice(chunk);
        *v = f64::from_le_bytes(b);
    }
    Ok(())
}

#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    Ok(lz4_flex::compress_prepend_size(data))
}

#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
fn lz4_unavailable() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 compression requires the `lz4` feature",
    )
}
