//! Trajectory recorder.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{CompressionType, FrameIndex, TrajectoryHeader, compress_lz4, encode_frame};
use crate::compute::Cube;

/// Configuration for trajectory recording.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub compression: CompressionType,
    /// Keep every Nth offered frame, starting with the first (1 = all).
    pub frame_skip: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            frame_skip: 1,
        }
    }
}

/// Writes recorded-class frames to a `.rtrj` file.
///
/// Usage:
/// ```ignore
/// let mut recorder = TrajectoryRecorder::new("run.rtrj", 64, 64, 2, Default::default())?;
/// recorder.record_frame(simulation.recorded())?;
/// while !simulation.is_finished() {
///     simulation.step()?;
///     recorder.record_frame(simulation.recorded())?;
/// }
/// recorder.finalize()?;
/// ```
pub struct TrajectoryRecorder {
    writer: BufWriter<File>,
    header: TrajectoryHeader,
    frame_indices: Vec<FrameIndex>,
    frame_skip: u32,
    offered: u64,
    encode_buffer: Vec<u8>,
}

impl TrajectoryRecorder {
    pub fn new<P: AsRef<Path>>(
        path: P,
        width: usize,
        height: usize,
        recorded_class: usize,
        config: RecorderConfig,
    ) -> io::Result<Self> {
        let dimension = |what: &str, v: usize| {
            u32::try_from(v).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{what} {v} does not fit the trajectory header"),
                )
            })
        };

        let header = TrajectoryHeader {
            width: dimension("width", width)?,
            height: dimension("height", height)?,
            frame_count: 0,
            recorded_class: dimension("recorded class", recorded_class)?,
            compression: config.compression,
        };

        let mut writer = BufWriter::new(File::create(path)?);
        // Placeholder; rewritten with the final frame count on finalize.
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            encode_buffer: Vec::with_capacity(header.frame_size()),
            header,
            frame_indices: Vec::new(),
            frame_skip: config.frame_skip.max(1),
            offered: 0,
        })
    }

    /// Offer one frame. Returns true if it was written.
    pub fn record_frame(&mut self, frame: &[f64]) -> io::Result<bool> {
        if frame.len() != self.header.cells() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame has {} values, expected {}",
                    frame.len(),
                    self.header.cells()
                ),
            ));
        }

        let keep = self.offered % self.frame_skip as u64 == 0;
        self.offered += 1;
        if !keep {
            return Ok(false);
        }

        let offset = self.writer.stream_position()?;
        encode_frame(frame, &mut self.encode_buffer);

        let size = match self.header.compression {
            CompressionType::None => {
                self.writer.write_all(&self.encode_buffer)?;
                self.encode_buffer.len()
            }
            CompressionType::Lz4 => {
                let compressed = compress_lz4(&self.encode_buffer)?;
                self.writer.write_all(&compressed)?;
                compressed.len()
            }
        };

        self.frame_indices.push(FrameIndex {
            offset,
            size: size as u64,
        });
        Ok(true)
    }

    /// Offer every layer of a trajectory cube in order.
    pub fn record_trajectory(&mut self, trajectory: &Cube) -> io::Result<u64> {
        let mut written = 0;
        for k in 0..trajectory.layers {
            if self.record_frame(trajectory.layer(k))? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write the index table and the final header.
    pub fn finalize(mut self) -> io::Result<TrajectoryStats> {
        let index_offset = self.writer.stream_position()?;
        for index in &self.frame_indices {
            index.write_to(&mut self.writer)?;
        }

        self.header.frame_count = self.frame_indices.len() as u64;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        let frame_count = self.header.frame_count;
        let data_bytes = index_offset.saturating_sub(TrajectoryHeader::SIZE as u64);
        Ok(TrajectoryStats {
            frame_count,
            total_bytes: index_offset + frame_count * FrameIndex::SIZE as u64,
            average_frame_size: if frame_count > 0 {
                data_bytes / frame_count
            } else {
                0
            },
            compression: self.header.compression,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frame_indices.len() as u64
    }
}

/// Summary of a finished recording.
#[derive(Debug, Clone)]
pub struct TrajectoryStats {
    pub frame_count: u64,
    /// Total file size in bytes.
    pub total_bytes: u64,
    pub average_frame_size: u64,
    pub compression: CompressionType,
}

impl std::fmt::Display for TrajectoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/frame avg ({:?} compression)",
            self.frame_count, self.total_bytes, self.average_frame_size, self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_recorder_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.rtrj");

        let mut recorder = TrajectoryRecorder::new(&path, 4, 3, 1, Default::default()).unwrap();
        let frame = vec![2.0; 12];
        for _ in 0..10 {
            assert!(recorder.record_frame(&frame).unwrap());
        }
        let stats = recorder.finalize().unwrap();
        assert_eq!(stats.frame_count, 10);
        assert_eq!(stats.average_frame_size, 12 * 8);

        let len = fs::metadata(&path).unwrap().len();
        assert_eq!(len, stats.total_bytes);
        assert_eq!(
            len,
            (TrajectoryHeader::SIZE + 10 * (96 + FrameIndex::SIZE)) as u64
        );
    }

    #[test]
    fn test_recorder_frame_skip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skip.rtrj");
        let config = RecorderConfig {
            frame_skip: 5,
            ..Default::default()
        };

        let mut recorder = TrajectoryRecorder::new(&path, 2, 2, 0, config).unwrap();
        let frame = [0.0; 4];
        // Frames 0, 5, 10, 15 are kept.
        for _ in 0..20 {
            recorder.record_frame(&frame).unwrap();
        }
        assert_eq!(recorder.finalize().unwrap().frame_count, 4);
    }

    #[test]
    fn test_wrong_frame_length_rejected() {
        let dir = tempdir().unwrap();
        let mut recorder =
            TrajectoryRecorder::new(dir.path().join("bad.rtrj"), 3, 3, 0, Default::default())
                .unwrap();
        let err = recorder.record_frame(&[1.0; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(recorder.frames_written(), 0);
    }

    #[test]
    fn test_record_trajectory_cube() {
        let dir = tempdir().unwrap();
        let mut recorder =
            TrajectoryRecorder::new(dir.path().join("cube.rtrj"), 2, 3, 0, Default::default())
                .unwrap();
        let trajectory = Cube::zeros(2, 3, 6);
        assert_eq!(recorder.record_trajectory(&trajectory).unwrap(), 6);
    }
}
