//! Trajectory reader.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{CompressionType, FrameIndex, TrajectoryHeader, decode_frame, decompress_lz4};
use crate::compute::{Cube, Matrix};

/// Random-access reader for `.rtrj` files.
///
/// Usage:
/// ```ignore
/// let mut reader = TrajectoryReader::open("run.rtrj")?;
/// let last = reader.read_frame(reader.frame_count() - 1)?;
/// let everything = reader.read_all()?;
/// ```
pub struct TrajectoryReader {
    reader: BufReader<File>,
    header: TrajectoryHeader,
    frame_indices: Vec<FrameIndex>,
}

impl TrajectoryReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let header = TrajectoryHeader::read_from(&mut reader)?;

        // The index table sits at the end of the file.
        let file_len = reader.seek(SeekFrom::End(0))?;
        let index_start = header
            .frame_count
            .checked_mul(FrameIndex::SIZE as u64)
            .and_then(|table| file_len.checked_sub(table))
            .filter(|&start| start >= TrajectoryHeader::SIZE as u64)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "File too short for {} frame index entries",
                        header.frame_count
                    ),
                )
            })?;
        reader.seek(SeekFrom::Start(index_start))?;

        let mut frame_indices = Vec::with_capacity(header.frame_count as usize);
        for _ in 0..header.frame_count {
            let index = FrameIndex::read_from(&mut reader)?;
            let end = index.offset.checked_add(index.size);
            if end.is_none_or(|end| end > index_start) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Frame index entry points past frame data",
                ));
            }
            frame_indices.push(index);
        }

        log::debug!(
            "opened trajectory: {}x{}, {} frames of class {}",
            header.width,
            header.height,
            header.frame_count,
            header.recorded_class
        );

        Ok(Self {
            reader,
            header,
            frame_indices,
        })
    }

    pub fn header(&self) -> &TrajectoryHeader {
        &self.header
    }

    pub fn frame_count(&self) -> u64 {
        self.header.frame_count
    }

    /// Grid extent, (x, y).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.width as usize, self.header.height as usize)
    }

    pub fn recorded_class(&self) -> usize {
        self.header.recorded_class as usize
    }

    /// Read one frame as a `width x height` matrix.
    pub fn read_frame(&mut self, frame_index: u64) -> io::Result<Matrix> {
        let (width, height) = self.dimensions();
        let mut frame = Matrix::zeros(width, height);
        self.read_frame_into(frame_index, &mut frame.data)?;
        Ok(frame)
    }

    /// Read one frame into a caller-provided buffer of `width * height`
    /// values.
    pub fn read_frame_into(&mut self, frame_index: u64, output: &mut [f64]) -> io::Result<()> {
        if frame_index >= self.header.frame_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame index {frame_index} out of range ({} frames)",
                    self.header.frame_count
                ),
            ));
        }

        let index = self.frame_indices[frame_index as usize];
        self.reader.seek(SeekFrom::Start(index.offset))?;
        let mut data = vec![0u8; index.size as usize];
        self.reader.read_exact(&mut data)?;

        let raw = match self.header.compression {
            CompressionType::None => data,
            CompressionType::Lz4 => decompress_lz4(&data)?,
        };
        decode_frame(&raw, output)
    }

    /// Read every frame into a `width x height x frame_count` cube.
    pub fn read_all(&mut self) -> io::Result<Cube> {
        let (width, height) = self.dimensions();
        let frames = self.header.frame_count as usize;
        let mut cube = Cube::zeros(width, height, frames);
        for k in 0..frames {
            self.read_frame_into(k as u64, cube.layer_mut(k))?;
        }
        Ok(cube)
    }

    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator {
            reader: self,
            current: 0,
        }
    }
}

/// Iterator over trajectory frames.
pub struct FrameIterator<'a> {
    reader: &'a mut TrajectoryReader,
    current: u64,
}

impl Iterator for FrameIterator<'_> {
    type Item = io::Result<Matrix>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.reader.frame_count() {
            return None;
        }
        let result = self.reader.read_frame(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.reader.frame_count() - self.current) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIterator<'_> {}
