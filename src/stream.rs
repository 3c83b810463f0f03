//! Per-item output streams
//!
//! Every item that produces bytes gets exactly one [`ItemStream`]: a sink
//! (discard, stdout or a destination file) optionally wrapped by a CRC-32
//! layer. The checksum layer counts what the sink accepted, so a discard sink
//! still yields the true decoded size.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Running CRC-32 and byte count
#[derive(Default)]
struct Checksum {
    hasher: crc32fast::Hasher,
    size: u64,
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checksum").field("size", &self.size).finish()
    }
}

/// Destination file being written
#[derive(Debug)]
struct FileSink {
    file: File,
    path: PathBuf,
    processed: u64,
}

#[derive(Debug)]
enum Sink {
    Discard,
    Console(io::Stdout),
    File(FileSink),
}

/// What a closed stream reports back to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTotals {
    /// CRC-32 and byte count, when checksum tracking was on
    pub checksum: Option<(u32, u64)>,
    /// Destination file and the bytes written into it, for file streams
    pub file: Option<(PathBuf, u64)>,
}

/// Output stream handed to the engine for one item
#[derive(Debug)]
pub struct ItemStream {
    sink: Sink,
    checksum: Option<Checksum>,
}

impl ItemStream {
    fn new(sink: Sink, checksum: bool) -> Self {
        Self {
            sink,
            checksum: checksum.then(Checksum::default),
        }
    }

    /// Verify-only stream that drops every byte
    pub fn discard(checksum: bool) -> Self {
        Self::new(Sink::Discard, checksum)
    }

    /// Stream to standard output
    pub fn console(checksum: bool) -> Self {
        Self::new(Sink::Console(io::stdout()), checksum)
    }

    /// Stream into an opened destination file
    ///
    /// With `position` the cursor is moved there first, for split-volume
    /// continuation fragments.
    pub fn file(
        mut file: File,
        path: impl Into<PathBuf>,
        position: Option<u64>,
        checksum: bool,
    ) -> io::Result<Self> {
        if let Some(offset) = position {
            file.seek(SeekFrom::Start(offset))?;
        }
        Ok(Self::new(
            Sink::File(FileSink {
                file,
                path: path.into(),
                processed: 0,
            }),
            checksum,
        ))
    }

    /// Destination path of a file stream
    pub fn file_path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File(sink) => Some(&sink.path),
            _ => None,
        }
    }

    /// Whether the CRC-32 layer is active
    pub fn has_checksum(&self) -> bool {
        self.checksum.is_some()
    }

    /// Flush and close, returning what was written
    pub fn finish(mut self) -> io::Result<StreamTotals> {
        self.flush()?;
        let checksum = self.checksum.map(|c| (c.hasher.finalize(), c.size));
        let file = match self.sink {
            Sink::File(sink) => Some((sink.path, sink.processed)),
            _ => None,
        };
        Ok(StreamTotals { checksum, file })
    }
}

impl Write for ItemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match &mut self.sink {
            Sink::Discard => buf.len(),
            Sink::Console(out) => out.write(buf)?,
            Sink::File(sink) => {
                let n = sink.file.write(buf)?;
                sink.processed += n as u64;
                n
            }
        };

        if let Some(checksum) = &mut self.checksum {
            checksum.hasher.update(&buf[..written]);
            checksum.size += written as u64;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Discard => Ok(()),
            Sink::Console(out) => out.flush(),
            Sink::File(sink) => sink.file.flush(),
        }
    }
}
