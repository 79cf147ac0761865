// Byte-stream capability and its two concrete backings.
//
// Everything in the patch pipeline talks to a stream through this narrow
// trait: size, offset, seek, exact read, exact write, close. The puff view
// (`PuffinStream`) implements the same trait over an underlying stream, so
// the layers compose.
//
// # Modules
//
// - `puffin` — the virtual puff view over a deflate-backed stream

pub mod puffin;

pub use puffin::PuffinStream;

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use crate::error::{Error, Result};

/// The byte-stream capability consumed by the core.
///
/// `read` and `write` are exact: short transfers are failures. All methods
/// report `Error::StreamIo` on backend trouble.
pub trait ByteStream {
    fn size(&self) -> Result<u64>;
    fn offset(&self) -> Result<u64>;
    fn seek(&mut self, offset: u64) -> Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;
    fn write(&mut self, buf: &[u8]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// A growable byte buffer shared between a `MemoryStream` and its creator,
/// so the creator can inspect what was written after the stream is consumed
/// by a `PuffinStream` or driver.
pub type SharedBuffer = Rc<RefCell<Vec<u8>>>;

/// Wrap a vector as a [`SharedBuffer`].
pub fn shared_buffer(data: Vec<u8>) -> SharedBuffer {
    Rc::new(RefCell::new(data))
}

// ---------------------------------------------------------------------------
// MemoryStream
// ---------------------------------------------------------------------------

/// A seekable stream over a shared in-memory buffer. Writes grow the buffer.
pub struct MemoryStream {
    memory: SharedBuffer,
    pos: u64,
    readable: bool,
    writable: bool,
    closed: bool,
}

impl MemoryStream {
    pub fn new(memory: SharedBuffer, readable: bool, writable: bool) -> Self {
        Self {
            memory,
            pos: 0,
            readable,
            writable,
            closed: false,
        }
    }

    /// A read-only stream over owned bytes.
    pub fn for_read(data: Vec<u8>) -> Self {
        Self::new(shared_buffer(data), true, false)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream is closed",
            )));
        }
        Ok(())
    }
}

impl ByteStream for MemoryStream {
    fn size(&self) -> Result<u64> {
        Ok(self.memory.borrow().len() as u64)
    }

    fn offset(&self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.check_open()?;
        if offset > self.memory.borrow().len() as u64 {
            return Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek past end of memory stream: {offset}"),
            )));
        }
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        if !self.readable {
            return Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory stream not opened for reading",
            )));
        }
        let memory = self.memory.borrow();
        let start = self.pos as usize;
        if start + buf.len() > memory.len() {
            return Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of memory stream",
            )));
        }
        buf.copy_from_slice(&memory[start..start + buf.len()]);
        drop(memory);
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_open()?;
        if !self.writable {
            return Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory stream not opened for writing",
            )));
        }
        let mut memory = self.memory.borrow_mut();
        let start = self.pos as usize;
        if start + buf.len() > memory.len() {
            memory.resize(start + buf.len(), 0);
        }
        memory[start..start + buf.len()].copy_from_slice(buf);
        drop(memory);
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStream
// ---------------------------------------------------------------------------

const FILE_BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// A stream over a file on disk, buffered in the direction it was opened
/// for. The puff view reads one small extent at a time, so unbuffered file
/// access would pay a syscall pair per deflate block.
pub struct FileStream {
    inner: FileBacking,
}

enum FileBacking {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

impl FileStream {
    /// Open `path` for reading or for writing (create + truncate). A stream
    /// is buffered one way; asking for both directions is an error.
    pub fn open(path: &Path, readable: bool, writable: bool) -> Result<Self> {
        let inner = match (readable, writable) {
            (true, false) => {
                let file = File::open(path)?;
                FileBacking::Reader(BufReader::with_capacity(FILE_BUF_SIZE, file))
            }
            (false, true) => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                FileBacking::Writer(BufWriter::with_capacity(FILE_BUF_SIZE, file))
            }
            _ => {
                return Err(Error::StreamIo(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "file streams open for reading or for writing, not both",
                )));
            }
        };
        Ok(Self { inner })
    }

    fn file(&self) -> &File {
        match &self.inner {
            FileBacking::Reader(reader) => reader.get_ref(),
            FileBacking::Writer(writer) => writer.get_ref(),
        }
    }
}

impl ByteStream for FileStream {
    fn size(&self) -> Result<u64> {
        let on_disk = self.file().metadata()?.len();
        // Writes in this crate are append-only, so pending buffered bytes
        // extend the file.
        let pending = match &self.inner {
            FileBacking::Reader(_) => 0,
            FileBacking::Writer(writer) => writer.buffer().len() as u64,
        };
        Ok(on_disk + pending)
    }

    fn offset(&self) -> Result<u64> {
        // The logical position is the file position adjusted by whatever
        // sits in the buffer: not yet handed out (reader) or not yet
        // written back (writer).
        let offset = match &self.inner {
            FileBacking::Reader(reader) => {
                let mut file = reader.get_ref();
                file.stream_position()? - reader.buffer().len() as u64
            }
            FileBacking::Writer(writer) => {
                let mut file = writer.get_ref();
                file.stream_position()? + writer.buffer().len() as u64
            }
        };
        Ok(offset)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        match &mut self.inner {
            FileBacking::Reader(reader) => reader.seek(SeekFrom::Start(offset))?,
            FileBacking::Writer(writer) => writer.seek(SeekFrom::Start(offset))?,
        };
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.inner {
            FileBacking::Reader(reader) => {
                reader.read_exact(buf)?;
                Ok(())
            }
            FileBacking::Writer(_) => Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file stream not opened for reading",
            ))),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.inner {
            FileBacking::Writer(writer) => {
                writer.write_all(buf)?;
                Ok(())
            }
            FileBacking::Reader(_) => Err(Error::StreamIo(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file stream not opened for writing",
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let FileBacking::Writer(writer) = &mut self.inner {
            writer.flush()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
