//! Shared input/output handles for console processes.
//!
//! A handle is either *standard* (the process-wide stdin/stdout/stderr, or a
//! stand-in for them) or owned. Processes close owned handles when they
//! finish and only flush standard ones.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

type Sink = Box<dyn Write + Send>;
type Source = Box<dyn Read + Send>;

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable writer handle. Clones share the same sink.
#[derive(Clone)]
pub struct Output {
    sink: Arc<Mutex<Sink>>,
    standard: bool,
}

impl Output {
    pub fn stdout() -> Self {
        Self::standard(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::standard(io::stderr())
    }

    /// A writer treated like a standard stream: never closed by a process.
    pub fn standard(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            standard: true,
        }
    }

    /// An owned writer, closed when the owning process finishes.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            standard: false,
        }
    }

    /// Open `path` for writing, truncating unless `append` is set.
    pub fn file(path: &Path, append: bool) -> io::Result<Self> {
        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn is_standard(&self) -> bool {
        self.standard
    }

    /// Whether both handles write to the same sink.
    pub fn same_sink(&self, other: &Output) -> bool {
        Arc::ptr_eq(&self.sink, &other.sink)
    }

    /// Flush an owned sink. Standard sinks are flushed and left open.
    ///
    /// The sink itself is released when its last handle drops.
    pub fn close(&self) -> io::Result<()> {
        lock(&self.sink).flush()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.sink).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        lock(&self.sink).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.sink).flush()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("standard", &self.standard)
            .finish_non_exhaustive()
    }
}

/// Cloneable reader handle. Clones share the same source.
#[derive(Clone)]
pub struct Input {
    source: Arc<Mutex<Source>>,
    standard: bool,
}

impl Input {
    pub fn stdin() -> Self {
        Self {
            source: Arc::new(Mutex::new(Box::new(io::stdin()))),
            standard: true,
        }
    }

    /// An input that is always at end of stream.
    pub fn empty() -> Self {
        Self::from_reader(io::empty())
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            source: Arc::new(Mutex::new(Box::new(reader))),
            standard: false,
        }
    }

    pub fn is_standard(&self) -> bool {
        self.standard
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        lock(&self.source).read(buf)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("standard", &self.standard)
            .finish_non_exhaustive()
    }
}

/// The three streams of a process.
#[derive(Debug, Clone)]
pub struct Streams {
    pub input: Input,
    pub out: Output,
    pub err: Output,
}

impl Streams {
    /// The process-wide standard streams.
    pub fn standard() -> Self {
        Self {
            input: Input::stdin(),
            out: Output::stdout(),
            err: Output::stderr(),
        }
    }

    /// Empty input and the given writers, both treated as standard.
    pub fn capture(out: SharedBuffer, err: SharedBuffer) -> Self {
        Self {
            input: Input::empty(),
            out: Output::standard(out),
            err: Output::standard(err),
        }
    }
}

/// Cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock(&self.bytes)).into_owned()
    }

    pub fn clear(&self) {
        lock(&self.bytes).clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.bytes).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_sink() {
        let buf = SharedBuffer::new();
        let mut a = Output::standard(buf.clone());
        let mut b = a.clone();
        write!(a, "one ").unwrap();
        write!(b, "two").unwrap();
        assert_eq!(buf.contents(), "one two");
        assert!(a.same_sink(&b));
        assert!(!a.same_sink(&Output::standard(SharedBuffer::new())));
    }

    #[test]
    fn standard_flag() {
        assert!(Output::stdout().is_standard());
        assert!(Output::stderr().is_standard());
        assert!(!Output::from_writer(SharedBuffer::new()).is_standard());
        assert!(Input::stdin().is_standard());
        assert!(!Input::empty().is_standard());
    }

    #[test]
    fn file_truncate_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut out = Output::file(&path, false).unwrap();
            writeln!(out, "first").unwrap();
            out.close().unwrap();
        }
        {
            let mut out = Output::file(&path, true).unwrap();
            writeln!(out, "second").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        {
            let mut out = Output::file(&path, false).unwrap();
            writeln!(out, "third").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "third\n");
    }

    #[test]
    fn file_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Output::file(&dir.path().join("no/such/dir/f"), false).is_err());
    }

    #[test]
    fn empty_input_is_eof() {
        let mut input = Input::empty();
        let mut buf = [0u8; 4];
        assert_eq!(input.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn input_from_reader_reads() {
        let mut input = Input::from_reader(&b"abc"[..]);
        let mut s = String::new();
        input.read_to_string(&mut s).unwrap();
        assert_eq!(s, "abc");
    }

    #[test]
    fn shared_buffer_clear() {
        let mut buf = SharedBuffer::new();
        buf.write_all(b"x").unwrap();
        buf.clear();
        assert_eq!(buf.contents(), "");
    }
}
