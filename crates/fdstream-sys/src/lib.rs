//! Platform backends for `fdstream`.
//!
//! This crate hides the difference between the POSIX `RawFd` and the Windows
//! `RawHandle` worlds behind a single [`FileDescriptor`] type that knows how
//! to duplicate itself, toggle its non-blocking mode, report its access mode
//! and issue exactly one raw read or write per call.
//!
//! Nothing in here retries, sleeps or buffers; the deadline-aware engine
//! lives in `fdstream-core` and treats this crate as its only point of
//! contact with the operating system.
//!
//! ## FileDescriptor
//!
//! ```
//! use fdstream_sys::{FileDescriptor, Result};
//! use std::io::Write;
//!
//! fn get_stdout() -> Result<FileDescriptor> {
//!   let stdout = std::io::stdout();
//!   let handle = stdout.lock();
//!   FileDescriptor::dup(&handle)
//! }
//!
//! fn print_something() -> Result<()> {
//!    get_stdout()?.write(b"hello")?;
//!    Ok(())
//! }
//! ```
//!
//! ## Pipe
//!
//! ```
//! use fdstream_sys::{Pipe, Error};
//! use std::io::{Read, Write};
//!
//! let mut pipe = Pipe::new()?;
//! pipe.write.write(b"hello")?;
//! drop(pipe.write);
//!
//! let mut s = String::new();
//! pipe.read.read_to_string(&mut s)?;
//! assert_eq!(s, "hello");
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Non-blocking reads
//!
//! On POSIX systems the non-blocking bit is flipped on the descriptor's
//! file-status flags. On Windows, pipes are peeked before they are read and
//! handles opened for overlapped I/O are driven through a small per-handle
//! state machine, so neither ever parks the calling thread.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use crate::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use crate::windows::*;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to create a pipe")]
    Pipe(#[source] std::io::Error),
    #[error("fcntl read failed")]
    Fcntl(#[source] std::io::Error),
    #[error("failed to set cloexec")]
    Cloexec(#[source] std::io::Error),
    #[error("failed to change non-blocking mode")]
    NonBlocking(#[source] std::io::Error),
    #[error("dup of fd {fd} failed")]
    Dup { fd: i64, source: std::io::Error },
    #[error("close of fd {fd} failed")]
    Close { fd: i64, source: std::io::Error },
    #[error("Illegal fd value {0}")]
    IllegalFdValue(i64),
    #[error("failed to query the handle's access mode")]
    AccessMode(#[source] std::io::Error),

    #[error("IoError")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The OS-level error behind this failure, when there is one.
    pub fn os_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::Pipe(e)
            | Self::Fcntl(e)
            | Self::Cloexec(e)
            | Self::NonBlocking(e)
            | Self::AccessMode(e)
            | Self::Io(e) => Some(e),
            Self::Dup { source, .. } | Self::Close { source, .. } => Some(source),
            Self::IllegalFdValue(_) => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::IllegalFdValue(_) => std::io::Error::from_raw_os_error(bad_descriptor_code()),
            other => match other.os_error().and_then(std::io::Error::raw_os_error) {
                Some(code) => std::io::Error::from_raw_os_error(code),
                None => std::io::Error::other(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `AsRawFileDescriptor` is a platform independent trait for returning
/// a non-owning reference to the underlying platform file descriptor
/// type.
pub trait AsRawFileDescriptor {
    fn as_raw_file_descriptor(&self) -> RawFileDescriptor;
}

/// `IntoRawFileDescriptor` is a platform independent trait for converting
/// an instance into the underlying platform file descriptor type.
pub trait IntoRawFileDescriptor {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor;
}

/// `FromRawFileDescriptor` is a platform independent trait for creating
/// an instance from the underlying platform file descriptor type.
pub trait FromRawFileDescriptor {
    /// Construct `Self` from a raw file descriptor, taking ownership.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `fd` is a valid, open file descriptor and
    /// that ownership is transferred to the returned value. After calling
    /// this function, the caller must not close or otherwise use `fd`
    /// independently of the returned value.
    unsafe fn from_raw_file_descriptor(fd: RawFileDescriptor) -> Self;
}

/// Which directions a descriptor was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StdioDescriptor {
    Stdin,
    Stdout,
    Stderr,
}

/// Represents the readable and writable ends of a pair of descriptors
/// connected via a kernel pipe.
///
/// ```
/// use fdstream_sys::{Pipe, Error};
/// use std::io::{Read,Write};
///
/// let mut pipe = Pipe::new()?;
/// pipe.write.write(b"hello")?;
/// drop(pipe.write);
///
/// let mut s = String::new();
/// pipe.read.read_to_string(&mut s)?;
/// assert_eq!(s, "hello");
/// # Ok::<(), Error>(())
/// ```
pub struct Pipe {
    /// The readable end of the pipe
    pub read: FileDescriptor,
    /// The writable end of the pipe
    pub write: FileDescriptor,
}

impl FileDescriptor {
    /// Attempt to duplicate the underlying handle from an object that is
    /// representable as the system `RawFileDescriptor` type and return a
    /// `FileDescriptor` wrapped around the duplicate.  Since the duplication
    /// requires kernel resources that may not be available, this is a
    /// potentially fallible operation.
    /// The returned handle has a separate lifetime from the source, but
    /// references the same object at the kernel level.
    pub fn dup<F: AsRawFileDescriptor>(f: &F) -> Result<Self> {
        Self::dup_impl(f.as_raw_file_descriptor())
    }

    /// Duplicate this descriptor. The duplicate is always owning, even when
    /// `self` is a borrowed stdio view.
    pub fn try_clone(&self) -> Result<Self> {
        self.try_clone_impl()
    }

    /// A convenience method for creating a `std::fs::File` object.
    /// The `File` is created using a duplicated handle so
    /// that the source handle remains alive.
    pub fn as_file(&self) -> Result<std::fs::File> {
        self.as_file_impl()
    }

    /// Query whether reads on this descriptor currently return immediately
    /// when no data is available.
    pub fn is_non_blocking(&self) -> Result<bool> {
        self.is_non_blocking_impl()
    }

    /// Change the OS-level non-blocking mode, leaving every other status
    /// flag untouched.
    pub fn set_non_blocking(&mut self, non_blocking: bool) -> Result<()> {
        self.set_non_blocking_impl(non_blocking)
    }

    /// Report which directions the descriptor was opened for.
    pub fn access_mode(&self) -> Result<AccessMode> {
        self.access_mode_impl()
    }

    /// Issue exactly one read. Would-block conditions come back as errors;
    /// classifying them is the caller's business.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_impl(buf)
    }

    /// Issue exactly one write and report how many bytes the OS accepted.
    pub fn write_raw(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_impl(buf)
    }

    /// Close the descriptor now and report the result of the close call.
    /// Borrowed descriptors are released without being closed.
    pub fn close(self) -> Result<()> {
        self.close_impl()
    }

    /// Whether dropping or closing this value closes the OS descriptor.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// A non-owning view of one of the process's standard streams.
    /// Closing or dropping it leaves the stream open.
    pub fn borrow_stdio(stdio: StdioDescriptor) -> Self {
        Self::borrow_stdio_impl(stdio)
    }
}

impl std::io::Read for FileDescriptor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_impl(buf)
    }
}

impl std::io::Write for FileDescriptor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_impl(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Pipe {
    /// Create a kernel pipe. Both ends are owning and close-on-exec.
    pub fn new() -> Result<Pipe> {
        pipe_impl()
    }
}

/// Raw error codes that mean "nothing available right now" on this platform.
pub fn would_block_codes() -> &'static [i32] {
    WOULD_BLOCK_CODES
}

/// Raw error codes that this platform reports in place of a zero-length
/// read once the peer is gone.
pub fn end_of_stream_codes() -> &'static [i32] {
    END_OF_STREAM_CODES
}
