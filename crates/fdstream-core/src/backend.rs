//! The seam between the engine and the operating system.
//!
//! The read and write engines only ever talk to a [`Descriptor`]. The
//! platform implementation is [`fdstream_sys::FileDescriptor`]; tests plug in
//! scripted descriptors to control exactly what each raw read returns.

use std::io;

use fdstream_sys::{AsRawFileDescriptor, FileDescriptor, IntoRawFileDescriptor};

/// One OS-level handle as seen by the engine.
///
/// Each method maps to a single system call (or, for overlapped Windows
/// handles, a single step of the read state machine). Implementations must
/// not retry, sleep or buffer.
pub trait Descriptor: Sized {
    /// Issue one read. Would-block and end-of-stream conditions may surface
    /// either as `Ok(0)` (end) or as errors; the classifier sorts them out.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Issue one write, returning how many bytes the OS accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Current OS-level non-blocking state.
    fn is_non_blocking(&self) -> io::Result<bool>;

    /// Change the OS-level non-blocking state.
    fn set_non_blocking(&mut self, non_blocking: bool) -> io::Result<()>;

    /// Duplicate at the OS level. The duplicate is closed independently.
    fn try_clone(&self) -> io::Result<Self>;

    /// Close the OS handle, reporting the close call's result.
    fn close(self) -> io::Result<()>;

    /// Give the handle up without closing it.
    fn release(self);

    /// Raw descriptor number for log correlation.
    fn raw_id(&self) -> i64;
}

impl Descriptor for FileDescriptor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_raw(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_raw(buf)
    }

    fn is_non_blocking(&self) -> io::Result<bool> {
        Ok(FileDescriptor::is_non_blocking(self)?)
    }

    fn set_non_blocking(&mut self, non_blocking: bool) -> io::Result<()> {
        Ok(FileDescriptor::set_non_blocking(self, non_blocking)?)
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(FileDescriptor::try_clone(self)?)
    }

    fn close(self) -> io::Result<()> {
        Ok(FileDescriptor::close(self)?)
    }

    fn release(self) {
        let _ = self.into_raw_file_descriptor();
    }

    fn raw_id(&self) -> i64 {
        self.as_raw_file_descriptor() as i64
    }
}
