use crate::{
    AccessMode, AsRawFileDescriptor, Error, FromRawFileDescriptor, IntoRawFileDescriptor, Pipe,
    Result, StdioDescriptor,
};
use std::os::unix::prelude::*;

pub type RawFileDescriptor = RawFd;

/// Sentinel stored in place of a descriptor that has been given up.
pub const INVALID_DESCRIPTOR: RawFileDescriptor = -1;

pub const WOULD_BLOCK_CODES: &[i32] = &[libc::EAGAIN, libc::EWOULDBLOCK];

/// POSIX reports end of data as a zero-length read, never as an error.
pub const END_OF_STREAM_CODES: &[i32] = &[];

pub fn bad_descriptor_code() -> i32 {
    libc::EBADF
}

impl<T: AsRawFd> AsRawFileDescriptor for T {
    fn as_raw_file_descriptor(&self) -> RawFileDescriptor {
        self.as_raw_fd()
    }
}

impl<T: IntoRawFd> IntoRawFileDescriptor for T {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor {
        self.into_raw_fd()
    }
}

impl<T: FromRawFd> FromRawFileDescriptor for T {
    unsafe fn from_raw_file_descriptor(fd: RawFileDescriptor) -> Self {
        unsafe { Self::from_raw_fd(fd) }
    }
}

/// An open POSIX descriptor. Owning descriptors are closed on drop;
/// borrowed ones (see [`FileDescriptor::borrow_stdio`]) never are.
#[derive(Debug)]
pub struct FileDescriptor {
    fd: RawFd,
    pub(crate) owned: bool,
}

impl Drop for FileDescriptor {
    fn drop(&mut self) {
        if self.owned && self.fd != INVALID_DESCRIPTOR {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

impl AsRawFd for FileDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl IntoRawFd for FileDescriptor {
    fn into_raw_fd(mut self) -> RawFd {
        std::mem::replace(&mut self.fd, INVALID_DESCRIPTOR)
    }
}

impl FromRawFd for FileDescriptor {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd, owned: true }
    }
}

fn fcntl_flags(fd: RawFd) -> Result<libc::c_int> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        Err(Error::Fcntl(std::io::Error::last_os_error()))
    } else {
        Ok(flags)
    }
}

fn set_cloexec(fd: RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags == -1 {
            return Err(Error::Fcntl(std::io::Error::last_os_error()));
        }
        if libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) == -1 {
            return Err(Error::Cloexec(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}

impl FileDescriptor {
    pub(crate) fn dup_impl(fd: RawFd) -> Result<Self> {
        if fd < 0 {
            return Err(Error::IllegalFdValue(fd.into()));
        }
        let duped = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };
        if duped == -1 {
            Err(Error::Dup {
                fd: fd.into(),
                source: std::io::Error::last_os_error(),
            })
        } else {
            Ok(Self {
                fd: duped,
                owned: true,
            })
        }
    }

    pub(crate) fn try_clone_impl(&self) -> Result<Self> {
        Self::dup_impl(self.fd)
    }

    pub(crate) fn as_file_impl(&self) -> Result<std::fs::File> {
        let duped = self.try_clone_impl()?;
        let fd = duped.into_raw_fd();
        Ok(unsafe { std::fs::File::from_raw_fd(fd) })
    }

    pub(crate) fn is_non_blocking_impl(&self) -> Result<bool> {
        let flags = fcntl_flags(self.fd)?;
        Ok(flags & libc::O_NONBLOCK != 0)
    }

    pub(crate) fn set_non_blocking_impl(&mut self, non_blocking: bool) -> Result<()> {
        let flags = fcntl_flags(self.fd)?;
        let updated = if non_blocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if updated == flags {
            return Ok(());
        }
        if unsafe { libc::fcntl(self.fd, libc::F_SETFL, updated) } == -1 {
            return Err(Error::NonBlocking(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    pub(crate) fn access_mode_impl(&self) -> Result<AccessMode> {
        let flags = fcntl_flags(self.fd)?;
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => Ok(AccessMode::ReadOnly),
            libc::O_WRONLY => Ok(AccessMode::WriteOnly),
            libc::O_RDWR => Ok(AccessMode::ReadWrite),
            other => Err(Error::AccessMode(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unrecognized access mode bits {other:#x}"),
            ))),
        }
    }

    pub(crate) fn read_impl(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        if size == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(size as usize)
        }
    }

    pub(crate) fn write_impl(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if size == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(size as usize)
        }
    }

    pub(crate) fn close_impl(mut self) -> Result<()> {
        let fd = std::mem::replace(&mut self.fd, INVALID_DESCRIPTOR);
        if !self.owned || fd == INVALID_DESCRIPTOR {
            return Ok(());
        }
        if unsafe { libc::close(fd) } == -1 {
            return Err(Error::Close {
                fd: fd.into(),
                source: std::io::Error::last_os_error(),
            });
        }
        tracing::trace!(fd, "closed descriptor");
        Ok(())
    }

    pub(crate) fn borrow_stdio_impl(stdio: StdioDescriptor) -> Self {
        let fd = match stdio {
            StdioDescriptor::Stdin => libc::STDIN_FILENO,
            StdioDescriptor::Stdout => libc::STDOUT_FILENO,
            StdioDescriptor::Stderr => libc::STDERR_FILENO,
        };
        Self { fd, owned: false }
    }
}

pub(crate) fn pipe_impl() -> Result<Pipe> {
    let mut fds = [-1i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if res == -1 {
        return Err(Error::Pipe(std::io::Error::last_os_error()));
    }
    let read = FileDescriptor {
        fd: fds[0],
        owned: true,
    };
    let write = FileDescriptor {
        fd: fds[1],
        owned: true,
    };
    set_cloexec(read.fd)?;
    set_cloexec(write.fd)?;
    Ok(Pipe { read, write })
}
