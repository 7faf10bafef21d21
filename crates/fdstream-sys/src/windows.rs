use crate::{
    AccessMode, AsRawFileDescriptor, Error, FromRawFileDescriptor, IntoRawFileDescriptor, Pipe,
    Result, StdioDescriptor,
};
use std::io;
use std::os::windows::prelude::*;
use std::ptr;
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::{
    ERROR_BROKEN_PIPE, ERROR_HANDLE_EOF, ERROR_INVALID_HANDLE, ERROR_INVALID_PARAMETER,
    ERROR_IO_INCOMPLETE, ERROR_IO_PENDING, ERROR_NO_DATA,
};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::fileapi::{GetFileSizeEx, GetFileType, ReadFile, WriteFile};
use winapi::um::handleapi::{CloseHandle, DuplicateHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::{CancelIoEx, GetOverlappedResult};
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::namedpipeapi::{CreatePipe, PeekNamedPipe, SetNamedPipeHandleState};
use winapi::um::processenv::GetStdHandle;
use winapi::um::processthreadsapi::GetCurrentProcess;
use winapi::um::synchapi::CreateEventW;
use winapi::um::winbase::{
    GetNamedPipeHandleStateW, FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE, PIPE_NOWAIT,
    STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use winapi::um::winnt::{DUPLICATE_SAME_ACCESS, HANDLE, LARGE_INTEGER};

pub type RawFileDescriptor = RawHandle;

/// Sentinel stored in place of a handle that has been given up.
pub const INVALID_DESCRIPTOR: RawFileDescriptor = INVALID_HANDLE_VALUE as RawHandle;

pub const WOULD_BLOCK_CODES: &[i32] = &[
    ERROR_NO_DATA as i32,
    ERROR_IO_PENDING as i32,
    ERROR_IO_INCOMPLETE as i32,
];

pub const END_OF_STREAM_CODES: &[i32] = &[ERROR_HANDLE_EOF as i32, ERROR_BROKEN_PIPE as i32];

pub fn bad_descriptor_code() -> i32 {
    ERROR_INVALID_HANDLE as i32
}

impl<T: AsRawHandle> AsRawFileDescriptor for T {
    fn as_raw_file_descriptor(&self) -> RawFileDescriptor {
        self.as_raw_handle()
    }
}

impl<T: IntoRawHandle> IntoRawFileDescriptor for T {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor {
        self.into_raw_handle()
    }
}

impl<T: FromRawHandle> FromRawFileDescriptor for T {
    unsafe fn from_raw_file_descriptor(handle: RawHandle) -> Self {
        unsafe { Self::from_raw_handle(handle) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    Pipe,
    Disk,
    Char,
    Unknown,
}

impl HandleType {
    fn probe(handle: RawHandle) -> Self {
        match unsafe { GetFileType(handle as HANDLE) } {
            FILE_TYPE_PIPE => Self::Pipe,
            FILE_TYPE_DISK => Self::Disk,
            FILE_TYPE_CHAR => Self::Char,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlappedState {
    Idle,
    Pending,
}

/// Drives reads on a handle opened with `FILE_FLAG_OVERLAPPED`.
///
/// At most one read is in flight. While it is pending every call re-polls
/// that same operation; a new read is only issued from `Idle`. Completed
/// bytes land in `scratch` and are handed out through `ready`, which lets a
/// caller with a smaller buffer than the completed read drain it across
/// several calls.
struct OverlappedReader {
    overlapped: OVERLAPPED,
    event: HANDLE,
    scratch: Vec<u8>,
    state: OverlappedState,
    ready: std::ops::Range<usize>,
}

impl std::fmt::Debug for OverlappedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlappedReader")
            .field("capacity", &self.scratch.len())
            .field("state", &self.state)
            .field("ready", &self.ready)
            .finish()
    }
}

fn new_event() -> io::Result<HANDLE> {
    let event = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
    if event.is_null() {
        Err(io::Error::last_os_error())
    } else {
        Ok(event)
    }
}

fn overlapped_at(offset: u64, event: HANDLE) -> OVERLAPPED {
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    unsafe {
        let s = overlapped.u.s_mut();
        s.Offset = offset as DWORD;
        s.OffsetHigh = (offset >> 32) as DWORD;
    }
    overlapped.hEvent = event;
    overlapped
}

/// `ERROR_INVALID_PARAMETER` from an overlapped read past the end of a file
/// means end of data, not a failure. Anything short of the end is a real
/// error.
fn eof_by_offset(handle: HANDLE, offset: u64, code: DWORD) -> io::Result<usize> {
    let mut size: LARGE_INTEGER = unsafe { std::mem::zeroed() };
    if unsafe { GetFileSizeEx(handle, &mut size) } == 0 {
        return Err(io::Error::from_raw_os_error(code as i32));
    }
    let size = unsafe { *size.QuadPart() } as u64;
    if offset >= size {
        Ok(0)
    } else {
        Err(io::Error::from_raw_os_error(code as i32))
    }
}

impl OverlappedReader {
    fn new(capacity: usize) -> io::Result<Box<Self>> {
        let event = new_event()?;
        Ok(Box::new(Self {
            overlapped: unsafe { std::mem::zeroed() },
            event,
            scratch: vec![0u8; capacity.max(1)],
            state: OverlappedState::Idle,
            ready: 0..0,
        }))
    }

    fn copy_out(&mut self, buf: &mut [u8]) -> usize {
        let n = self.ready.len().min(buf.len());
        let start = self.ready.start;
        buf[..n].copy_from_slice(&self.scratch[start..start + n]);
        self.ready.start += n;
        n
    }

    fn complete(&mut self, transferred: DWORD, offset: &mut u64, buf: &mut [u8]) -> usize {
        self.state = OverlappedState::Idle;
        *offset += u64::from(transferred);
        self.ready = 0..transferred as usize;
        self.copy_out(buf)
    }

    fn read(&mut self, handle: HANDLE, offset: &mut u64, buf: &mut [u8]) -> io::Result<usize> {
        if !self.ready.is_empty() {
            return Ok(self.copy_out(buf));
        }
        if self.state == OverlappedState::Pending {
            return self.poll(handle, offset, buf);
        }

        let want = buf.len().min(self.scratch.len());
        self.overlapped = overlapped_at(*offset, self.event);
        let mut transferred: DWORD = 0;
        let issued = unsafe {
            ReadFile(
                handle,
                self.scratch.as_mut_ptr().cast(),
                want as DWORD,
                &mut transferred,
                &mut self.overlapped,
            )
        };
        if issued != 0 {
            return Ok(self.complete(transferred, offset, buf));
        }
        match unsafe { GetLastError() } {
            ERROR_IO_PENDING => {
                self.state = OverlappedState::Pending;
                self.poll(handle, offset, buf)
            }
            ERROR_HANDLE_EOF => Ok(0),
            ERROR_INVALID_PARAMETER => eof_by_offset(handle, *offset, ERROR_INVALID_PARAMETER),
            code => Err(io::Error::from_raw_os_error(code as i32)),
        }
    }

    fn poll(&mut self, handle: HANDLE, offset: &mut u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut transferred: DWORD = 0;
        let done =
            unsafe { GetOverlappedResult(handle, &mut self.overlapped, &mut transferred, FALSE) };
        if done != 0 {
            return Ok(self.complete(transferred, offset, buf));
        }
        match unsafe { GetLastError() } {
            ERROR_IO_INCOMPLETE => Err(io::Error::from_raw_os_error(ERROR_IO_INCOMPLETE as i32)),
            ERROR_HANDLE_EOF => {
                self.state = OverlappedState::Idle;
                Ok(0)
            }
            ERROR_INVALID_PARAMETER => {
                self.state = OverlappedState::Idle;
                eof_by_offset(handle, *offset, ERROR_INVALID_PARAMETER)
            }
            code => {
                self.state = OverlappedState::Idle;
                Err(io::Error::from_raw_os_error(code as i32))
            }
        }
    }

    /// Cancel an in-flight read and wait for the kernel to let go of
    /// `scratch` and `overlapped`.
    fn quiesce(&mut self, handle: HANDLE) {
        if self.state == OverlappedState::Pending {
            let mut transferred: DWORD = 0;
            unsafe {
                CancelIoEx(handle, &mut self.overlapped);
                GetOverlappedResult(handle, &mut self.overlapped, &mut transferred, TRUE);
            }
            self.state = OverlappedState::Idle;
        }
    }
}

impl Drop for OverlappedReader {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.event);
        }
    }
}

/// An open Windows handle plus the state needed to read it without
/// blocking: pipes are peeked before being read, handles opened for
/// overlapped I/O carry their own read state machine and a manual
/// position cursor shared by reads and writes.
#[derive(Debug)]
pub struct FileDescriptor {
    handle: RawHandle,
    pub(crate) owned: bool,
    handle_type: HandleType,
    reader: Option<Box<OverlappedReader>>,
    offset: u64,
}

unsafe impl Send for FileDescriptor {}

impl Drop for FileDescriptor {
    fn drop(&mut self) {
        self.quiesce();
        if self.owned && self.handle != INVALID_DESCRIPTOR {
            unsafe {
                CloseHandle(self.handle as HANDLE);
            }
        }
    }
}

impl AsRawHandle for FileDescriptor {
    fn as_raw_handle(&self) -> RawHandle {
        self.handle
    }
}

impl IntoRawHandle for FileDescriptor {
    fn into_raw_handle(mut self) -> RawHandle {
        self.quiesce();
        std::mem::replace(&mut self.handle, INVALID_DESCRIPTOR)
    }
}

impl FromRawHandle for FileDescriptor {
    unsafe fn from_raw_handle(handle: RawHandle) -> Self {
        Self::wrap(handle, true)
    }
}

impl FileDescriptor {
    fn wrap(handle: RawHandle, owned: bool) -> Self {
        Self {
            handle,
            owned,
            handle_type: HandleType::probe(handle),
            reader: None,
            offset: 0,
        }
    }

    fn raw(&self) -> HANDLE {
        self.handle as HANDLE
    }

    fn quiesce(&mut self) {
        let handle = self.raw();
        if let Some(reader) = self.reader.as_mut() {
            reader.quiesce(handle);
        }
    }

    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    /// Declare that the handle was opened with `FILE_FLAG_OVERLAPPED`.
    /// Reads then go through the overlapped state machine, staging at most
    /// `scratch_capacity` bytes per in-flight read.
    pub fn enable_overlapped(&mut self, scratch_capacity: usize) -> Result<()> {
        if self.reader.is_none() && self.handle_type != HandleType::Pipe {
            self.reader = Some(OverlappedReader::new(scratch_capacity)?);
        }
        Ok(())
    }

    pub fn is_overlapped(&self) -> bool {
        self.reader.is_some()
    }

    /// The manual position used for overlapped reads and writes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn dup_impl(handle: RawHandle) -> Result<Self> {
        if handle == INVALID_DESCRIPTOR || handle.is_null() {
            return Err(Error::IllegalFdValue(handle as i64));
        }
        let mut duped: HANDLE = ptr::null_mut();
        let ok = unsafe {
            let process = GetCurrentProcess();
            DuplicateHandle(
                process,
                handle as HANDLE,
                process,
                &mut duped,
                0,
                FALSE,
                DUPLICATE_SAME_ACCESS,
            )
        };
        if ok == 0 {
            Err(Error::Dup {
                fd: handle as i64,
                source: io::Error::last_os_error(),
            })
        } else {
            Ok(Self::wrap(duped as RawHandle, true))
        }
    }

    pub(crate) fn try_clone_impl(&self) -> Result<Self> {
        let mut clone = Self::dup_impl(self.handle)?;
        clone.offset = self.offset;
        if let Some(reader) = &self.reader {
            clone.enable_overlapped(reader.scratch.len())?;
        }
        Ok(clone)
    }

    pub(crate) fn as_file_impl(&self) -> Result<std::fs::File> {
        let duped = Self::dup_impl(self.handle)?;
        let handle = duped.into_raw_handle();
        Ok(unsafe { std::fs::File::from_raw_handle(handle) })
    }

    fn pipe_state(&self) -> Result<DWORD> {
        let mut state: DWORD = 0;
        let ok = unsafe {
            GetNamedPipeHandleStateW(
                self.raw(),
                &mut state,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
            )
        };
        if ok == 0 {
            Err(Error::Fcntl(io::Error::last_os_error()))
        } else {
            Ok(state)
        }
    }

    /// Only pipes carry a wait mode. Every other handle kind is reported as
    /// non-blocking because reads on it are peeked or overlapped.
    pub(crate) fn is_non_blocking_impl(&self) -> Result<bool> {
        match self.handle_type {
            HandleType::Pipe => Ok(self.pipe_state()? & PIPE_NOWAIT != 0),
            _ => Ok(true),
        }
    }

    pub(crate) fn set_non_blocking_impl(&mut self, non_blocking: bool) -> Result<()> {
        if self.handle_type != HandleType::Pipe {
            return Ok(());
        }
        let state = self.pipe_state()?;
        let mut updated = if non_blocking {
            state | PIPE_NOWAIT
        } else {
            state & !PIPE_NOWAIT
        };
        if updated == state {
            return Ok(());
        }
        let ok = unsafe {
            SetNamedPipeHandleState(self.raw(), &mut updated, ptr::null_mut(), ptr::null_mut())
        };
        if ok == 0 {
            return Err(Error::NonBlocking(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Windows offers no cheap query for the access rights a handle was
    /// opened with; every handle is treated as read-write.
    pub(crate) fn access_mode_impl(&self) -> Result<AccessMode> {
        Ok(AccessMode::ReadWrite)
    }

    fn read_pipe(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut available: DWORD = 0;
        let ok = unsafe {
            PeekNamedPipe(
                self.raw(),
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                &mut available,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        if available == 0 {
            return Err(io::Error::from_raw_os_error(ERROR_NO_DATA as i32));
        }
        let want = (available as usize).min(buf.len());
        self.read_sync(&mut buf[..want])
    }

    fn read_sync(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut transferred: DWORD = 0;
        let ok = unsafe {
            ReadFile(
                self.raw(),
                buf.as_mut_ptr().cast(),
                buf.len() as DWORD,
                &mut transferred,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return match unsafe { GetLastError() } {
                ERROR_HANDLE_EOF => Ok(0),
                code => Err(io::Error::from_raw_os_error(code as i32)),
            };
        }
        Ok(transferred as usize)
    }

    pub(crate) fn read_impl(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.handle == INVALID_DESCRIPTOR {
            return Err(io::Error::from_raw_os_error(ERROR_INVALID_HANDLE as i32));
        }
        if self.handle_type == HandleType::Pipe {
            return self.read_pipe(buf);
        }
        let handle = self.raw();
        match self.reader.as_mut() {
            Some(reader) => reader.read(handle, &mut self.offset, buf),
            None => self.read_sync(buf),
        }
    }

    /// Writes are always waited to completion, overlapped or not.
    pub(crate) fn write_impl(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.reader.is_none() {
            let mut transferred: DWORD = 0;
            let ok = unsafe {
                WriteFile(
                    self.raw(),
                    buf.as_ptr().cast(),
                    buf.len() as DWORD,
                    &mut transferred,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }
            return Ok(transferred as usize);
        }

        let event = new_event()?;
        let mut overlapped = overlapped_at(self.offset, event);
        let mut transferred: DWORD = 0;
        let result = unsafe {
            let issued = WriteFile(
                self.raw(),
                buf.as_ptr().cast(),
                buf.len() as DWORD,
                &mut transferred,
                &mut overlapped,
            );
            if issued == 0 && GetLastError() != ERROR_IO_PENDING {
                Err(io::Error::last_os_error())
            } else if GetOverlappedResult(self.raw(), &mut overlapped, &mut transferred, TRUE) == 0
            {
                Err(io::Error::last_os_error())
            } else {
                Ok(transferred as usize)
            }
        };
        unsafe {
            CloseHandle(event);
        }
        if let Ok(n) = result {
            self.offset += n as u64;
        }
        result
    }

    pub(crate) fn close_impl(mut self) -> Result<()> {
        self.quiesce();
        let handle = std::mem::replace(&mut self.handle, INVALID_DESCRIPTOR);
        if !self.owned || handle == INVALID_DESCRIPTOR {
            return Ok(());
        }
        if unsafe { CloseHandle(handle as HANDLE) } == 0 {
            return Err(Error::Close {
                fd: handle as i64,
                source: io::Error::last_os_error(),
            });
        }
        tracing::trace!(handle = handle as i64, "closed handle");
        Ok(())
    }

    pub(crate) fn borrow_stdio_impl(stdio: StdioDescriptor) -> Self {
        let which = match stdio {
            StdioDescriptor::Stdin => STD_INPUT_HANDLE,
            StdioDescriptor::Stdout => STD_OUTPUT_HANDLE,
            StdioDescriptor::Stderr => STD_ERROR_HANDLE,
        };
        let handle = unsafe { GetStdHandle(which) };
        Self::wrap(handle as RawHandle, false)
    }
}

pub(crate) fn pipe_impl() -> Result<Pipe> {
    let mut read: HANDLE = INVALID_HANDLE_VALUE;
    let mut write: HANDLE = INVALID_HANDLE_VALUE;
    if unsafe { CreatePipe(&mut read, &mut write, ptr::null_mut(), 0) } == 0 {
        return Err(Error::Pipe(io::Error::last_os_error()));
    }
    Ok(Pipe {
        read: FileDescriptor::wrap(read as RawHandle, true),
        write: FileDescriptor::wrap(write as RawHandle, true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::windows::fs::OpenOptionsExt;
    use winapi::um::winbase::FILE_FLAG_OVERLAPPED;

    /// A temp file holding `contents`, reopened for overlapped reads.
    fn overlapped_file(contents: &[u8]) -> (tempfile::NamedTempFile, FileDescriptor) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(FILE_FLAG_OVERLAPPED)
            .open(tmp.path())
            .unwrap();
        (tmp, FileDescriptor::dup(&file).unwrap())
    }

    /// Read with buffers of the given sizes in turn until end of data,
    /// re-polling while the kernel still owns the read.
    fn drain(fd: &mut FileDescriptor, sizes: &[usize]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut turn = 0;
        loop {
            let mut buf = vec![0u8; sizes[turn % sizes.len()]];
            match fd.read_raw(&mut buf) {
                Ok(0) => return out,
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    turn += 1;
                }
                Err(err) if err.raw_os_error() == Some(ERROR_IO_INCOMPLETE as i32) => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(err) => panic!("overlapped read failed: {err}"),
            }
        }
    }

    #[test]
    fn pipe_ends_are_pipes() {
        let pipe = Pipe::new().unwrap();
        assert_eq!(pipe.read.handle_type(), HandleType::Pipe);
        assert_eq!(pipe.write.handle_type(), HandleType::Pipe);
    }

    #[test]
    fn empty_pipe_peeks_as_no_data() {
        let mut pipe = Pipe::new().unwrap();
        let mut buf = [0u8; 8];
        let err = pipe.read.read_raw(&mut buf).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_NO_DATA as i32));
    }

    #[test]
    fn pipe_read_is_bounded_by_available() {
        let mut pipe = Pipe::new().unwrap();
        pipe.write.write_all(b"abc").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(pipe.read.read_raw(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn broken_pipe_is_end_of_stream() {
        let mut pipe = Pipe::new().unwrap();
        pipe.write.close().unwrap();
        let mut buf = [0u8; 8];
        let err = pipe.read.read_raw(&mut buf).unwrap_err();
        assert!(END_OF_STREAM_CODES.contains(&err.raw_os_error().unwrap()));
    }

    #[test]
    fn pipe_nowait_toggle_round_trips() {
        let mut pipe = Pipe::new().unwrap();
        assert!(!pipe.read.is_non_blocking().unwrap());
        pipe.read.set_non_blocking(true).unwrap();
        assert!(pipe.read.is_non_blocking().unwrap());
        pipe.read.set_non_blocking(false).unwrap();
        assert!(!pipe.read.is_non_blocking().unwrap());
    }

    #[test]
    fn disk_handles_report_non_blocking() {
        let file = tempfile::tempfile().unwrap();
        let fd = FileDescriptor::dup(&file).unwrap();
        assert_eq!(fd.handle_type(), HandleType::Disk);
        assert!(fd.is_non_blocking().unwrap());
    }

    #[test]
    fn overlapped_read_advances_offset_to_file_length() {
        let contents = b"0123456789abcdefghij";
        let (_tmp, mut fd) = overlapped_file(contents);
        assert_eq!(fd.handle_type(), HandleType::Disk);
        fd.enable_overlapped(4).unwrap();
        assert!(fd.is_overlapped());

        assert_eq!(drain(&mut fd, &[64]), contents);
        assert_eq!(fd.offset(), contents.len() as u64);
        let reader = fd.reader.as_ref().unwrap();
        assert_eq!(reader.state, OverlappedState::Idle);
        assert!(reader.ready.is_empty());
    }

    #[test]
    fn mixed_buffer_sizes_lose_no_bytes() {
        let contents: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let (_tmp, mut fd) = overlapped_file(&contents);
        fd.enable_overlapped(16).unwrap();
        assert_eq!(drain(&mut fd, &[16, 3, 1, 64]), contents);
        assert_eq!(fd.offset(), 1000);
    }

    #[test]
    fn leftover_scratch_bytes_are_served_before_a_new_read() {
        let (_tmp, mut fd) = overlapped_file(b"abcdef");
        fd.enable_overlapped(8).unwrap();
        let handle = fd.raw();
        let reader = fd.reader.as_mut().unwrap();
        reader.scratch[..4].copy_from_slice(b"WXYZ");
        reader.ready = 0..4;

        // Staged bytes are handed out without touching the file or cursor.
        let mut offset = 0;
        let mut buf = [0u8; 3];
        assert_eq!(reader.read(handle, &mut offset, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"WXY");
        assert_eq!(reader.read(handle, &mut offset, &mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"Z");
        assert_eq!(offset, 0);
        assert_eq!(reader.state, OverlappedState::Idle);
    }

    #[test]
    fn invalid_parameter_past_end_is_eof() {
        let (_tmp, fd) = overlapped_file(b"hello");
        let handle = fd.raw();
        assert_eq!(eof_by_offset(handle, 5, ERROR_INVALID_PARAMETER).unwrap(), 0);
        assert_eq!(eof_by_offset(handle, 9, ERROR_INVALID_PARAMETER).unwrap(), 0);
        let err = eof_by_offset(handle, 2, ERROR_INVALID_PARAMETER).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER as i32));
    }

    #[test]
    fn clone_continues_from_the_shared_offset() {
        let (_tmp, mut fd) = overlapped_file(b"abcdefgh");
        fd.enable_overlapped(4).unwrap();
        let mut buf = [0u8; 4];
        loop {
            match fd.read_raw(&mut buf) {
                Ok(n) => {
                    assert_eq!(&buf[..n], b"abcd");
                    break;
                }
                Err(err) if err.raw_os_error() == Some(ERROR_IO_INCOMPLETE as i32) => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(err) => panic!("overlapped read failed: {err}"),
            }
        }
        let mut clone = fd.try_clone().unwrap();
        assert!(clone.is_overlapped());
        assert_eq!(clone.offset(), 4);
        assert_eq!(drain(&mut clone, &[8]), b"efgh");
    }
}
