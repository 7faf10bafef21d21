//! The stream entity: one OS descriptor plus the engine state around it.
//!
//! A [`Stream`] is either *owning* (closing it closes the descriptor) or
//! *borrowed* (closing it only marks it closed; the descriptor belongs to
//! someone else). Clones are always owning: they hold their own duplicated
//! descriptor and close independently of the stream they came from.
//!
//! ```no_run
//! use fdstream_core::{Capability, Stream};
//! use fdstream_sys::Pipe;
//!
//! let pipe = Pipe::new()?;
//! let mut reader = Stream::owned(pipe.read, Capability::Readable);
//! let mut writer = Stream::owned(pipe.write, Capability::Writable);
//!
//! writer.write(b"ab\ncd")?;
//! writer.close()?;
//!
//! assert_eq!(reader.read_line(false, Some(100))?, b"ab");
//! assert_eq!(reader.read_line(false, Some(100))?, b"cd");
//! # Ok::<(), fdstream_core::Error>(())
//! ```

use std::fmt;

use fdstream_sys::{AccessMode, FileDescriptor, StdioDescriptor};

use crate::backend::Descriptor;
use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::pending::PendingData;
use crate::read::{self, ReadOutcome};
use crate::request::{ReadKind, Selector};
use crate::write;

/// Which directions a stream may be used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Readable,
    Writable,
    ReadWrite,
}

impl Capability {
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Readable | Self::ReadWrite)
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Writable | Self::ReadWrite)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readable => "readable",
            Self::Writable => "writable",
            Self::ReadWrite => "read-write",
        }
    }
}

impl From<AccessMode> for Capability {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::ReadOnly => Self::Readable,
            AccessMode::WriteOnly => Self::Writable,
            AccessMode::ReadWrite => Self::ReadWrite,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Stream<D: Descriptor = FileDescriptor> {
    handle: Option<D>,
    capability: Capability,
    closed: bool,
    persistent_nonblocking: bool,
    owns_handle: bool,
    pending: PendingData,
    config: EngineConfig,
}

impl<D: Descriptor> Stream<D> {
    fn from_parts(handle: Option<D>, capability: Capability, owns_handle: bool) -> Self {
        Self {
            handle,
            capability,
            closed: false,
            persistent_nonblocking: false,
            owns_handle,
            pending: PendingData::new(),
            config: EngineConfig::default(),
        }
    }

    /// A stream with no descriptor. Every operation except `close` fails
    /// with [`Error::BadHandle`].
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(None, Capability::ReadWrite, false)
    }

    /// Take ownership of `handle`; closing the stream closes it.
    pub fn owned(handle: D, capability: Capability) -> Self {
        Self::from_parts(Some(handle), capability, true)
    }

    /// Wrap a descriptor owned elsewhere; closing the stream leaves it open.
    pub fn borrowed(handle: D, capability: Capability) -> Self {
        Self::from_parts(Some(handle), capability, false)
    }

    /// Install engine settings. A zero `chunk_size` is raised to 1 so line
    /// and read-all reads never hand the OS an empty buffer.
    #[must_use]
    pub fn with_config(mut self, mut config: EngineConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        self.config = config;
        self
    }

    /// Like [`with_config`](Self::with_config), but rejects settings that
    /// fail [`EngineConfig::validate`].
    pub fn try_with_config(self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(self.with_config(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn owns_handle(&self) -> bool {
        self.owns_handle
    }

    /// Bytes read from the OS but not yet returned.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The persistent blocking-mode preference.
    pub fn is_nonblocking(&self) -> bool {
        self.persistent_nonblocking
    }

    /// Change the persistent preference. The OS mode is left alone until
    /// the next read applies it.
    pub fn set_nonblocking(&mut self, non_blocking: bool) {
        self.persistent_nonblocking = non_blocking;
    }

    /// The OS-level mode right now, which may differ from the preference.
    pub fn os_nonblocking(&self) -> Result<bool> {
        let handle = self.live_handle()?;
        handle.is_non_blocking().map_err(Error::os)
    }

    fn live_handle(&self) -> Result<&D> {
        if self.closed {
            return Err(Error::BadHandle("stream is closed"));
        }
        self.handle
            .as_ref()
            .ok_or(Error::BadHandle("stream has no handle"))
    }

    fn check_readable(&self) -> Result<()> {
        self.live_handle()?;
        if self.capability.is_readable() {
            Ok(())
        } else {
            Err(Error::BadHandle("stream is not readable"))
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.live_handle()?;
        if self.capability.is_writable() {
            Ok(())
        } else {
            Err(Error::BadHandle("stream is not writable"))
        }
    }

    /// Run a read with an already resolved deadline.
    pub fn read(&mut self, kind: ReadKind, deadline: Deadline) -> Result<ReadOutcome> {
        self.check_readable()?;
        let Self {
            handle: Some(handle),
            pending,
            config,
            persistent_nonblocking,
            ..
        } = self
        else {
            return Err(Error::BadHandle("stream has no handle"));
        };
        Ok(read::read(
            handle,
            pending,
            kind,
            deadline,
            *persistent_nonblocking,
            config,
        ))
    }

    /// Resolve a caller timeout against this stream's mode and divisor.
    pub fn deadline(&self, timeout: Option<i64>) -> Result<Deadline> {
        Deadline::resolve(
            timeout,
            self.config.timeout_divisor,
            self.persistent_nonblocking,
        )
    }

    /// Read with a selector (`"l"`, `"L"`, `"a"` or a byte count).
    ///
    /// Malformed selectors and timeouts are rejected before any I/O. The
    /// returned outcome carries partial data on timeout or OS error.
    pub fn read_request(
        &mut self,
        selector: impl Into<Selector>,
        timeout: Option<i64>,
    ) -> Result<ReadOutcome> {
        self.check_readable()?;
        let kind = selector.into().into_kind()?;
        let deadline = self.deadline(timeout)?;
        self.read(kind, deadline)
    }

    pub fn read_line(&mut self, keep_newline: bool, timeout: Option<i64>) -> Result<Vec<u8>> {
        let kind = if keep_newline {
            ReadKind::LineKeep
        } else {
            ReadKind::Line
        };
        self.check_readable()?;
        let deadline = self.deadline(timeout)?;
        self.read(kind, deadline)?.into_result()
    }

    pub fn read_exact(&mut self, n: usize, timeout: Option<i64>) -> Result<Vec<u8>> {
        self.check_readable()?;
        let deadline = self.deadline(timeout)?;
        self.read(ReadKind::Exact(n), deadline)?.into_result()
    }

    /// Read until end of stream.
    pub fn read_to_end(&mut self, timeout: Option<i64>) -> Result<Vec<u8>> {
        self.check_readable()?;
        let deadline = self.deadline(timeout)?;
        self.read(ReadKind::All, deadline)?.into_result()
    }

    /// Write the whole buffer in one call. A short write is an error.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_writable()?;
        match self.handle.as_mut() {
            Some(handle) => write::write(handle, buf),
            None => Err(Error::BadHandle("stream has no handle")),
        }
    }

    fn clone_as(&self, capability: Capability) -> Result<Self> {
        let source = self.live_handle()?;
        let duplicate = source.try_clone().map_err(Error::os)?;
        tracing::debug!(
            fd = source.raw_id(),
            clone_fd = duplicate.raw_id(),
            capability = capability.as_str(),
            "cloned stream"
        );
        let mut clone = Self::owned(duplicate, capability);
        clone.persistent_nonblocking = self.persistent_nonblocking;
        clone.config = self.config.clone();
        Ok(clone)
    }

    /// Duplicate the descriptor into a new owning stream with the same
    /// capability. Pending bytes stay with `self`.
    pub fn try_clone(&self) -> Result<Self> {
        self.clone_as(self.capability)
    }

    fn check_narrowable(&self) -> Result<()> {
        self.live_handle()?;
        if self.capability == Capability::ReadWrite {
            Ok(())
        } else {
            Err(Error::BadHandle("only a read-write stream can be narrowed"))
        }
    }

    /// A read-only clone of a read-write stream.
    pub fn as_readable(&self) -> Result<Self> {
        self.check_narrowable()?;
        self.clone_as(Capability::Readable)
    }

    /// A write-only clone of a read-write stream.
    pub fn as_writable(&self) -> Result<Self> {
        self.check_narrowable()?;
        self.clone_as(Capability::Writable)
    }

    /// Close the stream. Closing twice is a no-op.
    ///
    /// An owning stream closes its descriptor and reports the close call's
    /// failure. A borrowed stream gives the descriptor back untouched.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending.drain_all();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        tracing::debug!(fd = handle.raw_id(), owned = self.owns_handle, "closing stream");
        if self.owns_handle {
            handle.close().map_err(Error::os)
        } else {
            handle.release();
            Ok(())
        }
    }
}

impl<D: Descriptor> Default for Stream<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Descriptor> Drop for Stream<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "close on drop failed");
        }
    }
}

impl<D: Descriptor> fmt::Debug for Stream<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("fd", &self.handle.as_ref().map(Descriptor::raw_id))
            .field("capability", &self.capability)
            .field("closed", &self.closed)
            .field("persistent_nonblocking", &self.persistent_nonblocking)
            .field("owns_handle", &self.owns_handle)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Stream<FileDescriptor> {
    /// An owning stream over a duplicate of `file`'s descriptor, tagged
    /// with the access mode the file was opened with.
    pub fn from_file(file: &std::fs::File) -> Result<Self> {
        let fd = FileDescriptor::dup(file)?;
        let capability = Capability::from(fd.access_mode()?);
        Ok(Self::owned(fd, capability))
    }

    /// A borrowed stream over one of the process's standard streams.
    pub fn stdio(which: StdioDescriptor) -> Self {
        let capability = match which {
            StdioDescriptor::Stdin => Capability::Readable,
            StdioDescriptor::Stdout | StdioDescriptor::Stderr => Capability::Writable,
        };
        Self::borrowed(FileDescriptor::borrow_stdio(which), capability)
    }

    /// A `File` over a duplicate of the descriptor. The stream stays usable.
    pub fn to_file(&self) -> Result<std::fs::File> {
        Ok(self.live_handle()?.as_file()?)
    }

    /// Route reads through the overlapped state machine. Only for handles
    /// opened with `FILE_FLAG_OVERLAPPED`.
    #[cfg(windows)]
    pub fn enable_overlapped(&mut self) -> Result<()> {
        let capacity = self.config.overlapped_scratch_capacity;
        if self.closed {
            return Err(Error::BadHandle("stream is closed"));
        }
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.enable_overlapped(capacity)?),
            None => Err(Error::BadHandle("stream has no handle")),
        }
    }

    /// Position of the next overlapped read or write.
    #[cfg(windows)]
    pub fn overlapped_offset(&self) -> Result<u64> {
        Ok(self.live_handle()?.offset())
    }
}
