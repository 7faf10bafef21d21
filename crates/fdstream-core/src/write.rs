//! Whole-buffer writes.
//!
//! One write call per request. A write the OS only partly accepts is a
//! failure; the remainder is not retried.

use crate::backend::Descriptor;
use crate::error::{Error, OsError, Result};

pub fn write<D: Descriptor>(handle: &mut D, buf: &[u8]) -> Result<()> {
    let fd = handle.raw_id();
    match handle.write(buf) {
        Ok(n) if n == buf.len() => {
            tracing::trace!(fd, bytes = n, "write");
            Ok(())
        }
        Ok(n) => {
            // TODO: loop on the remainder once callers can be told how much
            // of the buffer was written.
            tracing::warn!(fd, requested = buf.len(), written = n, "short write");
            Err(Error::os(OsError::short_write()))
        }
        Err(err) => {
            tracing::debug!(fd, requested = buf.len(), error = %err, "write failed");
            Err(Error::os(err))
        }
    }
}
