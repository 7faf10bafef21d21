//! Transient non-blocking mode around a single read.
//!
//! [`ModeGuard::enter`] makes the descriptor non-blocking at the OS level
//! for as long as the guard lives. Dropping the guard puts the descriptor
//! back into the stream's persistent mode. A failed restore is logged and
//! otherwise ignored so bytes already read are never lost to it.

use std::io;
use std::ops::{Deref, DerefMut};

use crate::backend::Descriptor;

pub struct ModeGuard<'a, D: Descriptor> {
    handle: &'a mut D,
    persistent_nonblocking: bool,
    forced: bool,
}

impl<'a, D: Descriptor> ModeGuard<'a, D> {
    /// Query the OS mode and force non-blocking if needed.
    pub fn enter(handle: &'a mut D, persistent_nonblocking: bool) -> io::Result<Self> {
        let forced = !handle.is_non_blocking()?;
        if forced {
            handle.set_non_blocking(true)?;
            tracing::debug!(fd = handle.raw_id(), "forced non-blocking for read");
        }
        Ok(Self {
            handle,
            persistent_nonblocking,
            forced,
        })
    }

    /// Whether `enter` had to change the OS mode.
    #[must_use]
    pub fn forced(&self) -> bool {
        self.forced
    }
}

impl<D: Descriptor> Deref for ModeGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.handle
    }
}

impl<D: Descriptor> DerefMut for ModeGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.handle
    }
}

impl<D: Descriptor> Drop for ModeGuard<'_, D> {
    fn drop(&mut self) {
        // Already in the persistent mode and untouched by us.
        if self.persistent_nonblocking && !self.forced {
            return;
        }
        let target = self.persistent_nonblocking;
        if let Err(err) = self.handle.set_non_blocking(target) {
            tracing::debug!(
                fd = self.handle.raw_id(),
                non_blocking = target,
                error = %err,
                "failed to restore blocking mode"
            );
        } else if self.forced {
            tracing::debug!(
                fd = self.handle.raw_id(),
                non_blocking = target,
                "restored blocking mode"
            );
        }
    }
}
