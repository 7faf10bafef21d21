//! fdstream-core: deadline-bounded reads and writes over OS descriptors
//!
//! Turns blocking files, pipes and sockets into streams that support
//! read-line, read-exact, read-all and whole-buffer writes with a timeout,
//! without a reactor or readiness notification. Each call forces the
//! descriptor non-blocking, polls it with short sleeps until the request is
//! satisfied or the deadline passes, then restores the caller's mode.
//!
//! # Architecture
//!
//! ```text
//! Stream ─→ ModeGuard ─→ read engine ─→ Descriptor (fdstream-sys)
//!   │            ↑             │
//!   │            └── restore ──┤
//!   └─ PendingData ←── over-read tail
//! ```
//!
//! # Modules
//!
//! - `stream`: the Stream entity, capability tags, open/close/clone
//! - `read`: the timeout-bounded read loop and its outcome type
//! - `write`: single-call whole-buffer writes
//! - `pending`: over-read cache between calls
//! - `blocking`: transient non-blocking mode guard
//! - `classify`: raw result → data / end / would-block / OS error
//! - `deadline`: caller timeouts → deadlines and poll intervals
//! - `request`: read selectors (`l`, `L`, `a`, byte count)
//! - `backend`: the `Descriptor` trait the engine runs against
//! - `config`: engine tuning and TOML loading
//! - `logging`: tracing subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code. Everything that touches the OS lives in
//! `fdstream-sys`.

#![forbid(unsafe_code)]

pub mod backend;
pub mod blocking;
pub mod classify;
pub mod config;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod pending;
pub mod read;
pub mod request;
pub mod stream;
pub mod write;

#[cfg(test)]
mod test_support;

pub use backend::Descriptor;
pub use config::{Config, EngineConfig};
pub use deadline::Deadline;
pub use error::{ConfigError, Error, OsError, Result};
pub use read::{ReadOutcome, ReadStatus};
pub use request::{ReadKind, Selector};
pub use stream::{Capability, Stream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
