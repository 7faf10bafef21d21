//! Caller timeouts resolved into engine deadlines.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Sentinel timeout meaning "use the stream's persistent mode".
pub const PERSISTENT_DEFAULT: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Wait until the request is satisfied or the stream ends
    Infinite,
    /// One poll, no sleep
    Immediate,
    /// Give up after this many milliseconds
    Millis(u64),
}

impl Deadline {
    /// Resolve a caller timeout.
    ///
    /// `divisor` is the number of caller units per second: 1000 when the
    /// caller speaks milliseconds, 1 for seconds. An absent timeout, or
    /// [`PERSISTENT_DEFAULT`], waits forever on a blocking stream and polls
    /// once on a non-blocking one.
    pub fn resolve(
        requested: Option<i64>,
        divisor: u32,
        persistent_nonblocking: bool,
    ) -> Result<Self> {
        if divisor == 0 {
            return Err(Error::InvalidArgument("timeout divisor must be > 0".into()));
        }
        let value = requested.unwrap_or(PERSISTENT_DEFAULT);
        match value {
            PERSISTENT_DEFAULT if persistent_nonblocking => Ok(Self::Immediate),
            PERSISTENT_DEFAULT => Ok(Self::Infinite),
            0 => Ok(Self::Immediate),
            v if v < 0 => Err(Error::InvalidArgument(format!("invalid timeout: {v}"))),
            v => {
                let ms = (v as u128 * 1000) / u128::from(divisor);
                Ok(Self::Millis(u64::try_from(ms).unwrap_or(u64::MAX)))
            }
        }
    }

    /// Deadline length, `None` when infinite.
    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Immediate => Some(Duration::ZERO),
            Self::Millis(ms) => Some(Duration::from_millis(ms)),
        }
    }

    /// How long to sleep between would-block polls.
    #[must_use]
    pub fn poll_interval(self, config: &EngineConfig) -> Duration {
        match self {
            Self::Infinite => config.infinite_poll_interval(),
            Self::Immediate => Duration::ZERO,
            Self::Millis(ms) => config.poll_interval_for(ms),
        }
    }

    /// Milliseconds for log fields, `None` when infinite.
    #[must_use]
    pub fn millis(self) -> Option<u64> {
        match self {
            Self::Infinite => None,
            Self::Immediate => Some(0),
            Self::Millis(ms) => Some(ms),
        }
    }
}
