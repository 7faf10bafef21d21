//! Read selectors: what the caller wants back from one read call.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    /// One line, delimiter stripped (`"l"`)
    Line,
    /// One line, delimiter kept (`"L"`)
    LineKeep,
    /// Exactly this many bytes, fewer only at end of stream
    Exact(usize),
    /// Everything up to end of stream (`"a"`)
    All,
}

impl ReadKind {
    /// Parse a format string. A leading `*` is accepted and ignored.
    pub fn parse(format: &str) -> Result<Self> {
        let format = format.strip_prefix('*').unwrap_or(format);
        match format {
            "l" => Ok(Self::Line),
            "L" => Ok(Self::LineKeep),
            "a" => Ok(Self::All),
            _ => Err(Error::InvalidArgument("invalid format".into())),
        }
    }

    /// Short name used in log fields.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::LineKeep => "line_keep",
            Self::Exact(_) => "exact",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "l"),
            Self::LineKeep => write!(f, "L"),
            Self::Exact(n) => write!(f, "{n}"),
            Self::All => write!(f, "a"),
        }
    }
}

/// An unvalidated selector as a caller hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Format(String),
    Count(i64),
}

impl Selector {
    pub fn into_kind(self) -> Result<ReadKind> {
        match self {
            Self::Format(f) => ReadKind::parse(&f),
            Self::Count(n) => usize::try_from(n)
                .map(ReadKind::Exact)
                .map_err(|_| Error::InvalidArgument(format!("invalid byte count: {n}"))),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    /// Integers become counts, anything else a format string.
    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<i64>() {
            Ok(n) => Ok(Self::Count(n)),
            Err(_) => Ok(Self::Format(s.to_string())),
        }
    }
}

impl From<i64> for Selector {
    fn from(n: i64) -> Self {
        Self::Count(n)
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Self::Format(s.to_string())
    }
}
