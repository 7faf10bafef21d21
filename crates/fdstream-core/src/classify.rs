//! Maps raw read/write results onto a platform-neutral outcome.

use std::io;

use crate::error::OsError;

/// What one raw read or write amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `n > 0` bytes transferred
    Data(usize),
    /// Zero-length read, or a platform code that means the peer is gone
    Eof,
    /// Nothing available right now; try again later
    WouldBlock,
    /// A signal cut the call short before anything moved; reissue it
    Interrupted,
    /// Anything else
    Os(OsError),
}

fn is_would_block(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    err.raw_os_error()
        .is_some_and(|code| fdstream_sys::would_block_codes().contains(&code))
}

fn is_end_of_stream(err: &io::Error) -> bool {
    err.raw_os_error()
        .is_some_and(|code| fdstream_sys::end_of_stream_codes().contains(&code))
}

/// Classify the result of one raw read.
pub fn classify_read(result: io::Result<usize>) -> Outcome {
    match result {
        Ok(0) => Outcome::Eof,
        Ok(n) => Outcome::Data(n),
        Err(err) if err.kind() == io::ErrorKind::Interrupted => Outcome::Interrupted,
        Err(err) if is_would_block(&err) => Outcome::WouldBlock,
        Err(err) if is_end_of_stream(&err) => Outcome::Eof,
        Err(err) => Outcome::Os(OsError::from(&err)),
    }
}
