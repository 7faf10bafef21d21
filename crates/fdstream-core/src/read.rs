//! Timeout-bounded reads.
//!
//! Every read kind runs through [`read`]:
//!
//! 1. Serve the request from the pending cache if it can be satisfied there.
//!    This never touches the descriptor.
//! 2. Force the descriptor non-blocking for the duration of the call.
//! 3. Loop on single raw reads. Data is accumulated; a line read stops at
//!    the first `\n` and caches whatever followed it. Would-block sleeps one
//!    poll interval and then checks the deadline. End of stream stops the
//!    loop. Any other OS error stops it and is reported with the bytes read
//!    so far.
//! 4. Restore the persistent blocking mode.
//!
//! A deadline of [`Deadline::Immediate`] never sleeps: the first would-block
//! ends the call with [`ReadStatus::TimedOut`].

use std::time::Instant;

use crate::backend::Descriptor;
use crate::blocking::ModeGuard;
use crate::classify::{Outcome, classify_read};
use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::error::{Error, OsError, Result};
use crate::pending::PendingData;
use crate::request::ReadKind;

/// How a read call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// Delimiter found, count reached, or end of stream after some data
    Complete,
    /// End of stream with nothing read
    Eof,
    /// Deadline elapsed; `data` holds whatever arrived before it
    TimedOut,
    /// OS error; `data` holds whatever arrived before it
    Failed(OsError),
}

/// Bytes produced by one read call together with how the call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub data: Vec<u8>,
    pub status: ReadStatus,
}

impl ReadOutcome {
    fn complete(data: Vec<u8>) -> Self {
        Self {
            data,
            status: ReadStatus::Complete,
        }
    }

    fn ended(data: Vec<u8>) -> Self {
        if data.is_empty() {
            Self {
                data,
                status: ReadStatus::Eof,
            }
        } else {
            Self::complete(data)
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ReadStatus::Complete
    }

    /// Successful data, or an error carrying any partial data.
    pub fn into_result(self) -> Result<Vec<u8>> {
        match self.status {
            ReadStatus::Complete => Ok(self.data),
            ReadStatus::Eof => Err(Error::Eof),
            ReadStatus::TimedOut => Err(Error::Timeout { partial: self.data }),
            ReadStatus::Failed(error) => Err(Error::Os {
                error,
                partial: self.data,
            }),
        }
    }
}

/// Serve as much of `kind` as possible from the cache.
///
/// Returns the accumulated prefix and whether the request is already
/// satisfied.
fn drain_pending(pending: &mut PendingData, kind: ReadKind) -> (Vec<u8>, bool) {
    match kind {
        ReadKind::Line => pending.drain_line(false),
        ReadKind::LineKeep => pending.drain_line(true),
        ReadKind::Exact(n) => {
            let data = pending.drain_exact(n);
            let done = data.len() == n;
            (data, done)
        }
        ReadKind::All => (pending.drain_all(), false),
    }
}

/// Run one read request against `handle`.
pub fn read<D: Descriptor>(
    handle: &mut D,
    pending: &mut PendingData,
    kind: ReadKind,
    deadline: Deadline,
    persistent_nonblocking: bool,
    config: &EngineConfig,
) -> ReadOutcome {
    if kind == ReadKind::Exact(0) {
        return ReadOutcome::complete(Vec::new());
    }

    let start = Instant::now();
    let (mut acc, done) = drain_pending(pending, kind);
    if done {
        return ReadOutcome::complete(acc);
    }

    let fd = handle.raw_id();
    let limit = deadline.as_duration();
    let interval = deadline.poll_interval(config);
    let span = tracing::trace_span!(
        "read",
        fd,
        kind = kind.name(),
        deadline_ms = deadline.millis()
    );
    let _enter = span.enter();

    let mut guard = match ModeGuard::enter(handle, persistent_nonblocking) {
        Ok(guard) => guard,
        Err(err) => {
            return ReadOutcome {
                data: acc,
                status: ReadStatus::Failed(OsError::from(err)),
            };
        }
    };

    let chunk_size = config.chunk_size.max(1);
    let mut chunk = match kind {
        ReadKind::Exact(_) => Vec::new(),
        _ => vec![0u8; chunk_size],
    };

    loop {
        let outcome = match kind {
            // Grow by at most one chunk per read, never to `n` up front.
            ReadKind::Exact(n) => {
                let filled = acc.len();
                acc.resize(filled + (n - filled).min(chunk_size), 0);
                let result = guard.read(&mut acc[filled..]);
                acc.truncate(filled + result.as_ref().map_or(0, |&k| k));
                classify_read(result)
            }
            _ => classify_read(guard.read(&mut chunk)),
        };

        match outcome {
            Outcome::Interrupted => {
                tracing::trace!(total = acc.len(), "interrupted, retrying");
            }
            Outcome::Data(k) => {
                tracing::trace!(bytes = k, total = acc.len(), "chunk");
                match kind {
                    ReadKind::Line | ReadKind::LineKeep => {
                        let fresh = &chunk[..k];
                        if let Some(pos) = memchr::memchr(b'\n', fresh) {
                            acc.extend_from_slice(&fresh[..pos]);
                            if kind == ReadKind::LineKeep {
                                acc.push(b'\n');
                            }
                            pending.store(&fresh[pos + 1..]);
                            return ReadOutcome::complete(acc);
                        }
                        acc.extend_from_slice(fresh);
                    }
                    ReadKind::Exact(n) => {
                        if acc.len() == n {
                            return ReadOutcome::complete(acc);
                        }
                    }
                    ReadKind::All => acc.extend_from_slice(&chunk[..k]),
                }
            }
            Outcome::WouldBlock => {
                if deadline == Deadline::Immediate {
                    tracing::trace!(total = acc.len(), "would block, no wait");
                    return ReadOutcome {
                        data: acc,
                        status: ReadStatus::TimedOut,
                    };
                }
                std::thread::sleep(interval);
                if limit.is_some_and(|limit| start.elapsed() >= limit) {
                    tracing::trace!(total = acc.len(), "deadline elapsed");
                    return ReadOutcome {
                        data: acc,
                        status: ReadStatus::TimedOut,
                    };
                }
            }
            Outcome::Eof => {
                tracing::trace!(total = acc.len(), "end of stream");
                return ReadOutcome::ended(acc);
            }
            Outcome::Os(error) => {
                tracing::trace!(total = acc.len(), code = error.code, "read failed");
                return ReadOutcome {
                    data: acc,
                    status: ReadStatus::Failed(error),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Scripted, Step};
    use std::time::Duration;

    fn run(fd: &mut Scripted, pending: &mut PendingData, kind: ReadKind) -> ReadOutcome {
        read(
            fd,
            pending,
            kind,
            Deadline::Infinite,
            false,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn line_then_remainder_at_eof() {
        let mut fd = Scripted::chunks(&[b"ab\ncd"]);
        let mut pending = PendingData::new();

        let first = run(&mut fd, &mut pending, ReadKind::Line);
        assert_eq!(first, ReadOutcome::complete(b"ab".to_vec()));
        assert_eq!(pending.len(), 2);

        let second = run(&mut fd, &mut pending, ReadKind::Line);
        assert_eq!(second, ReadOutcome::complete(b"cd".to_vec()));
        assert!(pending.is_empty());

        let third = run(&mut fd, &mut pending, ReadKind::Line);
        assert_eq!(third.status, ReadStatus::Eof);
        assert!(third.data.is_empty());
    }

    #[test]
    fn keep_adds_exactly_the_delimiter() {
        let mut pending = PendingData::new();
        let chomp = run(&mut Scripted::chunks(&[b"xy\n"]), &mut pending, ReadKind::Line);
        let keep = run(
            &mut Scripted::chunks(&[b"xy\n"]),
            &mut pending,
            ReadKind::LineKeep,
        );
        assert_eq!(chomp.data, b"xy");
        assert_eq!(keep.data, b"xy\n");
    }

    #[test]
    fn line_split_across_reads() {
        let mut fd = Scripted::chunks(&[b"hel", b"lo", b"\nnext"]);
        let mut pending = PendingData::new();
        let out = run(&mut fd, &mut pending, ReadKind::Line);
        assert_eq!(out.data, b"hello");
        assert_eq!(pending.drain_all(), b"next");
    }

    #[test]
    fn delimiter_at_chunk_boundary() {
        let config = EngineConfig {
            chunk_size: 4,
            ..EngineConfig::default()
        };
        let mut fd = Scripted::chunks(&[b"abc\ndef\n"]);
        let mut pending = PendingData::new();
        let out = read(
            &mut fd,
            &mut pending,
            ReadKind::Line,
            Deadline::Infinite,
            false,
            &config,
        );
        assert_eq!(out.data, b"abc");
        assert!(pending.is_empty());
        let out = read(
            &mut fd,
            &mut pending,
            ReadKind::Line,
            Deadline::Infinite,
            false,
            &config,
        );
        assert_eq!(out.data, b"def");
    }

    #[test]
    fn pending_line_served_without_syscall() {
        let mut fd = Scripted::chunks(&[]);
        let mut pending = PendingData::new();
        pending.store(b"one\ntwo");
        let out = run(&mut fd, &mut pending, ReadKind::Line);
        assert_eq!(out.data, b"one");
        assert_eq!(fd.probe.reads.get(), 0);
        assert!(fd.probe.mode_sets.borrow().is_empty());
    }

    #[test]
    fn exact_combines_pending_and_fresh() {
        let mut fd = Scripted::chunks(&[b"cd", b"efgh"]);
        let mut pending = PendingData::new();
        pending.store(b"ab");
        let out = run(&mut fd, &mut pending, ReadKind::Exact(5));
        assert_eq!(out, ReadOutcome::complete(b"abcde".to_vec()));
        assert!(pending.is_empty());
    }

    #[test]
    fn exact_zero_touches_nothing() {
        let mut fd = Scripted::chunks(&[b"zz"]);
        let mut pending = PendingData::new();
        pending.store(b"keep");
        let out = run(&mut fd, &mut pending, ReadKind::Exact(0));
        assert_eq!(out, ReadOutcome::complete(Vec::new()));
        assert_eq!(pending.len(), 4);
        assert_eq!(fd.probe.reads.get(), 0);
    }

    #[test]
    fn exact_short_at_eof_is_complete() {
        let mut fd = Scripted::chunks(&[b"abc"]);
        let out = run(&mut fd, &mut PendingData::new(), ReadKind::Exact(10));
        assert_eq!(out, ReadOutcome::complete(b"abc".to_vec()));
    }

    #[test]
    fn all_reads_to_eof() {
        let mut fd = Scripted::chunks(&[b"a\n", b"b\n", b"c"]);
        let mut pending = PendingData::new();
        pending.store(b">");
        let out = run(&mut fd, &mut pending, ReadKind::All);
        assert_eq!(out, ReadOutcome::complete(b">a\nb\nc".to_vec()));
    }

    #[test]
    fn immediate_deadline_times_out_without_sleeping() {
        let mut fd = Scripted::new([Step::WouldBlock]);
        let start = Instant::now();
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Line,
            Deadline::Immediate,
            false,
            &EngineConfig::default(),
        );
        assert_eq!(out.status, ReadStatus::TimedOut);
        assert!(out.data.is_empty());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn timeout_keeps_partial_data() {
        let mut fd = Scripted::new([Step::Data(b"par".to_vec())]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Line,
            Deadline::Millis(5),
            false,
            &EngineConfig::default(),
        );
        assert_eq!(out.status, ReadStatus::TimedOut);
        assert_eq!(out.data, b"par");
    }

    #[test]
    fn would_block_then_data_within_deadline() {
        let mut fd = Scripted::new([
            Step::WouldBlock,
            Step::WouldBlock,
            Step::Data(b"late\n".to_vec()),
        ]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Line,
            Deadline::Millis(1000),
            false,
            &EngineConfig::default(),
        );
        assert_eq!(out, ReadOutcome::complete(b"late".to_vec()));
    }

    #[test]
    fn huge_exact_count_times_out_without_allocating() {
        let mut fd = Scripted::new([Step::WouldBlock]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Exact(usize::MAX),
            Deadline::Immediate,
            false,
            &EngineConfig::default(),
        );
        assert_eq!(out.status, ReadStatus::TimedOut);
        assert!(out.data.is_empty());
    }

    #[test]
    fn exact_read_grows_one_chunk_at_a_time() {
        let config = EngineConfig {
            chunk_size: 3,
            ..EngineConfig::default()
        };
        let mut fd = Scripted::chunks(&[b"abcdefgh"]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Exact(7),
            Deadline::Infinite,
            false,
            &config,
        );
        assert_eq!(out, ReadOutcome::complete(b"abcdefg".to_vec()));
        assert_eq!(fd.probe.reads.get(), 3);
    }

    #[test]
    fn interrupted_read_is_retried_under_immediate_deadline() {
        let mut fd = Scripted::new([
            Step::Interrupted,
            Step::Interrupted,
            Step::Data(b"ok\n".to_vec()),
        ]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Line,
            Deadline::Immediate,
            false,
            &EngineConfig::default(),
        );
        assert_eq!(out, ReadOutcome::complete(b"ok".to_vec()));
        assert_eq!(fd.probe.reads.get(), 3);
    }

    #[test]
    fn zero_chunk_size_still_reads_lines() {
        let config = EngineConfig {
            chunk_size: 0,
            ..EngineConfig::default()
        };
        let mut fd = Scripted::chunks(&[b"hi\n"]);
        let out = read(
            &mut fd,
            &mut PendingData::new(),
            ReadKind::Line,
            Deadline::Infinite,
            false,
            &config,
        );
        assert_eq!(out, ReadOutcome::complete(b"hi".to_vec()));
    }

    #[test]
    fn os_error_reports_partial() {
        let mut fd = Scripted::new([Step::Data(b"xy".to_vec()), Step::Fail(5)]);
        let out = run(&mut fd, &mut PendingData::new(), ReadKind::All);
        assert_eq!(out.data, b"xy");
        match out.status {
            ReadStatus::Failed(err) => assert_eq!(err.code, 5),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn blocking_mode_forced_and_restored() {
        let mut fd = Scripted::chunks(&[b"x\n"]);
        run(&mut fd, &mut PendingData::new(), ReadKind::Line);
        assert_eq!(*fd.probe.mode_sets.borrow(), vec![true, false]);
        assert!(!fd.probe.os_nonblocking.get());
    }

    #[test]
    fn into_result_maps_status() {
        let timed_out = ReadOutcome {
            data: b"p".to_vec(),
            status: ReadStatus::TimedOut,
        };
        match timed_out.into_result() {
            Err(Error::Timeout { partial }) => assert_eq!(partial, b"p"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ReadOutcome::ended(Vec::new()).into_result(),
            Err(Error::Eof)
        ));
        assert_eq!(
            ReadOutcome::ended(b"z".to_vec()).into_result().unwrap(),
            b"z"
        );
    }
}
