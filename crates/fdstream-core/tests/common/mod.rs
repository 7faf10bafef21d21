//! Shared test infrastructure for fdstream-core integration tests.
//!
//! Import from integration test files with:
//! ```ignore
//! mod common;
//! use common::Chunked;
//! ```

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use fdstream_core::Descriptor;

/// Syscall counters shared between a descriptor and its clones.
#[derive(Debug, Default)]
pub struct Counters {
    pub reads: Cell<usize>,
    pub writes: Cell<usize>,
    pub closes: Cell<usize>,
}

/// In-memory descriptor that hands out pre-split chunks, one per read.
///
/// An exhausted queue reports would-block unless `eof` is set, in which
/// case it reports end of stream.
#[derive(Debug)]
pub struct Chunked {
    chunks: VecDeque<Vec<u8>>,
    eof: bool,
    accept: Option<usize>,
    non_blocking: bool,
    pub counters: Rc<Counters>,
}

impl Chunked {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            eof: false,
            accept: None,
            non_blocking: false,
            counters: Rc::new(Counters::default()),
        }
    }

    /// Report end of stream once the chunks run out.
    pub fn then_eof(mut self) -> Self {
        self.eof = true;
        self
    }

    /// Accept at most `n` bytes per write.
    pub fn accepting(mut self, n: usize) -> Self {
        self.accept = Some(n);
        self
    }
}

impl Descriptor for Chunked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.counters.reads.set(self.counters.reads.get() + 1);
        let Some(chunk) = self.chunks.pop_front() else {
            return if self.eof {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk[n..].to_vec());
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.counters.writes.set(self.counters.writes.get() + 1);
        Ok(self.accept.map_or(buf.len(), |n| n.min(buf.len())))
    }

    fn is_non_blocking(&self) -> io::Result<bool> {
        Ok(self.non_blocking)
    }

    fn set_non_blocking(&mut self, non_blocking: bool) -> io::Result<()> {
        self.non_blocking = non_blocking;
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            chunks: VecDeque::new(),
            eof: self.eof,
            accept: self.accept,
            non_blocking: self.non_blocking,
            counters: Rc::new(Counters::default()),
        })
    }

    fn close(self) -> io::Result<()> {
        self.counters.closes.set(self.counters.closes.get() + 1);
        Ok(())
    }

    fn release(self) {}

    fn raw_id(&self) -> i64 {
        7
    }
}

/// Split `data` at the given cut points into consecutive chunks.
pub fn split_at_points(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    points.sort_unstable();
    points.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        if point > start {
            chunks.push(data[start..point].to_vec());
            start = point;
        }
    }
    if start < data.len() {
        chunks.push(data[start..].to_vec());
    }
    chunks
}
