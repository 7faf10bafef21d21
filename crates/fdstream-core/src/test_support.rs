//! Scripted descriptor for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::backend::Descriptor;

/// What the next raw read returns.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Interrupted,
    Eof,
    Fail(i32),
}

/// Shared observation point for a descriptor and its clones.
#[derive(Debug, Default)]
pub struct Probe {
    pub closes: Cell<usize>,
    pub releases: Cell<usize>,
    pub reads: Cell<usize>,
    pub os_nonblocking: Cell<bool>,
    pub mode_sets: RefCell<Vec<bool>>,
    pub written: RefCell<Vec<u8>>,
}

#[derive(Debug)]
pub struct Scripted {
    steps: VecDeque<Step>,
    write_limit: Option<usize>,
    write_error: Option<i32>,
    pub probe: Rc<Probe>,
}

impl Scripted {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            write_limit: None,
            write_error: None,
            probe: Rc::new(Probe::default()),
        }
    }

    /// No data ever arrives.
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    /// Chunks of data followed by end of stream.
    pub fn chunks(chunks: &[&[u8]]) -> Self {
        let mut steps: Vec<Step> = chunks.iter().map(|c| Step::Data(c.to_vec())).collect();
        steps.push(Step::Eof);
        Self::new(steps)
    }

    /// Accept at most `limit` bytes per write.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn with_write_error(mut self, code: i32) -> Self {
        self.write_error = Some(code);
        self
    }
}

impl Descriptor for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.probe.reads.set(self.probe.reads.get() + 1);
        match self.steps.pop_front() {
            None | Some(Step::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Eof) => {
                self.steps.push_front(Step::Eof);
                Ok(0)
            }
            Some(Step::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
            Some(Step::Fail(code)) => Err(io::Error::from_raw_os_error(code)),
            Some(Step::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(Step::Data(bytes[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(code) = self.write_error {
            return Err(io::Error::from_raw_os_error(code));
        }
        let n = self.write_limit.map_or(buf.len(), |l| l.min(buf.len()));
        self.probe.written.borrow_mut().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn is_non_blocking(&self) -> io::Result<bool> {
        Ok(self.probe.os_nonblocking.get())
    }

    fn set_non_blocking(&mut self, non_blocking: bool) -> io::Result<()> {
        self.probe.mode_sets.borrow_mut().push(non_blocking);
        self.probe.os_nonblocking.set(non_blocking);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            steps: VecDeque::new(),
            write_limit: self.write_limit,
            write_error: self.write_error,
            probe: Rc::clone(&self.probe),
        })
    }

    fn close(self) -> io::Result<()> {
        self.probe.closes.set(self.probe.closes.get() + 1);
        Ok(())
    }

    fn release(self) {
        self.probe.releases.set(self.probe.releases.get() + 1);
    }

    fn raw_id(&self) -> i64 {
        42
    }
}
