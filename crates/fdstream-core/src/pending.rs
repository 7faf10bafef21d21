//! Bytes pulled from the OS but not yet handed to a caller.
//!
//! A line read that finds its delimiter mid-chunk stores the tail here; the
//! next read of any kind drains it before touching the descriptor.

/// Over-read cache owned by one stream.
#[derive(Debug, Default, Clone)]
pub struct PendingData {
    buf: Vec<u8>,
}

impl PendingData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take bytes up to the first `\n`.
    ///
    /// Returns the prefix and whether the delimiter was found. With `keep`
    /// the delimiter is included in the prefix. The delimiter is always
    /// removed from the cache. When there is no delimiter the whole cache
    /// is returned and the cache is left empty.
    pub fn drain_line(&mut self, keep: bool) -> (Vec<u8>, bool) {
        match memchr::memchr(b'\n', &self.buf) {
            Some(pos) => {
                let rest = self.buf.split_off(pos + 1);
                let mut line = std::mem::replace(&mut self.buf, rest);
                if !keep {
                    line.pop();
                }
                (line, true)
            }
            None => (self.drain_all(), false),
        }
    }

    /// Take at most `n` bytes from the front.
    pub fn drain_exact(&mut self, n: usize) -> Vec<u8> {
        if n >= self.buf.len() {
            return self.drain_all();
        }
        let rest = self.buf.split_off(n);
        std::mem::replace(&mut self.buf, rest)
    }

    /// Take everything.
    pub fn drain_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Append to the back of the cache.
    pub fn store(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}
