#![no_main]

use std::collections::VecDeque;
use std::io;

use fdstream_core::{Capability, Descriptor, EngineConfig, Error, Stream};
use libfuzzer_sys::fuzz_target;

/// Hands out the scripted chunks one read at a time, then end of stream.
struct Chunks(VecDeque<Vec<u8>>);

impl Descriptor for Chunks {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.0.pop_front() else {
            return Ok(0);
        };
        if chunk.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.0.push_front(chunk[n..].to_vec());
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn is_non_blocking(&self) -> io::Result<bool> {
        Ok(true)
    }

    fn set_non_blocking(&mut self, _non_blocking: bool) -> io::Result<()> {
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self(VecDeque::new()))
    }

    fn close(self) -> io::Result<()> {
        Ok(())
    }

    fn release(self) {}

    fn raw_id(&self) -> i64 {
        0
    }
}

// Input layout: [chunk_size, cut_count, cuts..., payload...]. An empty
// chunk stands for a would-block gap.
fuzz_target!(|data: &[u8]| {
    let [chunk_size, cut_count, rest @ ..] = data else {
        return;
    };
    let cut_count = usize::from(*cut_count % 16).min(rest.len());
    let (cuts, payload) = rest.split_at(cut_count);

    let mut chunks = VecDeque::new();
    let mut start = 0;
    for &cut in cuts {
        let end = (start + usize::from(cut)).min(payload.len());
        chunks.push_back(payload[start..end].to_vec());
        start = end;
    }
    chunks.push_back(payload[start..].to_vec());

    let config = EngineConfig {
        chunk_size: usize::from(*chunk_size).max(1),
        poll_divisor: 1000,
        ..EngineConfig::default()
    };
    let mut stream = Stream::owned(Chunks(chunks), Capability::Readable).with_config(config);

    let mut expected: Vec<&[u8]> = payload.split(|&b| b == b'\n').collect();
    if expected.last().is_some_and(|tail| tail.is_empty()) {
        expected.pop();
    }

    let mut got = Vec::new();
    loop {
        match stream.read_line(false, Some(1000)) {
            Ok(line) => got.push(line),
            Err(Error::Eof) => break,
            Err(err) => panic!("unexpected read error: {err}"),
        }
    }

    assert_eq!(got.len(), expected.len());
    for (line, want) in got.iter().zip(expected) {
        assert_eq!(line.as_slice(), want);
    }
    assert_eq!(stream.pending_len(), 0);
});
