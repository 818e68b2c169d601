//! Scripted in-memory transport
//!
//! Every complete line written to the transport consumes the next scripted
//! [`Reply`] and makes it readable. When the script runs out the modem goes
//! quiet. Clones share state, so a test can keep a handle after moving the
//! transport into an engine.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::transport::Transport;

/// What the scripted modem does after receiving a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Make these bytes readable at once
    Bytes(Vec<u8>),
    /// Make each chunk readable in turn, with an empty poll in between
    Chunks(Vec<Vec<u8>>),
    /// Say nothing
    Silence,
    /// Close the channel (reads return end-of-stream)
    Hangup,
}

impl Reply {
    /// `"\r\nOK\r\n"`
    pub fn ok() -> Self {
        Reply::text("\r\nOK\r\n")
    }

    /// `"\r\nERROR\r\n"`
    pub fn error() -> Self {
        Reply::text("\r\nERROR\r\n")
    }

    /// Information line followed by the `OK` terminator
    pub fn info(line: &str) -> Self {
        Reply::text(&format!("\r\n{}\r\n\r\nOK\r\n", line))
    }

    /// Literal reply text
    pub fn text(text: &str) -> Self {
        Reply::Bytes(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<Reply>,
    written: Vec<u8>,
    lines: Vec<String>,
    partial_line: Vec<u8>,
    readable: VecDeque<u8>,
    chunks: VecDeque<Vec<u8>>,
    gap_reported: bool,
    closed: bool,
    fail_writes: bool,
}

impl State {
    fn on_line(&mut self, line: String) {
        self.lines.push(line);
        match self.script.pop_front().unwrap_or(Reply::Silence) {
            Reply::Bytes(bytes) => self.readable.extend(bytes),
            Reply::Chunks(chunks) => {
                self.chunks.extend(chunks);
                self.gap_reported = false;
            }
            Reply::Silence => {}
            Reply::Hangup => self.closed = true,
        }
    }

    fn refill(&mut self) {
        if !self.readable.is_empty() || self.chunks.is_empty() {
            return;
        }
        if !self.gap_reported {
            self.gap_reported = true;
            return;
        }
        if let Some(chunk) = self.chunks.pop_front() {
            self.readable.extend(chunk);
        }
        self.gap_reported = false;
    }
}

/// In-memory transport replaying a script of replies
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    /// Transport that answers each written command with the next reply
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        let transport = Self::default();
        transport.lock().script.extend(script);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue more replies
    pub fn push(&self, reply: Reply) {
        self.lock().script.push_back(reply);
    }

    /// Make bytes readable right now, as if the modem sent them unprompted
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().readable.extend(bytes.iter().copied());
    }

    /// Make every subsequent write fail with a broken-pipe error
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// Raw bytes written so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Complete lines written so far, without terminators
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.readable.is_empty() && state.closed {
            return Ok(0);
        }
        let mut n = 0;
        while n < buf.len() {
            match state.readable.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
        }
        Ok(n)
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"));
        }
        state.written.extend_from_slice(buf);
        for &byte in buf {
            state.partial_line.push(byte);
            if state.partial_line.ends_with(b"\r\n") {
                let len = state.partial_line.len() - 2;
                let line = String::from_utf8_lossy(&state.partial_line[..len]).into_owned();
                state.partial_line.clear();
                state.on_line(line);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut state = self.lock();
        state.refill();
        if state.readable.is_empty() && state.closed {
            // Let the reader observe end-of-stream
            return Ok(1);
        }
        Ok(state.readable.len())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.readable.clear();
        state.chunks.clear();
        Ok(())
    }
}
