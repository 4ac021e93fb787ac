//! Line command recognizer
//!
//! Strict prefix matching of `toggle\n` and `read\n` over the receive queue.
//! Any byte that breaks the expected sequence drops back to the idle state
//! and is itself discarded.

use crate::app::Shared;
use crate::error::OsResult;
use crate::registry::{Registry, Runnable, Timeout};

const TOGGLE: &[u8] = b"toggle\n";
const READ: &[u8] = b"read\n";

/// A fully matched command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Toggle,
    Read,
}

impl Command {
    fn pattern(self) -> &'static [u8] {
        match self {
            Command::Toggle => TOGGLE,
            Command::Read => READ,
        }
    }
}

/// Matcher state between bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    None,
    Matching(Command),
}

/// Byte-at-a-time command matcher
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    state: MatchState,
    /// Bytes of the active pattern seen so far
    matched: usize,
}

impl CommandRecognizer {
    pub const fn new() -> Self {
        CommandRecognizer {
            state: MatchState::None,
            matched: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> MatchState {
        self.state
    }

    #[inline]
    pub fn matched(&self) -> usize {
        self.matched
    }

    fn reset(&mut self) {
        self.state = MatchState::None;
        self.matched = 0;
    }

    /// Consume one byte; returns the command it completes, if any
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        let command = match self.state {
            MatchState::None => {
                let start = [Command::Toggle, Command::Read]
                    .into_iter()
                    .find(|cmd| cmd.pattern()[0] == byte);
                if let Some(cmd) = start {
                    self.state = MatchState::Matching(cmd);
                    self.matched = 1;
                }
                return None;
            }
            MatchState::Matching(cmd) => cmd,
        };

        let pattern = command.pattern();
        if pattern[self.matched] != byte {
            self.reset();
            return None;
        }

        self.matched += 1;
        if self.matched == pattern.len() {
            self.reset();
            return Some(command);
        }
        None
    }
}

impl Default for CommandRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread consuming the receive queue
pub struct CommandTask<R: Registry + 'static> {
    shared: &'static Shared<R>,
}

impl<R: Registry> CommandTask<R> {
    pub const fn new(shared: &'static Shared<R>) -> Self {
        CommandTask { shared }
    }

    /// Take one byte off the receive queue and act on a completed command
    pub fn serve_once(
        &self,
        recognizer: &mut CommandRecognizer,
        timeout: Timeout,
    ) -> OsResult<Option<Command>> {
        let shared = self.shared;
        let mut byte = [0u8; 1];
        shared.registry.queue_receive(shared.resources.rx, &mut byte, timeout)?;

        let command = recognizer.feed(byte[0]);
        match command {
            Some(Command::Toggle) => {
                let _format = shared.format.toggle();
                crate::info!("output format now {}", _format);
            }
            Some(Command::Read) => {
                // A pending request already covers this one
                if shared
                    .registry
                    .queue_send(shared.resources.request, &[1], Timeout::Poll)
                    .is_err()
                {
                    crate::debug!("read coalesced with pending request");
                }
            }
            None => {}
        }
        Ok(command)
    }
}

impl<R: Registry> Runnable for CommandTask<R> {
    fn run(&self) {
        let mut recognizer = CommandRecognizer::new();
        loop {
            if let Err(_err) = self.serve_once(&mut recognizer, Timeout::Forever) {
                crate::error!("command receive failed: {}", _err);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(recognizer: &mut CommandRecognizer, input: &[u8]) -> std::vec::Vec<Command> {
        input.iter().filter_map(|&b| recognizer.feed(b)).collect()
    }

    #[test]
    fn test_recognizes_both_commands() {
        let mut rec = CommandRecognizer::new();
        assert_eq!(feed_all(&mut rec, b"read\n"), [Command::Read]);
        assert_eq!(feed_all(&mut rec, b"toggle\n"), [Command::Toggle]);
        assert_eq!(feed_all(&mut rec, b"read\ntoggle\nread\n").len(), 3);
    }

    #[test]
    fn test_mismatch_restarts_without_rematch() {
        let mut rec = CommandRecognizer::new();
        // The second 'r' breaks the match and is discarded, not reused
        assert!(feed_all(&mut rec, b"rread\n").is_empty());
        assert_eq!(rec.state(), MatchState::None);

        assert!(feed_all(&mut rec, b"togread\n").is_empty());
        assert!(feed_all(&mut rec, b"read").is_empty());
        assert_eq!(rec.state(), MatchState::Matching(Command::Read));
        assert_eq!(rec.matched(), 4);
        assert!(feed_all(&mut rec, b"x\n").is_empty());
        assert_eq!(rec.state(), MatchState::None);
    }

    #[test]
    fn test_needs_terminator() {
        let mut rec = CommandRecognizer::new();
        assert!(feed_all(&mut rec, b"read\r\n").is_empty());
        assert!(feed_all(&mut rec, b"READ\n").is_empty());
        assert_eq!(feed_all(&mut rec, b"xxread\n"), [Command::Read]);
    }
}
