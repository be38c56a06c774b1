//! Receive flow controller.
//!
//! Inbound payload is held here until the connection is idle, then exactly
//! one chunk is announced with a `RecvData`/`PushData` event. The chunk
//! stays announced until the client consumes or ignores it. In ack-receive
//! mode every handled chunk closes the window until [`RecvFlow::ack`].

use crate::protocol::EventKind;
use bytes::Bytes;
use std::collections::VecDeque;

/// How the client takes the announced chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvMode {
    /// Take the whole chunk
    All,
    /// Take at most `n` bytes; the rest of the chunk is discarded
    Count(usize),
    /// Drop the chunk without reading it
    Ignore,
}

/// Result of handling a receive event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Bytes pulled from the stack for this event
    pub pulled: usize,
    /// Bytes handed to the client (a prefix of what was pulled)
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecvState {
    #[default]
    Idle,
    /// A chunk has been announced and awaits a receive operation
    DataPending,
}

#[derive(Debug)]
struct Chunk {
    payload: Bytes,
    push: bool,
}

/// Per-connection receive state
#[derive(Debug, Default)]
pub struct RecvFlow {
    state: RecvState,
    inbound: VecDeque<Chunk>,
    announced: Option<Chunk>,
    ack_mode: bool,
    window_closed: bool,
}

impl RecvFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_mode(&self) -> bool {
        self.ack_mode
    }

    pub fn window_open(&self) -> bool {
        !self.window_closed
    }

    /// Bytes buffered but not yet announced
    pub fn buffered(&self) -> usize {
        self.inbound.iter().map(|c| c.payload.len()).sum()
    }

    /// Queue inbound payload, split into chunks of at most `max_chunk` bytes.
    /// The push flag is kept on the final chunk only.
    pub fn push_inbound(&mut self, payload: Bytes, push: bool, max_chunk: usize) {
        if payload.is_empty() {
            if push {
                self.inbound.push_back(Chunk { payload, push });
            }
            return;
        }

        let total = payload.len();
        let mut offset = 0;
        while offset < total {
            let end = std::cmp::min(offset + max_chunk, total);
            self.inbound.push_back(Chunk {
                payload: payload.slice(offset..end),
                push: push && end == total,
            });
            offset = end;
        }
    }

    /// Event to raise now, if delivery is allowed
    pub fn ready_event(&self, paused: bool) -> Option<EventKind> {
        if self.state != RecvState::Idle || self.window_closed || paused {
            return None;
        }
        self.inbound.front().map(|chunk| {
            if chunk.push {
                EventKind::PushData
            } else {
                EventKind::RecvData
            }
        })
    }

    /// Move the next chunk into the announced slot
    pub fn announce(&mut self) {
        if let Some(chunk) = self.inbound.pop_front() {
            self.announced = Some(chunk);
            self.state = RecvState::DataPending;
        }
    }

    /// Complete the receive cycle. Returns to idle and, in ack-receive
    /// mode, closes the window.
    pub fn consume(&mut self, mode: RecvMode) -> Received {
        let payload = self
            .announced
            .take()
            .map(|chunk| chunk.payload)
            .unwrap_or_default();
        self.state = RecvState::Idle;
        if self.ack_mode {
            self.window_closed = true;
        }

        let pulled = payload.len();
        let data = match mode {
            RecvMode::All => payload,
            RecvMode::Count(n) => payload.slice(..std::cmp::min(n, pulled)),
            RecvMode::Ignore => Bytes::new(),
        };
        Received { pulled, data }
    }

    pub fn enable_ack_mode(&mut self) {
        self.ack_mode = true;
    }

    /// Reopen a window closed by ack-receive mode. Returns `true` if the
    /// window was closed.
    pub fn ack(&mut self) -> bool {
        std::mem::replace(&mut self.window_closed, false)
    }

    /// Drop everything buffered or announced
    pub fn discard(&mut self) {
        self.inbound.clear();
        self.announced = None;
        self.state = RecvState::Idle;
    }
}
