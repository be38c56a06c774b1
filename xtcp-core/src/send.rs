//! Send flow controller.
//!
//! ```text
//! Idle ──init_send──▶ AwaitingRequest ──request_data──▶ RequestIssued
//!   ▲                                                      │  ▲
//!   └────────── send(len = 0) ─────────────────────────────┘  │
//!                                     send(len > 0)           │ sent_data /
//!                                          ▼                  │ resend_data
//!                                   AwaitingOutcome ──────────┘
//! ```

use crate::protocol::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    /// `init_send` accepted, `request_data` not raised yet
    AwaitingRequest,
    /// A send event is queued or delivered; the client owes a `send`
    RequestIssued,
    /// Payload handed to the packet engine, outcome pending
    AwaitingOutcome,
}

/// What a client `send` turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Payload goes to the packet engine
    Transmit,
    /// Zero-length send: handshake over
    Complete,
}

/// Per-connection send state
#[derive(Debug, Default)]
pub struct SendFlow {
    state: SendState,
    partial_ack: bool,
    in_flight: usize,
    outstanding: usize,
    /// Length the next non-empty send must have after a resend request
    resend_len: Option<usize>,
    confirmed: u64,
    resends: u64,
}

impl SendFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn partial_ack(&self) -> bool {
        self.partial_ack
    }

    pub fn enable_partial_ack(&mut self) {
        self.partial_ack = true;
    }

    /// Unconfirmed bytes; reported only when partial ack is enabled
    pub fn outstanding(&self) -> Option<usize> {
        self.partial_ack.then_some(self.outstanding)
    }

    /// Bytes confirmed by the peer over the connection's lifetime
    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    pub fn resends(&self) -> u64 {
        self.resends
    }

    /// Length a resend must carry, if a resend is owed
    pub fn expected_resend(&self) -> Option<usize> {
        self.resend_len
    }

    /// Arm the handshake. Legal from `Idle` only.
    pub fn init(&mut self) -> Result<(), SendState> {
        match self.state {
            SendState::Idle => {
                self.state = SendState::AwaitingRequest;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Raise `request_data` if the handshake is armed
    pub fn issue_request(&mut self) -> Option<EventKind> {
        if self.state == SendState::AwaitingRequest {
            self.state = SendState::RequestIssued;
            Some(EventKind::RequestData)
        } else {
            None
        }
    }

    /// Record the client's answer to a send event
    pub fn submit(&mut self, len: usize) -> Submit {
        if len == 0 {
            self.state = SendState::Idle;
            self.in_flight = 0;
            self.outstanding = 0;
            self.resend_len = None;
            return Submit::Complete;
        }
        self.state = SendState::AwaitingOutcome;
        self.in_flight = len;
        self.outstanding = len;
        self.resend_len = None;
        Submit::Transmit
    }

    /// Peer confirmed the in-flight payload
    pub fn transmitted(&mut self) -> Option<EventKind> {
        if self.state != SendState::AwaitingOutcome {
            return None;
        }
        self.confirmed += self.in_flight as u64;
        self.in_flight = 0;
        self.outstanding = 0;
        self.state = SendState::RequestIssued;
        Some(EventKind::SentData)
    }

    /// Transmission failed after `acked` leading bytes were confirmed. With
    /// partial ack only the unconfirmed suffix must be resent, otherwise the
    /// whole payload. A partial-ack failure that left nothing unconfirmed
    /// counts as a success.
    pub fn failed(&mut self, acked: usize) -> Option<EventKind> {
        if self.state != SendState::AwaitingOutcome {
            return None;
        }
        if self.partial_ack {
            if acked >= self.in_flight {
                return self.transmitted();
            }
            self.confirmed += acked as u64;
            self.in_flight -= acked;
            self.outstanding = self.in_flight;
        }
        self.resend_len = Some(if self.partial_ack {
            self.outstanding
        } else {
            self.in_flight
        });
        self.resends += 1;
        self.state = SendState::RequestIssued;
        Some(EventKind::ResendData)
    }

    pub fn reset(&mut self) {
        self.state = SendState::Idle;
        self.in_flight = 0;
        self.outstanding = 0;
        self.resend_len = None;
    }
}
