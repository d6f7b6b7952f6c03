// Licensed under the Apache-2.0 license

//! Blocking dispatch bridge.
//!
//! The transport stack beneath this crate is callback driven: one
//! `transceive` hands a request frame down, and the stack signals the
//! outcome through a single completion call, possibly from within a later
//! timer tick. This module turns that into one blocking call per exchange.
//! The wait is a cooperative pump loop, not preemptive concurrency: while an
//! exchange is pending the dispatcher repeatedly hands control to
//! [`TransportLayer::poll`] so the layers beneath can run their protocol
//! timers with a flat call stack.

use crate::apdu::MAX_FRAME_LEN;
use trustelem_error::{TrustElemError, TrustElemResult};

/// Completion event reported by the transport stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlEvent {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Pending,
    Complete(TlEvent),
}

/// One-shot completion slot for a single in-flight exchange.
///
/// Owned by the session; exclusive access through `&mut` is what enforces
/// the one-exchange-at-a-time rule. Lifecycle: idle, pending once dispatch
/// begins, complete when the stack calls [`Exchange::complete`], then
/// consumed by the dispatcher and idle again.
pub struct Exchange {
    state: SlotState,
    overrun: bool,
    frame_len: usize,
    frame: [u8; MAX_FRAME_LEN],
}

impl Exchange {
    pub const fn new() -> Self {
        Self {
            state: SlotState::Idle,
            overrun: false,
            frame_len: 0,
            frame: [0; MAX_FRAME_LEN],
        }
    }

    fn begin(&mut self) -> TrustElemResult<()> {
        if self.state == SlotState::Pending {
            return Err(TrustElemError::API_EXCHANGE_PENDING);
        }
        self.state = SlotState::Pending;
        self.overrun = false;
        self.frame_len = 0;
        Ok(())
    }

    /// Completion callback for the transport stack; exactly one call per
    /// dispatched exchange. The frame is copied out of the stack's buffer
    /// before the wait loop resumes. A frame larger than the slot completes
    /// the exchange as an error instead of overflowing.
    pub fn complete(&mut self, event: TlEvent, frame: &[u8]) {
        match self.frame.get_mut(..frame.len()) {
            Some(dst) => {
                dst.copy_from_slice(frame);
                self.frame_len = frame.len();
                self.state = SlotState::Complete(event);
            }
            None => {
                self.overrun = true;
                self.state = SlotState::Complete(TlEvent::Error);
            }
        }
    }

    /// True while the transport stack still owes a completion.
    pub fn is_pending(&self) -> bool {
        self.state == SlotState::Pending
    }

    fn abandon(&mut self) {
        self.state = SlotState::Idle;
    }

    fn finish(&mut self) -> TrustElemResult<&[u8]> {
        let state = core::mem::replace(&mut self.state, SlotState::Idle);
        match state {
            SlotState::Complete(TlEvent::Success) => Ok(&self.frame[..self.frame_len]),
            SlotState::Complete(TlEvent::Error) => Err(if self.overrun {
                TrustElemError::API_RESP_OVERRUN
            } else {
                TrustElemError::API_TRANSPORT_ERROR
            }),
            _ => Err(TrustElemError::API_EXCHANGE_NOT_COMPLETE),
        }
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract of the layered transport stack beneath the session.
pub trait TransportLayer {
    /// Brings up the stack and the bus session beneath it.
    fn init(&mut self) -> TrustElemResult<()>;

    /// Hands one request frame to the stack. The stack reports the outcome
    /// through [`Exchange::complete`], exactly once per accepted request —
    /// either before returning or from within a later [`TransportLayer::poll`]
    /// call. An `Err` return means the request was never accepted and no
    /// completion will arrive.
    fn transceive(&mut self, apdu: &[u8], xchg: &mut Exchange) -> TrustElemResult<()>;

    /// Cooperative timer tick. Invoked by the dispatcher whenever its tick
    /// timer elapses while an exchange is pending; the layers beneath drive
    /// their own protocol timers from here.
    fn poll(&mut self, xchg: &mut Exchange);

    /// Ends the bus session.
    fn close(&mut self);
}

/// Runs one request/response exchange to completion and returns the raw
/// response frame.
///
/// There is no internal timeout: an unresponsive device keeps the loop
/// spinning, and a dispatched exchange cannot be cancelled. The documented
/// way out of a stuck or failed exchange is a session reset.
pub fn dispatch<'a, T: TransportLayer>(
    transport: &mut T,
    xchg: &'a mut Exchange,
    apdu: &[u8],
) -> TrustElemResult<&'a [u8]> {
    xchg.begin()?;
    if let Err(err) = transport.transceive(apdu, xchg) {
        xchg.abandon();
        return Err(err);
    }
    while xchg.is_pending() {
        transport.poll(xchg);
    }
    xchg.finish()
}
