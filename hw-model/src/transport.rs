// Licensed under the Apache-2.0 license

use crate::device::TrustElemModel;
use trustelem_api::{Exchange, TlEvent, TransportLayer};
use trustelem_error::TrustElemResult;

/// Transport-layer double wrapping a [`TrustElemModel`].
///
/// Buffers one response and delivers the completion only after a
/// configurable number of `poll` calls, like a stack whose lower layers
/// finish on a protocol timer. One completion per accepted `transceive`,
/// never more.
pub struct ModelTransport {
    device: TrustElemModel,
    latency_ticks: usize,
    pending: Option<Pending>,
    initialized: bool,
    exchanges: usize,
    polls: usize,
    fail_next: usize,
}

struct Pending {
    ticks_left: usize,
    event: TlEvent,
    frame: Vec<u8>,
}

impl ModelTransport {
    pub fn new() -> Self {
        Self::with_latency(2)
    }

    /// A transport whose completions arrive after `latency_ticks` timer
    /// polls. Zero means completion before `transceive` returns.
    pub fn with_latency(latency_ticks: usize) -> Self {
        Self {
            device: TrustElemModel::new(),
            latency_ticks,
            pending: None,
            initialized: false,
            exchanges: 0,
            polls: 0,
            fail_next: 0,
        }
    }

    /// Completes the next `count` exchanges with a transport error instead
    /// of handing them to the device.
    pub fn fail_next_exchanges(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Exchanges that reached the bus since construction.
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    /// Timer polls observed while exchanges were pending.
    pub fn poll_count(&self) -> usize {
        self.polls
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn device(&self) -> &TrustElemModel {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut TrustElemModel {
        &mut self.device
    }

    fn schedule(&mut self, event: TlEvent, frame: Vec<u8>, xchg: &mut Exchange) {
        if self.latency_ticks == 0 {
            xchg.complete(event, &frame);
        } else {
            self.pending = Some(Pending {
                ticks_left: self.latency_ticks,
                event,
                frame,
            });
        }
    }
}

impl Default for ModelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportLayer for ModelTransport {
    fn init(&mut self) -> TrustElemResult<()> {
        self.initialized = true;
        self.pending = None;
        Ok(())
    }

    fn transceive(&mut self, apdu: &[u8], xchg: &mut Exchange) -> TrustElemResult<()> {
        self.exchanges += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            self.schedule(TlEvent::Error, Vec::new(), xchg);
            return Ok(());
        }
        let frame = self.device.handle_apdu(apdu);
        self.schedule(TlEvent::Success, frame, xchg);
        Ok(())
    }

    fn poll(&mut self, xchg: &mut Exchange) {
        self.polls += 1;
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.ticks_left -= 1;
        if pending.ticks_left == 0 {
            let done = self.pending.take().unwrap();
            xchg.complete(done.event, &done.frame);
        }
    }

    fn close(&mut self) {
        self.initialized = false;
        self.pending = None;
    }
}
