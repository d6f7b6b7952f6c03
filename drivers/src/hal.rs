/*++

Licensed under the Apache-2.0 license.

File Name:

    hal.rs

Abstract:

    File contains the polling bus driver the transport stack's physical
    layer runs on: bounded-retry transmit/receive exchanges and the
    initialization-time soft-reset probe.

--*/

use crate::twi::TwoWire;
use bitflags::bitflags;
use trustelem_error::{TrustElemError, TrustElemResult};

/// Fixed bus address of the trust element.
pub const TWI_BASE_ADDR: u8 = 0x30;

/// Fast-mode clock the device is specified for.
pub const TWI_CLOCK_HZ: u32 = 400_000;

// The device may sit in its power-saving sleep mode or stretch the clock
// for a few transactions before it responds.
const MAX_POLLING: usize = 50;

// Register-select command for the 4-byte device state register.
const REG_STATE: u8 = 0x82;

// Soft reset register followed by its 16-bit reset value.
const SOFT_RESET_SEQ: [u8; 3] = [0x88, 0x00, 0x00];

bitflags! {
    /// First byte of the device state register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TwiStatus: u8 {
        const BUSY = 0x80;
        const RESPONSE_READY = 0x40;
        const SOFT_RESET = 0x08;
    }
}

/// Outcome of one exchange, reported to the layer above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalEvent {
    TxSuccess,
    RxSuccess,
    Error,
}

/// Polling driver for one trust element on a two-wire bus.
pub struct TwiHal<W: TwoWire> {
    bus: W,
}

impl<W: TwoWire> TwiHal<W> {
    pub fn new(bus: W) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &W {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut W {
        &mut self.bus
    }

    /// Brings the bus up and probes the device with a soft reset. Runs
    /// before the layer above registers for events; any deviation in the
    /// probe aborts initialization.
    pub fn init(&mut self, reinit: bool) -> TrustElemResult<()> {
        if reinit {
            self.bus.end();
        }
        self.bus.begin();
        self.bus.set_clock(TWI_CLOCK_HZ);
        self.soft_reset()
    }

    /// Releases the bus.
    pub fn shutdown(&mut self) {
        self.bus.end();
    }

    /// One write exchange; the outcome goes to `handler`.
    pub fn transmit(&mut self, data: &[u8], mut handler: impl FnMut(HalEvent)) {
        match self.transmit_raw(data) {
            Ok(()) => handler(HalEvent::TxSuccess),
            Err(_) => handler(HalEvent::Error),
        }
    }

    /// One read exchange of exactly `buf.len()` bytes; the outcome goes to
    /// `handler`.
    pub fn receive(&mut self, buf: &mut [u8], mut handler: impl FnMut(HalEvent)) {
        match self.receive_raw(buf) {
            Ok(()) => handler(HalEvent::RxSuccess),
            Err(_) => handler(HalEvent::Error),
        }
    }

    /// Write exchange without event reporting; used by the probe before a
    /// handler exists.
    ///
    /// Repeats {address, write payload, end with stop} until the peripheral
    /// acks or the attempt bound is exhausted.
    pub fn transmit_raw(&mut self, data: &[u8]) -> TrustElemResult<()> {
        for _ in 0..MAX_POLLING {
            self.bus.begin_transmission(TWI_BASE_ADDR);
            self.bus.write(data);
            if self.bus.end_transmission(true) == 0 {
                return Ok(());
            }
        }
        Err(TrustElemError::DRIVER_TWI_TX_RETRIES_EXHAUSTED)
    }

    /// Read exchange without event reporting; used by the probe before a
    /// handler exists.
    ///
    /// Repeats {address, request with stop} until the peripheral grants
    /// bytes or the attempt bound is exhausted, then drains everything
    /// granted. Bytes beyond `buf` are read and dropped, never written past
    /// the buffer; success requires draining exactly `buf.len()` bytes.
    pub fn receive_raw(&mut self, buf: &mut [u8]) -> TrustElemResult<()> {
        let mut granted = 0;
        for _ in 0..MAX_POLLING {
            self.bus.begin_transmission(TWI_BASE_ADDR);
            granted = self.bus.request_from(TWI_BASE_ADDR, buf.len(), true);
            if granted != 0 {
                break;
            }
        }
        if granted == 0 {
            return Err(TrustElemError::DRIVER_TWI_RX_RETRIES_EXHAUSTED);
        }

        let mut drained = 0;
        while self.bus.available() > 0 {
            let Some(byte) = self.bus.read() else {
                break;
            };
            if let Some(slot) = buf.get_mut(drained) {
                *slot = byte;
            }
            drained += 1;
        }
        if drained == buf.len() {
            Ok(())
        } else {
            Err(TrustElemError::DRIVER_TWI_RX_SHORT_READ)
        }
    }

    /// Soft-reset probe: select the state register, read it, require the
    /// soft-reset-capable bit, then send the reset sequence.
    pub fn soft_reset(&mut self) -> TrustElemResult<()> {
        let mut state = [0u8; 4];
        self.transmit_raw(&[REG_STATE])?;
        self.receive_raw(&mut state)?;
        if !TwiStatus::from_bits_truncate(state[0]).contains(TwiStatus::SOFT_RESET) {
            return Err(TrustElemError::DRIVER_TWI_SOFT_RESET_UNSUPPORTED);
        }
        self.transmit_raw(&SOFT_RESET_SEQ)
    }
}
