// Licensed under the Apache-2.0 license

use std::collections::VecDeque;

use trustelem_drivers::TwoWire;

const REG_STATE: u8 = 0x82;
const REG_SOFT_RESET: u8 = 0x88;

/// Two-wire double modeling the device's bus register window.
///
/// Enough behavior for driver-level tests: a register-select write chooses
/// what the next read returns, the state register yields its 4 status
/// bytes, and the device can start "asleep", nacking a configurable number
/// of transactions before it responds.
pub struct ModelTwi {
    state: [u8; 4],
    wake_after: usize,
    selected_reg: Option<u8>,
    pending: Vec<u8>,
    writes: Vec<Vec<u8>>,
    rx: VecDeque<u8>,
    joined: bool,
    clock: u32,
}

impl ModelTwi {
    /// A responsive device that advertises soft reset.
    pub fn new() -> Self {
        Self::with_state([0x48, 0x00, 0x00, 0x00])
    }

    /// A device whose state register reports no soft-reset support.
    pub fn without_soft_reset() -> Self {
        Self::with_state([0x40, 0x00, 0x00, 0x00])
    }

    /// A device that nacks the first `transactions` bus transactions
    /// before waking up.
    pub fn asleep_for(transactions: usize) -> Self {
        let mut twi = Self::new();
        twi.wake_after = transactions;
        twi
    }

    fn with_state(state: [u8; 4]) -> Self {
        Self {
            state,
            wake_after: 0,
            selected_reg: None,
            pending: Vec::new(),
            writes: Vec::new(),
            rx: VecDeque::new(),
            joined: false,
            clock: 0,
        }
    }

    /// Every acked write, in bus order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// How many soft-reset sequences the device acked.
    pub fn soft_reset_count(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| w.first() == Some(&REG_SOFT_RESET))
            .count()
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn clock(&self) -> u32 {
        self.clock
    }
}

impl Default for ModelTwi {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoWire for ModelTwi {
    fn begin(&mut self) {
        self.joined = true;
    }

    fn end(&mut self) {
        self.joined = false;
    }

    fn begin_transmission(&mut self, _addr: u8) {
        self.pending.clear();
    }

    fn end_transmission(&mut self, _stop: bool) -> u8 {
        if self.wake_after > 0 {
            self.wake_after -= 1;
            return 2;
        }
        let write = core::mem::take(&mut self.pending);
        if let Some(&reg) = write.first() {
            self.selected_reg = Some(reg);
        }
        self.writes.push(write);
        0
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.pending.extend_from_slice(buf);
        buf.len()
    }

    fn request_from(&mut self, _addr: u8, len: usize, _stop: bool) -> usize {
        if self.wake_after > 0 {
            self.wake_after -= 1;
            return 0;
        }
        let bytes: Vec<u8> = match self.selected_reg {
            Some(REG_STATE) => self.state.to_vec(),
            _ => vec![0x00; len],
        };
        self.rx = bytes.into_iter().collect();
        self.rx.len()
    }

    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn set_clock(&mut self, hz: u32) {
        self.clock = hz;
    }
}
