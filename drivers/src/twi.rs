/*++

Licensed under the Apache-2.0 license.

File Name:

    twi.rs

Abstract:

    File contains the pass-through contract for the external two-wire bus
    object the driver runs on.

--*/

/// Two-wire bus primitives.
///
/// Thin pass-through to whatever bus peripheral the platform provides. The
/// driver always addresses the fixed device address and always requests a
/// stop condition; implementations only have to forward the calls.
pub trait TwoWire {
    /// Joins the bus as a controller.
    fn begin(&mut self);

    /// Releases the bus.
    fn end(&mut self);

    /// Starts a write transaction to `addr`.
    fn begin_transmission(&mut self, addr: u8);

    /// Finishes the write transaction, sending a stop condition if asked.
    /// Returns 0 when the peripheral acked every byte, non-zero otherwise.
    fn end_transmission(&mut self, stop: bool) -> u8;

    /// Queues bytes for the current write transaction; returns how many
    /// were accepted.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Requests `len` bytes from `addr`; returns how many the peripheral
    /// granted.
    fn request_from(&mut self, addr: u8, len: usize, stop: bool) -> usize;

    /// Granted bytes not yet drained with [`TwoWire::read`].
    fn available(&self) -> usize;

    /// Next granted byte, if any.
    fn read(&mut self) -> Option<u8>;

    /// Sets the bus clock in hertz.
    fn set_clock(&mut self, hz: u32);
}
