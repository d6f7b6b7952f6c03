/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the trust element bus driver library.

--*/

#![cfg_attr(not(test), no_std)]

mod hal;
mod twi;

pub use hal::{HalEvent, TwiHal, TwiStatus, TWI_BASE_ADDR, TWI_CLOCK_HZ};
pub use twi::TwoWire;
