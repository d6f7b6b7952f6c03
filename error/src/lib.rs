/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type and error constants shared by the trust
    element API and driver crates.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Trust element error type.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TrustElemError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: TrustElemError = TrustElemError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(& 'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl TrustElemError {
    /// Create a trust element error; intended to only be used from const
    /// contexts, as we don't want runtime panics if val is zero. The preferred
    /// way to get a TrustElemError from a u32 is to use
    /// `TrustElemError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("TrustElemError cannot be 0"),
        }
    }

    // Use the macro to define all error constants
    define_error_constants![
        (
            DRIVER_TWI_TX_RETRIES_EXHAUSTED,
            0x00010001,
            "Two-wire transmit retries exhausted without an ack"
        ),
        (
            DRIVER_TWI_RX_RETRIES_EXHAUSTED,
            0x00010002,
            "Two-wire receive retries exhausted without a grant"
        ),
        (
            DRIVER_TWI_RX_SHORT_READ,
            0x00010003,
            "Two-wire receive drained a different byte count than requested"
        ),
        (
            DRIVER_TWI_SOFT_RESET_UNSUPPORTED,
            0x00010004,
            "Device state register does not advertise soft reset"
        ),
        (
            API_EXCHANGE_PENDING,
            0x00020001,
            "An exchange is already in flight on this session"
        ),
        (
            API_EXCHANGE_NOT_COMPLETE,
            0x00020002,
            "Exchange consumed before the transport completed it"
        ),
        (
            API_TRANSPORT_ERROR,
            0x00020003,
            "Transport stack reported an exchange error"
        ),
        (
            API_RESP_OVERRUN,
            0x00020004,
            "Response frame exceeds the exchange buffer"
        ),
        (API_RESP_TOO_SHORT, 0x00030001, "Response frame shorter than a header"),
        (
            API_RESP_DEVICE_STATUS,
            0x00030002,
            "Device reported a non-zero command status"
        ),
        (
            API_RESP_LEN_MISMATCH,
            0x00030003,
            "Declared response length disagrees with the received frame"
        ),
        (
            API_CERT_ENCODING,
            0x00030004,
            "Certificate payload does not start with an extended-length sequence"
        ),
        (
            API_RESP_BUFFER_TOO_SMALL,
            0x00030005,
            "Caller buffer too small for the response payload"
        ),
        (
            API_RANDOM_LEN_RANGE,
            0x00040001,
            "Random length outside the supported 8..=256 range"
        ),
        (API_CHALLENGE_LEN, 0x00040002, "Challenge must be exactly 16 bytes"),
        (API_RESP_EMPTY, 0x00040003, "Data object read returned no payload"),
        (
            API_REQUEST_TOO_LARGE,
            0x00040004,
            "Request payload exceeds the frame scratch buffer"
        ),
    ];
}

impl From<core::num::NonZeroU32> for TrustElemError {
    fn from(val: core::num::NonZeroU32) -> Self {
        TrustElemError(val)
    }
}

impl From<TrustElemError> for core::num::NonZeroU32 {
    fn from(val: TrustElemError) -> Self {
        val.0
    }
}

impl From<TrustElemError> for u32 {
    fn from(val: TrustElemError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for TrustElemError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(TrustElemError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type TrustElemResult<T> = Result<T, TrustElemError>;
