// Licensed under the Apache-2.0 license

use trustelem_error::{TrustElemError, TrustElemResult};
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16};

/// Size of the command/response frame header.
pub const CMD_HEADER_LEN: usize = 4;

/// Upper bound on one frame, matching the receive buffer of the layered
/// transport stack beneath this crate.
pub const MAX_FRAME_LEN: usize = 1540;

/// Forced into every command byte; tells the device to discard the error
/// status of the previous command before executing this one.
pub const FLAG_FLUSH_LAST_ERROR: u8 = 0x80;

/// The only status byte the device uses to report success.
pub const STATUS_SUCCESS: u8 = 0x00;

/// Application identifier carried by `Command::OPEN_APPLICATION`.
pub const APPLICATION_ID: [u8; 16] = [
    0xD2, 0x76, 0x00, 0x00, 0x04, 0x47, 0x65, 0x6E, 0x41, 0x75, 0x74, 0x68, 0x41, 0x70, 0x70,
    0x6C,
];

/// Command byte of a request APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command(pub u8);

impl Command {
    pub const GET_DATA_OBJECT: Self = Self(0x01);
    pub const SET_DATA_OBJECT: Self = Self(0x02);
    pub const GET_RANDOM: Self = Self(0x0C);
    pub const SET_AUTH_SCHEME: Self = Self(0x10);
    pub const GET_AUTH_MSG: Self = Self(0x18);
    pub const SET_AUTH_MSG: Self = Self(0x19);
    pub const OPEN_APPLICATION: Self = Self(0x70);
}

/// Parameter byte for data object reads.
pub const PARAM_READ_DATA: u8 = 0x00;
/// Parameter byte for data object writes.
pub const PARAM_WRITE_DATA: u8 = 0x00;
/// Parameter byte selecting the challenge slot of the auth message pair.
pub const PARAM_CHALLENGE: u8 = 0x01;
/// Parameter byte selecting the signature slot of the auth message pair.
pub const PARAM_SIGNATURE: u8 = 0x02;

/// ECDSA over SECP256R1 with SHA-256. The only signing scheme the device
/// pairs with its private key object.
pub const AUTH_SCHEME_ECDSA_P256_SHA256: u8 = 0x91;

/// Challenges submitted for signing must be exactly this long.
pub const AUTH_CHALLENGE_LEN: usize = 16;

/// 4-byte request frame header. `len` counts payload bytes only.
#[repr(C)]
#[derive(Debug, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct CmdHeader {
    pub cmd: u8,
    pub param: u8,
    pub len: U16<BigEndian>,
}

impl CmdHeader {
    /// Builds a request header. The flush-last-error flag is forced on
    /// regardless of the command byte supplied.
    pub fn new(cmd: Command, param: u8, payload_len: u16) -> Self {
        Self {
            cmd: cmd.0 | FLAG_FLUSH_LAST_ERROR,
            param,
            len: payload_len.into(),
        }
    }
}

/// 4-byte response frame header.
#[repr(C)]
#[derive(Debug, IntoBytes, FromBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct RespHeader {
    pub status: u8,
    pub reserved: u8,
    pub len: U16<BigEndian>,
}

/// Checks a raw response frame and returns its payload.
///
/// A frame is valid when it carries at least a full header, the status byte
/// is zero and the declared payload length accounts for every received byte.
pub fn validate_response(frame: &[u8]) -> TrustElemResult<&[u8]> {
    let (hdr, payload) =
        RespHeader::ref_from_prefix(frame).map_err(|_| TrustElemError::API_RESP_TOO_SHORT)?;
    if hdr.status != STATUS_SUCCESS {
        return Err(TrustElemError::API_RESP_DEVICE_STATUS);
    }
    if usize::from(hdr.len.get()) != payload.len() {
        return Err(TrustElemError::API_RESP_LEN_MISMATCH);
    }
    Ok(payload)
}

const ASN1_SEQUENCE: u8 = 0x30;
const ASN1_LEN_U16: u8 = 0x82;

/// Resolves the true certificate length from the leading ASN.1 markers,
/// stripping the zero padding the device appends to the object.
///
/// The payload must start with a SEQUENCE tag and a two-byte extended
/// length; the resolved length is that inner length plus the four marker
/// bytes, and must not exceed the received payload.
pub fn resolve_certificate_len(payload: &[u8]) -> TrustElemResult<usize> {
    match payload {
        [ASN1_SEQUENCE, ASN1_LEN_U16, hi, lo, ..] => {
            // Inner length plus the tag and length markers themselves.
            let resolved = usize::from(u16::from_be_bytes([*hi, *lo])) + 4;
            if resolved > payload.len() {
                return Err(TrustElemError::API_RESP_LEN_MISMATCH);
            }
            Ok(resolved)
        }
        _ => Err(TrustElemError::API_CERT_ENCODING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_forces_flush_flag() {
        let hdr = CmdHeader::new(Command::GET_RANDOM, 0x00, 2);
        assert_eq!(hdr.as_bytes(), &[0x8C, 0x00, 0x00, 0x02]);

        // Even a command byte that already has the bit set stays unchanged.
        let hdr = CmdHeader::new(Command(0x8C), 0x00, 2);
        assert_eq!(hdr.as_bytes(), &[0x8C, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_header_len_big_endian() {
        let hdr = CmdHeader::new(Command::SET_DATA_OBJECT, 0x00, 0x0204);
        assert_eq!(hdr.as_bytes(), &[0x82, 0x00, 0x02, 0x04]);
    }

    #[test]
    fn test_validate_response_ok() {
        let frame = [0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB, 0xCC];
        assert_eq!(validate_response(&frame), Ok(&[0xAA, 0xBB, 0xCC][..]));
    }

    #[test]
    fn test_validate_response_empty_payload() {
        let frame = [0x00, 0x00, 0x00, 0x00];
        assert_eq!(validate_response(&frame), Ok(&[][..]));
    }

    #[test]
    fn test_validate_response_too_short() {
        for len in 0..CMD_HEADER_LEN {
            let frame = [0u8; CMD_HEADER_LEN];
            assert_eq!(
                validate_response(&frame[..len]),
                Err(TrustElemError::API_RESP_TOO_SHORT)
            );
        }
    }

    #[test]
    fn test_validate_response_bad_status() {
        let frame = [0x01, 0x00, 0x00, 0x01, 0xAA];
        assert_eq!(
            validate_response(&frame),
            Err(TrustElemError::API_RESP_DEVICE_STATUS)
        );
    }

    #[test]
    fn test_validate_response_len_mismatch() {
        // Declares 2 payload bytes but carries 3.
        let frame = [0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB, 0xCC];
        assert_eq!(
            validate_response(&frame),
            Err(TrustElemError::API_RESP_LEN_MISMATCH)
        );

        // Declares 3 payload bytes but carries 2.
        let frame = [0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB];
        assert_eq!(
            validate_response(&frame),
            Err(TrustElemError::API_RESP_LEN_MISMATCH)
        );
    }

    #[test]
    fn test_resolve_certificate_len() {
        let mut payload = vec![0x30, 0x82, 0x01, 0x2C];
        payload.resize(400, 0);
        assert_eq!(resolve_certificate_len(&payload), Ok(300));
    }

    #[test]
    fn test_resolve_certificate_len_bad_markers() {
        let payload = [0x31, 0x82, 0x01, 0x2C, 0x00];
        assert_eq!(
            resolve_certificate_len(&payload),
            Err(TrustElemError::API_CERT_ENCODING)
        );

        let payload = [0x30, 0x81, 0x2C, 0x00];
        assert_eq!(
            resolve_certificate_len(&payload),
            Err(TrustElemError::API_CERT_ENCODING)
        );

        assert_eq!(
            resolve_certificate_len(&[0x30, 0x82]),
            Err(TrustElemError::API_CERT_ENCODING)
        );
    }

    #[test]
    fn test_resolve_certificate_len_truncated_payload() {
        // Declares 300 resolved bytes but only 10 arrived.
        let payload = [0x30, 0x82, 0x01, 0x2C, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            resolve_certificate_len(&payload),
            Err(TrustElemError::API_RESP_LEN_MISMATCH)
        );
    }
}
