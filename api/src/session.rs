// Licensed under the Apache-2.0 license

use crate::apdu::{
    resolve_certificate_len, validate_response, CmdHeader, Command, APPLICATION_ID,
    AUTH_CHALLENGE_LEN, AUTH_SCHEME_ECDSA_P256_SHA256, CMD_HEADER_LEN, MAX_FRAME_LEN,
    PARAM_CHALLENGE, PARAM_READ_DATA, PARAM_SIGNATURE, PARAM_WRITE_DATA,
};
use crate::dispatch::{dispatch, Exchange, TransportLayer};
use crate::oid::ObjectId;
use trustelem_error::{TrustElemError, TrustElemResult};
use zerocopy::IntoBytes;

/// Smallest random number the device will generate.
pub const RANDOM_MIN_LEN: usize = 8;
/// Largest random number the device will generate.
pub const RANDOM_MAX_LEN: usize = 256;

// Write offset for data object writes. Always zero: objects are written
// from their start.
const WRITE_OFFSET: [u8; 2] = [0x00, 0x00];

/// An open command session with the trust element.
///
/// The session owns the transport stack and the single exchange slot, so at
/// most one exchange can ever be in flight. All operations are blocking and
/// sequential; any failure leaves the device state unknown and the
/// documented recovery is [`Session::reset`].
pub struct Session<T: TransportLayer> {
    transport: T,
    xchg: Exchange,
    tx: [u8; MAX_FRAME_LEN],
}

impl<T: TransportLayer> Session<T> {
    /// Initializes the transport stack and opens the device application.
    ///
    /// Every other operation requires the session this returns. Reopening
    /// after [`Session::close`] is `Session::open` on the returned
    /// transport.
    pub fn open(mut transport: T) -> TrustElemResult<Self> {
        transport.init()?;
        let mut session = Self {
            transport,
            xchg: Exchange::new(),
            tx: [0; MAX_FRAME_LEN],
        };
        session.open_application()?;
        Ok(session)
    }

    /// Tears the session down and reopens it. This is the recovery path
    /// after any reported failure, including a stuck exchange.
    pub fn reset(&mut self) -> TrustElemResult<()> {
        self.transport.close();
        self.xchg = Exchange::new();
        self.transport.init()?;
        self.open_application()
    }

    /// Ends the bus session and hands the transport back.
    pub fn close(mut self) -> T {
        self.transport.close();
        self.transport
    }

    /// The transport stack this session runs on.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Retrieves `len` bytes of device-generated randomness into `out`.
    ///
    /// `len` outside 8..=256 or an `out` shorter than `len` fails before
    /// any bus traffic.
    pub fn get_random(&mut self, len: usize, out: &mut [u8]) -> TrustElemResult<()> {
        if !(RANDOM_MIN_LEN..=RANDOM_MAX_LEN).contains(&len) {
            return Err(TrustElemError::API_RANDOM_LEN_RANGE);
        }
        if out.len() < len {
            return Err(TrustElemError::API_RESP_BUFFER_TOO_SMALL);
        }
        let req = (len as u16).to_be_bytes();
        let payload = self.execute(Command::GET_RANDOM, 0x00, &req, &[])?;
        let src = payload
            .get(..len)
            .ok_or(TrustElemError::API_RESP_LEN_MISMATCH)?;
        out[..len].copy_from_slice(src);
        Ok(())
    }

    /// Reads the device certificate into `out` and returns its true length,
    /// resolved from the leading ASN.1 markers so the zero padding of the
    /// stored object is stripped.
    pub fn get_certificate(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        let payload = self.execute(
            Command::GET_DATA_OBJECT,
            PARAM_READ_DATA,
            &ObjectId::CERTIFICATE.to_bytes(),
            &[],
        )?;
        let len = resolve_certificate_len(payload)?;
        let dst = out
            .get_mut(..len)
            .ok_or(TrustElemError::API_RESP_BUFFER_TOO_SMALL)?;
        dst.copy_from_slice(&payload[..len]);
        Ok(len)
    }

    /// Binds ECDSA-P256/SHA-256 signing to the device private key. Must be
    /// called once before [`Session::get_signature`].
    pub fn set_auth_scheme(&mut self) -> TrustElemResult<()> {
        self.execute(
            Command::SET_AUTH_SCHEME,
            AUTH_SCHEME_ECDSA_P256_SHA256,
            &ObjectId::PRIVATE_KEY.to_bytes(),
            &[],
        )?;
        Ok(())
    }

    /// Signs a 16-byte challenge inside the device and returns the
    /// signature length.
    ///
    /// Two ordered exchanges: submit the challenge, then retrieve the
    /// signature. A challenge of any other length fails before any bus
    /// traffic.
    pub fn get_signature(&mut self, challenge: &[u8], out: &mut [u8]) -> TrustElemResult<usize> {
        if challenge.len() != AUTH_CHALLENGE_LEN {
            return Err(TrustElemError::API_CHALLENGE_LEN);
        }
        self.execute(Command::SET_AUTH_MSG, PARAM_CHALLENGE, challenge, &[])?;
        let payload = self.execute(Command::GET_AUTH_MSG, PARAM_SIGNATURE, &[], &[])?;
        let dst = out
            .get_mut(..payload.len())
            .ok_or(TrustElemError::API_RESP_BUFFER_TOO_SMALL)?;
        dst.copy_from_slice(payload);
        Ok(payload.len())
    }

    /// Reads one data object verbatim into `out` and returns its length.
    /// A response with no payload is an error.
    pub fn get_data_object(&mut self, oid: ObjectId, out: &mut [u8]) -> TrustElemResult<usize> {
        let payload = self.execute(
            Command::GET_DATA_OBJECT,
            PARAM_READ_DATA,
            &oid.to_bytes(),
            &[],
        )?;
        if payload.is_empty() {
            return Err(TrustElemError::API_RESP_EMPTY);
        }
        let dst = out
            .get_mut(..payload.len())
            .ok_or(TrustElemError::API_RESP_BUFFER_TOO_SMALL)?;
        dst.copy_from_slice(payload);
        Ok(payload.len())
    }

    /// Writes one data object starting at offset zero.
    ///
    /// Field legality (value ranges, monotonic lifecycle transitions) is
    /// the device's contract; the bytes are transmitted as supplied and an
    /// illegal value comes back as a device status error.
    pub fn set_data_object(&mut self, oid: ObjectId, data: &[u8]) -> TrustElemResult<()> {
        let [tag, id] = oid.to_bytes();
        let head = [tag, id, WRITE_OFFSET[0], WRITE_OFFSET[1]];
        self.execute(Command::SET_DATA_OBJECT, PARAM_WRITE_DATA, &head, data)?;
        Ok(())
    }

    /// Global lifecycle status. Default 0x07 (operational).
    pub fn get_lifecycle_status(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::LIFECYCLE_STATUS, out)
    }

    /// Advances the global lifecycle status. One-way on the device side.
    pub fn set_lifecycle_status(&mut self, status: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::LIFECYCLE_STATUS, &[status])
    }

    /// Global security status. Default 0x00.
    pub fn get_security_status(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::SECURITY_STATUS, out)
    }

    pub fn set_security_status(&mut self, status: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::SECURITY_STATUS, &[status])
    }

    /// Coprocessor UID: 25-byte hardware identifier plus the 2-byte build
    /// number.
    pub fn get_coprocessor_uid(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::COPROCESSOR_UID, out)
    }

    /// Sleep mode activation delay in milliseconds. Default 0x14.
    pub fn get_sleep_activation_delay(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::SLEEP_ACTIVATION_DELAY, out)
    }

    /// Sets the sleep mode activation delay. The device accepts 20..=255.
    pub fn set_sleep_activation_delay(&mut self, delay: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::SLEEP_ACTIVATION_DELAY, &[delay])
    }

    /// Current limitation in mA. Default 0x09.
    pub fn get_current_limit(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::CURRENT_LIMIT, out)
    }

    /// Sets the current limitation. The device accepts 9..=15.
    pub fn set_current_limit(&mut self, limit: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::CURRENT_LIMIT, &[limit])
    }

    /// Security event counter.
    pub fn get_security_event_counter(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::SECURITY_EVENT_COUNTER, out)
    }

    /// Application lifecycle status. Default 0x01 (creation).
    pub fn get_app_lifecycle_status(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::APP_LIFECYCLE_STATUS, out)
    }

    pub fn set_app_lifecycle_status(&mut self, status: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::APP_LIFECYCLE_STATUS, &[status])
    }

    pub fn get_app_security_status(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::APP_SECURITY_STATUS, out)
    }

    pub fn set_app_security_status(&mut self, status: u8) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::APP_SECURITY_STATUS, &[status])
    }

    /// Error codes of the most recent failed commands. Reading through the
    /// generic accessor is the only failure detail the device offers.
    pub fn get_last_error_codes(&mut self, out: &mut [u8]) -> TrustElemResult<usize> {
        self.get_data_object(ObjectId::LAST_ERROR_CODES, out)
    }

    /// Replaces the device certificate. The device restricts when the
    /// object is writable, so this does not succeed in every lifecycle
    /// state.
    pub fn set_certificate(&mut self, der: &[u8]) -> TrustElemResult<()> {
        self.set_data_object(ObjectId::CERTIFICATE, der)
    }

    fn open_application(&mut self) -> TrustElemResult<()> {
        self.execute(Command::OPEN_APPLICATION, 0x00, &APPLICATION_ID, &[])?;
        Ok(())
    }

    /// Assembles one request APDU in the scratch buffer, runs the exchange
    /// and returns the validated response payload.
    fn execute(
        &mut self,
        cmd: Command,
        param: u8,
        head: &[u8],
        tail: &[u8],
    ) -> TrustElemResult<&[u8]> {
        let payload_len = head.len() + tail.len();
        let total = CMD_HEADER_LEN + payload_len;
        let tx = self
            .tx
            .get_mut(..total)
            .ok_or(TrustElemError::API_REQUEST_TOO_LARGE)?;
        let hdr = CmdHeader::new(cmd, param, payload_len as u16);
        tx[..CMD_HEADER_LEN].copy_from_slice(hdr.as_bytes());
        tx[CMD_HEADER_LEN..CMD_HEADER_LEN + head.len()].copy_from_slice(head);
        tx[CMD_HEADER_LEN + head.len()..].copy_from_slice(tail);

        let frame = dispatch(&mut self.transport, &mut self.xchg, &self.tx[..total])?;
        validate_response(frame)
    }
}
