// Licensed under the Apache-2.0 license

use std::collections::HashMap;

use trustelem_api::apdu::{Command, APPLICATION_ID, AUTH_CHALLENGE_LEN};
use trustelem_api::ObjectId;

const STATUS_FAILED: u8 = 0xFF;

// One-byte error identifiers the model parks in the last-error-codes
// object, mirroring how the device records failure detail out of band.
const ERR_UNKNOWN_COMMAND: u8 = 0x01;
const ERR_BAD_REQUEST: u8 = 0x02;
const ERR_APP_NOT_OPEN: u8 = 0x03;
const ERR_ACCESS_DENIED: u8 = 0x04;
const ERR_VALUE_RANGE: u8 = 0x05;
const ERR_SEQUENCE: u8 = 0x06;

/// APDU-level behavior model of the trust element.
///
/// Holds the object store with its catalog defaults and answers request
/// frames with the same framing, gating and ratchet rules the device
/// enforces. Command failures come back as a non-zero status byte and are
/// recorded in the event counter and last-error-codes objects.
pub struct TrustElemModel {
    objects: HashMap<(u8, u8), Vec<u8>>,
    app_open: bool,
    auth_scheme_bound: bool,
    challenge: Option<Vec<u8>>,
    rng_rounds: u8,
    event_count: u8,
}

impl TrustElemModel {
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        let mut seed = |oid: ObjectId, bytes: Vec<u8>| {
            objects.insert((oid.tag, oid.id), bytes);
        };
        seed(ObjectId::LIFECYCLE_STATUS, vec![0x07]);
        seed(ObjectId::SECURITY_STATUS, vec![0x00]);
        seed(ObjectId::COPROCESSOR_UID, Self::default_uid());
        seed(ObjectId::SLEEP_ACTIVATION_DELAY, vec![0x14]);
        seed(ObjectId::CURRENT_LIMIT, vec![0x09]);
        seed(ObjectId::SECURITY_EVENT_COUNTER, vec![0x00]);
        seed(ObjectId::CERTIFICATE, Self::default_certificate());
        seed(ObjectId::APP_LIFECYCLE_STATUS, vec![0x01]);
        seed(ObjectId::APP_SECURITY_STATUS, vec![0x00]);
        seed(ObjectId::LAST_ERROR_CODES, vec![0x00]);
        Self {
            objects,
            app_open: false,
            auth_scheme_bound: false,
            challenge: None,
            rng_rounds: 0,
            event_count: 0,
        }
    }

    /// Handles one request frame and returns the full response frame.
    pub fn handle_apdu(&mut self, req: &[u8]) -> Vec<u8> {
        let Some((hdr, payload)) = split_header(req) else {
            return self.fail(ERR_BAD_REQUEST);
        };
        let declared = usize::from(u16::from_be_bytes([hdr[2], hdr[3]]));
        if declared != payload.len() {
            return self.fail(ERR_BAD_REQUEST);
        }

        // The flush-last-error flag is advisory; the command is the low bits.
        let cmd = Command(hdr[0] & 0x7F);
        let param = hdr[1];
        if cmd != Command::OPEN_APPLICATION && !self.app_open {
            return self.fail(ERR_APP_NOT_OPEN);
        }

        match cmd {
            Command::OPEN_APPLICATION => self.open_application(payload),
            Command::GET_RANDOM => self.get_random(payload),
            Command::GET_DATA_OBJECT => self.read_object(param, payload),
            Command::SET_DATA_OBJECT => self.write_object(param, payload),
            Command::SET_AUTH_SCHEME => self.set_auth_scheme(param, payload),
            Command::SET_AUTH_MSG => self.set_auth_msg(param, payload),
            Command::GET_AUTH_MSG => self.get_auth_msg(param, payload),
            _ => self.fail(ERR_UNKNOWN_COMMAND),
        }
    }

    /// Read-only view of one stored object, for test assertions.
    pub fn object(&self, oid: ObjectId) -> Option<&[u8]> {
        self.objects.get(&(oid.tag, oid.id)).map(|v| v.as_slice())
    }

    pub fn is_app_open(&self) -> bool {
        self.app_open
    }

    fn open_application(&mut self, payload: &[u8]) -> Vec<u8> {
        if payload != APPLICATION_ID {
            return self.fail(ERR_BAD_REQUEST);
        }
        self.app_open = true;
        self.auth_scheme_bound = false;
        self.challenge = None;
        ok(&[])
    }

    fn get_random(&mut self, payload: &[u8]) -> Vec<u8> {
        let Ok(len) = <[u8; 2]>::try_from(payload) else {
            return self.fail(ERR_BAD_REQUEST);
        };
        let len = usize::from(u16::from_be_bytes(len));
        if !(8..=256).contains(&len) {
            return self.fail(ERR_VALUE_RANGE);
        }
        self.rng_rounds = self.rng_rounds.wrapping_add(1);
        let rounds = self.rng_rounds;
        let bytes: Vec<u8> = (0..len)
            .map(|i| (i as u8).wrapping_mul(7).wrapping_add(rounds))
            .collect();
        ok(&bytes)
    }

    fn read_object(&mut self, param: u8, payload: &[u8]) -> Vec<u8> {
        if param != 0x00 {
            return self.fail(ERR_BAD_REQUEST);
        }
        let &[tag, id] = payload else {
            return self.fail(ERR_BAD_REQUEST);
        };
        if (ObjectId { tag, id }) == ObjectId::PRIVATE_KEY {
            return self.fail(ERR_ACCESS_DENIED);
        }
        match self.objects.get(&(tag, id)).cloned() {
            Some(bytes) => ok(&bytes),
            None => self.fail(ERR_BAD_REQUEST),
        }
    }

    fn write_object(&mut self, param: u8, payload: &[u8]) -> Vec<u8> {
        if param != 0x00 {
            return self.fail(ERR_BAD_REQUEST);
        }
        let Some(([tag, id, off_hi, off_lo], data)) = split_write_head(payload) else {
            return self.fail(ERR_BAD_REQUEST);
        };
        if off_hi != 0 || off_lo != 0 {
            return self.fail(ERR_BAD_REQUEST);
        }
        let oid = ObjectId { tag, id };
        let err = match oid {
            // Lifecycle fields ratchet: transitions only go up.
            ObjectId::LIFECYCLE_STATUS | ObjectId::APP_LIFECYCLE_STATUS => {
                self.check_ratchet(oid, data)
            }
            ObjectId::SECURITY_STATUS | ObjectId::APP_SECURITY_STATUS => {
                (data.len() != 1).then_some(ERR_BAD_REQUEST)
            }
            ObjectId::SLEEP_ACTIVATION_DELAY => check_byte_range(data, 20, 255),
            ObjectId::CURRENT_LIMIT => check_byte_range(data, 9, 15),
            ObjectId::CERTIFICATE => None,
            _ => Some(ERR_ACCESS_DENIED),
        };
        if let Some(code) = err {
            return self.fail(code);
        }
        self.objects.insert((tag, id), data.to_vec());
        ok(&[])
    }

    fn set_auth_scheme(&mut self, param: u8, payload: &[u8]) -> Vec<u8> {
        if param != 0x91 || payload != ObjectId::PRIVATE_KEY.to_bytes() {
            return self.fail(ERR_BAD_REQUEST);
        }
        self.auth_scheme_bound = true;
        ok(&[])
    }

    fn set_auth_msg(&mut self, param: u8, payload: &[u8]) -> Vec<u8> {
        if param != 0x01 || payload.len() != AUTH_CHALLENGE_LEN {
            return self.fail(ERR_BAD_REQUEST);
        }
        if !self.auth_scheme_bound {
            return self.fail(ERR_SEQUENCE);
        }
        self.challenge = Some(payload.to_vec());
        ok(&[])
    }

    fn get_auth_msg(&mut self, param: u8, payload: &[u8]) -> Vec<u8> {
        if param != 0x02 || !payload.is_empty() {
            return self.fail(ERR_BAD_REQUEST);
        }
        let Some(challenge) = self.challenge.take() else {
            return self.fail(ERR_SEQUENCE);
        };
        ok(&Self::sign(&challenge))
    }

    /// Deterministic stand-in for the in-device ECDSA operation.
    fn sign(challenge: &[u8]) -> Vec<u8> {
        let mut sig = Vec::with_capacity(4 * challenge.len());
        for block in 0u8..4 {
            sig.extend(challenge.iter().map(|b| b ^ block.wrapping_mul(0x3D)));
        }
        sig
    }

    fn check_ratchet(&self, oid: ObjectId, data: &[u8]) -> Option<u8> {
        let &[next] = data else {
            return Some(ERR_BAD_REQUEST);
        };
        match self.object(oid).and_then(|b| b.first().copied()) {
            Some(current) if next < current => Some(ERR_VALUE_RANGE),
            _ => None,
        }
    }

    fn fail(&mut self, code: u8) -> Vec<u8> {
        self.event_count = self.event_count.wrapping_add(1);
        self.objects.insert(
            (
                ObjectId::SECURITY_EVENT_COUNTER.tag,
                ObjectId::SECURITY_EVENT_COUNTER.id,
            ),
            vec![self.event_count],
        );
        self.objects.insert(
            (ObjectId::LAST_ERROR_CODES.tag, ObjectId::LAST_ERROR_CODES.id),
            vec![code],
        );
        vec![STATUS_FAILED, 0x00, 0x00, 0x00]
    }

    fn default_uid() -> Vec<u8> {
        // 25-byte hardware identifier plus the BCD-coded build number.
        let mut uid: Vec<u8> = (0..25u8).map(|i| i.wrapping_mul(11).wrapping_add(3)).collect();
        uid.extend_from_slice(&[0x10, 0x48]);
        uid
    }

    fn default_certificate() -> Vec<u8> {
        // DER-shaped body behind the extended-length sequence markers,
        // zero padded to the stored object size the way the device pads it.
        let inner = 296usize;
        let mut der = vec![0x30, 0x82, (inner >> 8) as u8, inner as u8];
        der.extend((0..inner).map(|i| (i as u8).wrapping_mul(31).wrapping_add(7)));
        der.resize(384, 0x00);
        der
    }
}

impl Default for TrustElemModel {
    fn default() -> Self {
        Self::new()
    }
}

fn ok(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x00, 0x00];
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn split_header(req: &[u8]) -> Option<(&[u8], &[u8])> {
    if req.len() < 4 {
        return None;
    }
    Some(req.split_at(4))
}

fn check_byte_range(data: &[u8], min: u8, max: u8) -> Option<u8> {
    let &[value] = data else {
        return Some(ERR_BAD_REQUEST);
    };
    (!(min..=max).contains(&value)).then_some(ERR_VALUE_RANGE)
}

fn split_write_head(payload: &[u8]) -> Option<([u8; 4], &[u8])> {
    if payload.len() < 4 {
        return None;
    }
    let (head, data) = payload.split_at(4);
    Some((head.try_into().unwrap(), data))
}
