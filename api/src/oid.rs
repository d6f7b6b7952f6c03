// Licensed under the Apache-2.0 license

/// Address of one entry in the device's internal object store.
///
/// The store is split into a device/global namespace and an application
/// namespace, distinguished by the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId {
    pub tag: u8,
    pub id: u8,
}

impl ObjectId {
    /// Tag of the device/global namespace.
    pub const TAG_DEVICE: u8 = 0xE0;
    /// Tag of the application namespace.
    pub const TAG_APPLICATION: u8 = 0xF1;

    /// Global lifecycle status. Creation 0x01, initialization 0x03,
    /// operational 0x07, termination 0x15; transitions are one-way from a
    /// lower value to a higher one, enforced by the device.
    pub const LIFECYCLE_STATUS: Self = Self::device(0xC0);
    /// Global security status.
    pub const SECURITY_STATUS: Self = Self::device(0xC1);
    /// Coprocessor UID: 25 bytes of hardware identifier followed by the
    /// 2-byte BCD-coded embedded software build number.
    pub const COPROCESSOR_UID: Self = Self::device(0xC2);
    /// Delay in milliseconds after the last bus activity before the device
    /// enters its power-saving sleep mode. Device accepts 20..=255.
    pub const SLEEP_ACTIVATION_DELAY: Self = Self::device(0xC3);
    /// Maximum current the device may draw, in mA. Device accepts 9..=15.
    pub const CURRENT_LIMIT: Self = Self::device(0xC4);
    /// Security event counter.
    pub const SECURITY_EVENT_COUNTER: Self = Self::device(0xC5);
    /// X.509 device certificate, zero-padded to the object size.
    pub const CERTIFICATE: Self = Self::device(0xE0);
    /// First device private key. Write-only signing key reference.
    pub const PRIVATE_KEY: Self = Self::device(0xF0);

    /// Application lifecycle status. Same encoding as the global field,
    /// without the termination state.
    pub const APP_LIFECYCLE_STATUS: Self = Self::application(0xC0);
    /// Application security status.
    pub const APP_SECURITY_STATUS: Self = Self::application(0xC1);
    /// Error codes of the most recent failed commands.
    pub const LAST_ERROR_CODES: Self = Self::application(0xC2);

    const fn device(id: u8) -> Self {
        Self {
            tag: Self::TAG_DEVICE,
            id,
        }
    }

    const fn application(id: u8) -> Self {
        Self {
            tag: Self::TAG_APPLICATION,
            id,
        }
    }

    /// Wire encoding used in request payloads.
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.tag, self.id]
    }
}
