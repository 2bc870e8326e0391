use core::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::utils::FromPayload;

/// Confirmation codes returned by the module, mapped to a closed enum.
///
/// The ZFM-20 confirmation-code space is open ended (newer firmware adds
/// codes), so every code the workflows act on gets a named variant and
/// everything else lands in [`StatusCode::Other`] with the raw byte
/// preserved. `Other` is never success; callers that match on `Ok` get
/// fail-safe behavior for free when a new firmware code shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 0x00: command executed.
    Ok,
    /// 0x01: error receiving the command packet.
    PacketError,
    /// 0x02: no finger on the sensor window.
    NoFinger,
    /// 0x03: image capture failed.
    ImageFail,
    /// 0x06: image too messy to characterize.
    ImageTooMessy,
    /// 0x07: too few feature points in the image.
    FeatureFail,
    /// 0x09: no matching template in the library.
    NotFound,
    /// 0x0A: the two enrollment samples do not belong to the same finger.
    EnrollMismatch,
    /// 0x0B: page id outside the template library.
    BadLocation,
    /// 0x13: wrong handshake password.
    WrongPassword,
    /// 0x15: no valid primary image in the image buffer.
    InvalidImage,
    /// 0x18: flash write failed.
    FlashError,
    /// Any confirmation code without a named variant, raw value preserved.
    Other(u8),
}

impl StatusCode {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Self::Ok,
            0x01 => Self::PacketError,
            0x02 => Self::NoFinger,
            0x03 => Self::ImageFail,
            0x06 => Self::ImageTooMessy,
            0x07 => Self::FeatureFail,
            0x09 => Self::NotFound,
            0x0A => Self::EnrollMismatch,
            0x0B => Self::BadLocation,
            0x13 => Self::WrongPassword,
            0x15 => Self::InvalidImage,
            0x18 => Self::FlashError,
            other => Self::Other(other),
        }
    }

    /// The raw confirmation byte this variant stands for.
    pub fn raw(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::PacketError => 0x01,
            Self::NoFinger => 0x02,
            Self::ImageFail => 0x03,
            Self::ImageTooMessy => 0x06,
            Self::FeatureFail => 0x07,
            Self::NotFound => 0x09,
            Self::EnrollMismatch => 0x0A,
            Self::BadLocation => 0x0B,
            Self::WrongPassword => 0x13,
            Self::InvalidImage => 0x15,
            Self::FlashError => 0x18,
            Self::Other(raw) => raw,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::PacketError => write!(f, "packet receive error"),
            Self::NoFinger => write!(f, "no finger detected"),
            Self::ImageFail => write!(f, "imaging error"),
            Self::ImageTooMessy => write!(f, "image too messy"),
            Self::FeatureFail => write!(f, "could not identify features"),
            Self::NotFound => write!(f, "no match found"),
            Self::EnrollMismatch => write!(f, "prints did not match"),
            Self::BadLocation => write!(f, "bad storage location"),
            Self::WrongPassword => write!(f, "wrong password"),
            Self::InvalidImage => write!(f, "image invalid"),
            Self::FlashError => write!(f, "flash storage error"),
            Self::Other(raw) => write!(f, "module error {:#04x}", raw),
        }
    }
}

/// Replies to commands returned by the module. Names match the commands.
#[derive(Debug)]
pub enum Reply {
    VfyPwd(StatusCode),

    /// Carries system status and configuration on success.
    ReadSysPara(ReadSysParaResult),

    GenImg(StatusCode),

    Img2Tz(StatusCode),

    /// Carries the matched page and score on success.
    Search(SearchResult),

    HiSpeedSearch(SearchResult),

    RegModel(StatusCode),

    Store(StatusCode),

    DeletChar(StatusCode),

    /// Carries one 256-slot occupancy bitmap page on success.
    ReadIndexTable(IndexTableResult),

    /// Acknowledge before the image data stream starts.
    UpImage(StatusCode),

    /// Acknowledge before the character-buffer data stream starts.
    UpChar(StatusCode),
}

#[derive(Debug)]
pub struct ReadSysParaResult {
    pub confirmation: StatusCode,
    /// Present only when `confirmation` is `Ok`.
    pub parameters: Option<SystemParameters>,
}

#[derive(Debug)]
pub struct SearchResult {
    pub confirmation: StatusCode,
    /// Present only when `confirmation` is `Ok`: the matched page id and
    /// the match score the module reported for it.
    pub hit: Option<SearchHit>,
}

/// A positive library search result as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// Raw page id. Workflows narrow this to a
    /// [`TemplateSlot`](crate::TemplateSlot) before handing it out.
    pub page_id: u16,
    /// Match strength; higher is stronger.
    pub score: u16,
}

#[derive(Debug)]
pub struct IndexTableResult {
    pub confirmation: StatusCode,
    /// Present only when `confirmation` is `Ok`. Bit `n` of the page is set
    /// when slot `page * 256 + n` holds a template.
    pub bitmap: Option<[u8; 32]>,
}

/// System status and configuration as returned by `ReadSysPara`.
#[derive(Debug, Clone, Copy)]
pub struct SystemParameters {
    /// Status information. Use instance methods to get to individual bits.
    pub status_register: u16,

    /// System identifier code; the datasheet gives this a constant value of
    /// 0x0009.
    pub system_identifier_code: u16,

    /// Capacity of the template library.
    pub finger_library_size: u16,

    /// Security level [1-5].
    pub security_level: u16,

    /// Device address as currently configured.
    pub device_address: u32,

    /// Packet size code [0-3]:\
    /// 0 = 32 bytes\
    /// 1 = 64 bytes\
    /// 2 = 128 bytes (the default)\
    /// 3 = 256 bytes
    pub packet_size: u16,

    /// Baud setting. Multiply by 9600 to get the actual baud rate; the
    /// default value is 6 for 57,600 baud.
    pub baud_setting: u16,
}

impl SystemParameters {
    /// True if the module is busy executing another command.
    ///
    /// *Busy* in the datasheet.
    pub fn busy(&self) -> bool {
        self.status_register & (1u16 << 0) != 0
    }

    /// True if the module found a matching finger. Always check the reply to
    /// the actual search request instead of relying on this bit.
    ///
    /// *Pass* in the datasheet.
    pub fn has_finger_match(&self) -> bool {
        self.status_register & (1u16 << 1) != 0
    }

    /// True if the handshake password has been verified.
    ///
    /// *PWD* in the datasheet.
    pub fn password_ok(&self) -> bool {
        self.status_register & (1u16 << 2) != 0
    }

    /// True if the image buffer contains a valid image.
    ///
    /// *ImgBufStat* in the datasheet.
    pub fn has_valid_image(&self) -> bool {
        self.status_register & (1u16 << 3) != 0
    }
}

impl FromPayload for SystemParameters {
    fn from_payload(payload: &[u8]) -> SystemParameters {
        // 16 bytes, big endian throughout. The datasheet mixes bytes and
        // 16-bit words when quoting sizes; offsets here are bytes.
        SystemParameters {
            status_register: BigEndian::read_u16(&payload[0..2]),
            system_identifier_code: BigEndian::read_u16(&payload[2..4]),
            finger_library_size: BigEndian::read_u16(&payload[4..6]),
            security_level: BigEndian::read_u16(&payload[6..8]),
            device_address: BigEndian::read_u32(&payload[8..12]),
            packet_size: BigEndian::read_u16(&payload[12..14]),
            baud_setting: BigEndian::read_u16(&payload[14..16]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_codes_round_trip() {
        for raw in &[
            0x00u8, 0x01, 0x02, 0x03, 0x06, 0x07, 0x09, 0x0A, 0x0B, 0x13, 0x15, 0x18,
        ] {
            let code = StatusCode::from_raw(*raw);
            assert_eq!(code.raw(), *raw);
            assert!(!matches!(code, StatusCode::Other(_)));
        }
    }

    #[test]
    fn unknown_codes_become_other() {
        assert_eq!(StatusCode::from_raw(0x42), StatusCode::Other(0x42));
        assert_eq!(StatusCode::Other(0x42).raw(), 0x42);
        assert!(!StatusCode::from_raw(0x42).is_ok());
    }

    #[test]
    fn only_zero_is_ok() {
        assert!(StatusCode::from_raw(0x00).is_ok());
        for raw in 1..=255u8 {
            assert!(!StatusCode::from_raw(raw).is_ok());
        }
    }

    #[test]
    fn system_parameters_parse() {
        let payload = [
            0x00, 0x04, // status register: PWD bit set
            0x00, 0x09, // system identifier
            0x00, 0xC8, // library size 200
            0x00, 0x03, // security level
            0xFF, 0xFF, 0xFF, 0xFF, // device address
            0x00, 0x02, // packet size code: 128 bytes
            0x00, 0x06, // baud code: 57600
        ];
        let params = SystemParameters::from_payload(&payload);
        assert!(params.password_ok());
        assert!(!params.busy());
        assert!(!params.has_finger_match());
        assert!(!params.has_valid_image());
        assert_eq!(params.finger_library_size, 200);
        assert_eq!(params.device_address, 0xFFFF_FFFF);
        assert_eq!(params.packet_size, 2);
        assert_eq!(params.baud_setting, 6);
    }
}
