use core::fmt;

/// Parses a typed value out of a reply payload slice.
pub trait FromPayload {
    fn from_payload(payload: &[u8]) -> Self;
}

/// Sink for raw command bytes. Implemented by the driver so that
/// [`Command`](crate::Command) values can serialize themselves into the
/// outgoing frame buffer.
pub trait CommandWriter {
    fn write_cmd_bytes(&mut self, bytes: &[u8]);
}

/// Serializes a command into a [`CommandWriter`].
pub trait ToPayload {
    fn to_payload(&self, writer: &mut dyn CommandWriter);
}

/// Transport and framing errors.
///
/// Anything that goes wrong below the confirmation-code level ends up here:
/// the serial link failing (or being closed), and reply frames that do not
/// survive validation. Sensor-reported conditions are *not* errors at this
/// level, they come back as [`StatusCode`](crate::StatusCode) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A serial read or write failed, timed out, or the port is gone.
    Link,
    /// The reply did not start with the 0xEF01 header.
    BadHeader,
    /// The reply carried a device address other than the one in use.
    AddressMismatch,
    /// The reply's length field is impossible (too short for a checksum, or
    /// larger than the receive buffer).
    BadLength,
    /// The reply's additive checksum did not verify.
    BadChecksum,
    /// The reply ended before the declared length was read.
    TruncatedReply,
    /// A structurally valid frame that does not fit the command sent
    /// (wrong packet id, missing payload fields, out-of-range page id).
    UnexpectedReply,
    /// A data stream was longer than the buffer supplied for it.
    BufferOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "serial link failure"),
            Self::BadHeader => write!(f, "bad frame header"),
            Self::AddressMismatch => write!(f, "reply address mismatch"),
            Self::BadLength => write!(f, "bad frame length"),
            Self::BadChecksum => write!(f, "frame checksum mismatch"),
            Self::TruncatedReply => write!(f, "truncated reply"),
            Self::UnexpectedReply => write!(f, "unexpected reply"),
            Self::BufferOverflow => write!(f, "data stream overflowed buffer"),
        }
    }
}
