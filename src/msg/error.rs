use super::MessageType;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty MIDI message")]
    EmptyMessage,

    #[error("truncated {message_type} message: expected {expected} bytes, found {found}")]
    TruncatedMessage {
        message_type: MessageType,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid MIDI channel {0}, expected 1 to 16")]
    InvalidChannel(u8),

    #[error("{field} out of range: {value} exceeds {max}")]
    InvalidField {
        field: &'static str,
        value: u16,
        max: u16,
    },

    #[error("raw message must hold at least one byte")]
    EmptyRaw,
}
