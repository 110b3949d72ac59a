//! MIDI channel-voice message model and codec.
//!
//! [`decode`] is lenient: any status byte outside the channel-voice set
//! yields a [`Message::Raw`] passthrough. Encoding is strict: the checked
//! constructors reject out-of-range fields before a message can reach the
//! wire.

use std::fmt;

mod error;
pub use error::{DecodeError, EncodeError};

/// Message category selected by the high nibble of the status byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MessageType {
    NoteOff,
    NoteOn,
    ControlChange,
    ProgramChange,
    PitchBend,
    /// Anything else: pressure, sysex, real-time bytes, ...
    Raw,
}

impl MessageType {
    pub const fn from_status(status: u8) -> Self {
        match status & 0xf0 {
            0x80 => Self::NoteOff,
            0x90 => Self::NoteOn,
            0xb0 => Self::ControlChange,
            0xc0 => Self::ProgramChange,
            0xe0 => Self::PitchBend,
            _ => Self::Raw,
        }
    }

    /// Total wire length implied by the status byte, `None` for [`Self::Raw`].
    const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::NoteOff | Self::NoteOn | Self::ControlChange | Self::PitchBend => Some(3),
            Self::ProgramChange => Some(2),
            Self::Raw => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoteOff => "Note Off",
            Self::NoteOn => "Note On",
            Self::ControlChange => "Control Change",
            Self::ProgramChange => "Program Change",
            Self::PitchBend => "Pitch Bend",
            Self::Raw => "Raw",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based MIDI channel (1..=16).
///
/// The wire encodes the channel 0-based in the low nibble of the status
/// byte; the 1-based number is what users and device manuals speak.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const MIN: Channel = Channel(1);
    pub const MAX: Channel = Channel(16);

    pub fn try_new(number: u8) -> Result<Self, EncodeError> {
        if !(1..=16).contains(&number) {
            return Err(EncodeError::InvalidChannel(number));
        }

        Ok(Self(number))
    }

    /// Channel from the low nibble of a status byte. Always in range.
    pub const fn from_nibble(status: u8) -> Self {
        Self((status & 0x0f) + 1)
    }

    /// The 1-based channel number.
    pub const fn number(self) -> u8 {
        self.0
    }

    /// The 0-based wire nibble.
    pub const fn nibble(self) -> u8 {
        self.0 - 1
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for Channel {
    type Error = EncodeError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::try_new(number)
    }
}

impl From<Channel> for u8 {
    fn from(chan: Channel) -> u8 {
        chan.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 14-bit values split LSB-first across two 7-bit data bytes.
pub mod u14 {
    pub const MAX: u16 = 0x3fff;
    pub const CENTER: u16 = 0x2000;

    #[inline]
    pub fn split(val: u16) -> [u8; 2] {
        [(val & 0x7f) as u8, ((val >> 7) & 0x7f) as u8]
    }

    #[inline]
    pub fn join(lsb: u8, msb: u8) -> u16 {
        (lsb & 0x7f) as u16 | (((msb & 0x7f) as u16) << 7)
    }
}

/// A decoded MIDI message.
///
/// Immutable value type: produced fresh by [`decode`], consumed by value or
/// serialized with [`Message::to_bytes`]. Build outgoing messages with the
/// checked constructors ([`Message::note_on`] & co) which enforce the field
/// ranges eagerly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    NoteOn {
        channel: Channel,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: Channel,
        note: u8,
        velocity: u8,
    },
    ControlChange {
        channel: Channel,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: Channel,
        program: u8,
    },
    PitchBend {
        channel: Channel,
        /// 14-bit, 0x2000 is center.
        value: u16,
    },
    /// Verbatim bytes of a message outside the channel-voice set.
    Raw(Box<[u8]>),
}

fn check_data_byte(field: &'static str, value: u8) -> Result<(), EncodeError> {
    if value > 0x7f {
        return Err(EncodeError::InvalidField {
            field,
            value: value as u16,
            max: 0x7f,
        });
    }

    Ok(())
}

impl Message {
    pub fn note_on(channel: Channel, note: u8, velocity: u8) -> Result<Self, EncodeError> {
        check_data_byte("note", note)?;
        check_data_byte("velocity", velocity)?;

        Ok(Self::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    pub fn note_off(channel: Channel, note: u8, velocity: u8) -> Result<Self, EncodeError> {
        check_data_byte("note", note)?;
        check_data_byte("velocity", velocity)?;

        Ok(Self::NoteOff {
            channel,
            note,
            velocity,
        })
    }

    pub fn control_change(channel: Channel, controller: u8, value: u8) -> Result<Self, EncodeError> {
        check_data_byte("controller", controller)?;
        check_data_byte("value", value)?;

        Ok(Self::ControlChange {
            channel,
            controller,
            value,
        })
    }

    pub fn program_change(channel: Channel, program: u8) -> Result<Self, EncodeError> {
        check_data_byte("program", program)?;

        Ok(Self::ProgramChange { channel, program })
    }

    pub fn pitch_bend(channel: Channel, value: u16) -> Result<Self, EncodeError> {
        if value > u14::MAX {
            return Err(EncodeError::InvalidField {
                field: "pitch bend value",
                value,
                max: u14::MAX,
            });
        }

        Ok(Self::PitchBend { channel, value })
    }

    pub fn raw(bytes: impl Into<Box<[u8]>>) -> Result<Self, EncodeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(EncodeError::EmptyRaw);
        }

        Ok(Self::Raw(bytes))
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::NoteOn { .. } => MessageType::NoteOn,
            Self::NoteOff { .. } => MessageType::NoteOff,
            Self::ControlChange { .. } => MessageType::ControlChange,
            Self::ProgramChange { .. } => MessageType::ProgramChange,
            Self::PitchBend { .. } => MessageType::PitchBend,
            Self::Raw(_) => MessageType::Raw,
        }
    }

    /// The channel a channel-voice message is addressed to.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::PitchBend { channel, .. } => Some(*channel),
            Self::Raw(_) => None,
        }
    }

    /// Length of the serialized message in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::ProgramChange { .. } => 2,
            Self::Raw(bytes) => bytes.len(),
            _ => 3,
        }
    }

    /// Serializes to the wire format.
    ///
    /// Data fields are masked to their 7-bit range, so a message assembled
    /// with out-of-range struct-literal fields truncates rather than
    /// emitting a spurious status byte. The checked constructors never let
    /// such a value exist in the first place.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | channel.nibble(), note & 0x7f, velocity & 0x7f],
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | channel.nibble(), note & 0x7f, velocity & 0x7f],
            Self::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xb0 | channel.nibble(), controller & 0x7f, value & 0x7f],
            Self::ProgramChange { channel, program } => {
                vec![0xc0 | channel.nibble(), program & 0x7f]
            }
            Self::PitchBend { channel, value } => {
                let [lsb, msb] = u14::split(*value);
                vec![0xe0 | channel.nibble(), lsb, msb]
            }
            Self::Raw(bytes) => bytes.to_vec(),
        }
    }

    pub fn display(&self) -> crate::bytes::Displayable<'static> {
        crate::bytes::Displayable::from(self.to_bytes())
    }
}

/// Decodes one MIDI message from its wire bytes.
///
/// Pure function. Unrecognized status bytes are wrapped verbatim in
/// [`Message::Raw`]; only structurally invalid input fails: empty input or
/// fewer bytes than the status byte implies. Data bytes are masked to
/// 7 bits so a decoded message always satisfies the field invariants.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let (&status, data) = bytes.split_first().ok_or(DecodeError::EmptyMessage)?;

    let message_type = MessageType::from_status(status);
    let expected = match message_type.fixed_len() {
        Some(expected) => expected,
        None => return Ok(Message::Raw(bytes.into())),
    };

    if bytes.len() < expected {
        return Err(DecodeError::TruncatedMessage {
            message_type,
            expected,
            found: bytes.len(),
        });
    }

    let channel = Channel::from_nibble(status);
    let msg = match message_type {
        MessageType::NoteOff => Message::NoteOff {
            channel,
            note: data[0] & 0x7f,
            velocity: data[1] & 0x7f,
        },
        MessageType::NoteOn => Message::NoteOn {
            channel,
            note: data[0] & 0x7f,
            velocity: data[1] & 0x7f,
        },
        MessageType::ControlChange => Message::ControlChange {
            channel,
            controller: data[0] & 0x7f,
            value: data[1] & 0x7f,
        },
        MessageType::ProgramChange => Message::ProgramChange {
            channel,
            program: data[0] & 0x7f,
        },
        MessageType::PitchBend => Message::PitchBend {
            channel,
            value: u14::join(data[0], data[1]),
        },
        MessageType::Raw => unreachable!(),
    };

    Ok(msg)
}
