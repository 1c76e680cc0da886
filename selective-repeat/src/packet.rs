//! Wire-format definitions for protocol packets and application messages.
//!
//! Every unit exchanged between the two endpoints is a [`Packet`].  This
//! module is responsible for:
//! - Defining the fixed-size packet layout (seq, ack, checksum, payload).
//! - Computing and verifying the additive checksum.
//! - Serialising a [`Packet`] into a byte buffer and parsing it back,
//!   returning errors for truncated input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All integers are **big-endian** two's-complement `i32`.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Payload (20 bytes) ...                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total size: [`PACKET_LEN`] = 32 bytes.

use thiserror::Error;

/// Size of every payload, both in messages and in packets.
pub const PAYLOAD_LEN: usize = 20;

/// Header field value meaning "this field carries nothing".
pub const NOT_IN_USE: i32 = -1;

/// Filler byte used for the payload of ack-only packets.
pub const ACK_FILLER: u8 = b'0';

/// Byte length of an encoded packet.
pub const PACKET_LEN: usize = 12 + PAYLOAD_LEN;

// Byte offsets of each field within the serialised packet.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_CHECKSUM: usize = 8;
const OFF_PAYLOAD: usize = 12;

/// Sequence number within `[0, seq_space)`.
pub type SeqNum = u32;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An opaque application payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message {
    pub data: [u8; PAYLOAD_LEN],
}

impl Message {
    pub fn new(data: [u8; PAYLOAD_LEN]) -> Self {
        Self { data }
    }

    /// A message made of [`PAYLOAD_LEN`] copies of `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; PAYLOAD_LEN],
        }
    }
}

impl From<[u8; PAYLOAD_LEN]> for Message {
    fn from(data: [u8; PAYLOAD_LEN]) -> Self {
        Self { data }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A complete protocol packet.
///
/// Header fields are kept as raw `i32` values so that the checksum covers
/// exactly what travels on the wire, including the [`NOT_IN_USE`] sentinel
/// and any value a corrupting channel writes into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Data sequence number, or [`NOT_IN_USE`] for a pure acknowledgment.
    pub seq: i32,
    /// Acknowledged sequence number, or [`NOT_IN_USE`] for a data packet.
    pub ack: i32,
    /// `seq + ack + sum(payload)`, as computed by the originator.
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    /// Build a data packet carrying `message` with a valid checksum.
    pub fn data(seq: SeqNum, message: &Message) -> Self {
        Self::sealed(seq as i32, NOT_IN_USE, message.data)
    }

    /// Build an ack-only packet acknowledging `ack`.
    pub fn ack(ack: SeqNum) -> Self {
        Self::sealed(NOT_IN_USE, ack as i32, [ACK_FILLER; PAYLOAD_LEN])
    }

    fn sealed(seq: i32, ack: i32, payload: [u8; PAYLOAD_LEN]) -> Self {
        let mut packet = Self {
            seq,
            ack,
            checksum: 0,
            payload,
        };
        packet.checksum = packet.compute_checksum();
        packet
    }

    /// Recompute the checksum over the current field values.
    ///
    /// Sum of `seq`, `ack` and every payload byte, with wrapping arithmetic.
    /// Any single-field rewrite changes the sum, so a corrupted packet never
    /// verifies.
    pub fn compute_checksum(&self) -> i32 {
        self.payload
            .iter()
            .fold(self.seq.wrapping_add(self.ack), |sum, &b| {
                sum.wrapping_add(i32::from(b))
            })
    }

    /// `true` when the stored checksum disagrees with the recomputed one.
    pub fn is_corrupted(&self) -> bool {
        self.checksum != self.compute_checksum()
    }

    /// The sequence number, if it lies in `[0, seq_space)`.
    pub fn seq_num(&self, seq_space: SeqNum) -> Option<SeqNum> {
        field_in_space(self.seq, seq_space)
    }

    /// The acknowledgment number, if it lies in `[0, seq_space)`.
    pub fn ack_num(&self, seq_space: SeqNum) -> Option<SeqNum> {
        field_in_space(self.ack, seq_space)
    }

    /// The payload as an application [`Message`].
    pub fn message(&self) -> Message {
        Message::new(self.payload)
    }

    /// Serialise this packet into its fixed-size wire representation.
    ///
    /// The stored checksum is written as-is; call [`Packet::data`] or
    /// [`Packet::ack`] to obtain a packet with a valid one.
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.ack.to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[OFF_PAYLOAD..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Only the length is validated.  Checksum verification is left to the
    /// receiving endpoint, which must discard corrupted packets silently.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() != PACKET_LEN {
            return Err(PacketError::BadLength {
                expected: PACKET_LEN,
                actual: buf.len(),
            });
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[OFF_PAYLOAD..]);

        Ok(Self {
            seq: read_i32(buf, OFF_SEQ),
            ack: read_i32(buf, OFF_ACK),
            checksum: read_i32(buf, OFF_CHECKSUM),
            payload,
        })
    }
}

/// Errors that can arise when parsing a raw packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet must be {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

fn read_i32(buf: &[u8], off: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[off..off + 4]);
    i32::from_be_bytes(word)
}

fn field_in_space(value: i32, seq_space: SeqNum) -> Option<SeqNum> {
    SeqNum::try_from(value).ok().filter(|&v| v < seq_space)
}
