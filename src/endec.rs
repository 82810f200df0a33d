//! BGP packet encoding and decoding

// SPDX-License-Identifier: AGPL-3.0-or-later

#[cfg(feature = "tokio-endec")]
use crate::Message;
use crate::{
    MessageError, MessageHeaderErrorSubcode, PeerAttrs, MARKER, MSG_HEADER_LEN, MSG_MAX_LEN,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
#[cfg(feature = "tokio-endec")]
use tokio_util::codec::{Decoder, Encoder};

/// Check that the remaining buffer length covers an upcoming read
macro_rules! ensure_remaining {
    ($src:expr, $len:expr, $err:expr) => {
        if $src.remaining() < $len {
            return Err($err);
        }
    };
}
pub(crate) use ensure_remaining;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
}

/// BGP message header: 16-byte all-ones marker, 2-byte length, 1-byte type
///
/// The marker is validated on decode and regenerated on encode, so only the
/// length and type are kept in memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub length: u16,
    pub type_: MessageType,
}

impl Header {
    /// Smallest valid total length for each message type
    const fn min_len(type_: MessageType) -> usize {
        match type_ {
            MessageType::Open => 29,
            MessageType::Update => 23,
            MessageType::Notification => 21,
            MessageType::Keepalive => MSG_HEADER_LEN,
        }
    }

    /// Decode the fixed 19-byte frame.
    ///
    /// The caller is responsible for reading the remaining
    /// `length - 19` bytes of the message before handing them to
    /// [`crate::Message::from_bytes`].
    pub fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            MSG_HEADER_LEN,
            MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                src.clone(),
                "truncated message header",
            )
        );
        let marker = src.copy_to_bytes(MARKER.len());
        if *marker != MARKER {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::ConnectionNotSynchronized,
                marker,
                "header marker is not all ones",
            ));
        }
        let length_bytes = src.copy_to_bytes(2);
        let length = u16::from_be_bytes([length_bytes[0], length_bytes[1]]);
        let type_octet = src.get_u8();
        if usize::from(length) < MSG_HEADER_LEN || usize::from(length) > MSG_MAX_LEN {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                length_bytes,
                "message length outside the valid range",
            ));
        }
        let Some(type_) = MessageType::from_u8(type_octet) else {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::BadMessageType,
                Bytes::copy_from_slice(&[type_octet]),
                "unrecognized message type",
            ));
        };
        if usize::from(length) < Self::min_len(type_)
            || (type_ == MessageType::Keepalive && usize::from(length) != MSG_HEADER_LEN)
        {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                length_bytes,
                "message length invalid for its type",
            ));
        }
        Ok(Self { length, type_ })
    }

    pub fn to_bytes(&self, dst: &mut BytesMut) -> usize {
        dst.put_slice(&MARKER);
        dst.put_u16(self.length);
        dst.put_u8(self.type_ as u8);
        MSG_HEADER_LEN
    }

    /// Number of body bytes that follow the header on the wire
    #[must_use]
    pub fn body_len(&self) -> usize {
        usize::from(self.length) - MSG_HEADER_LEN
    }
}

/// BGP packet component with a fixed length or containing a length field
pub trait Component {
    /// Decode the component from a buffer.
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError>
    where
        Self: Sized;

    /// Encode the component into a buffer.
    ///
    /// Returns the number of bytes written.
    fn to_bytes(self, dst: &mut BytesMut) -> usize;

    /// Find out the length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

/// BGP packet component whose wire framing depends on what the peer
/// negotiated in its OPEN (AS number width, Add-Path families)
pub trait PeerComponent {
    /// Decode the component from a buffer under the given peer attributes.
    fn from_bytes(src: &mut Bytes, peer: &PeerAttrs) -> Result<Self, MessageError>
    where
        Self: Sized;

    /// Encode the component into a buffer.
    ///
    /// Returns the number of bytes written. Encoding needs no peer input
    /// because decoded values remember their own framing.
    fn to_bytes(self, dst: &mut BytesMut) -> usize;

    /// Find out the length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

impl Component for Ipv4Addr {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let octets = src.get_u32();
        Ok(Self::from(octets))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u32(self.into());
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

impl Component for Ipv6Addr {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let mut octets = [0; 16];
        src.copy_to_slice(&mut octets);
        Ok(Self::from(octets))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_slice(&self.octets());
        16
    }

    fn encoded_len(&self) -> usize {
        16
    }
}

impl Component for IpAddr {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        if src.remaining() == 4 {
            Ok(Self::V4(Ipv4Addr::from_bytes(src)?))
        } else if src.remaining() == 16 {
            Ok(Self::V6(Ipv6Addr::from_bytes(src)?))
        } else {
            Err(MessageError::update(
                crate::UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "IP address is neither 4 nor 16 bytes",
            ))
        }
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        match self {
            Self::V4(addr) => addr.to_bytes(dst),
            Self::V6(addr) => addr.to_bytes(dst),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::V4(addr) => addr.encoded_len(),
            Self::V6(addr) => addr.encoded_len(),
        }
    }
}

macro_rules! impl_component_for_intn {
    ($typ:ty, $getter:ident, $putter:ident, $n:expr) => {
        impl Component for $typ {
            fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
                Ok(src.$getter())
            }

            fn to_bytes(self, dst: &mut BytesMut) -> usize {
                dst.$putter(self);
                $n
            }

            fn encoded_len(&self) -> usize {
                $n
            }
        }
    };
}

impl_component_for_intn!(u8, get_u8, put_u8, 1);
impl_component_for_intn!(u16, get_u16, put_u16, 2);
impl_component_for_intn!(u32, get_u32, put_u32, 4);

/// BGP packet encoder and decoder for use with `tokio_util` framed streams
///
/// The codec carries the session's [`PeerAttrs`] because capability
/// negotiation in the OPEN exchange changes how later UPDATE messages are
/// framed. The FSM installs the negotiated attributes with
/// [`BgpCodec::set_peer_attrs`] once the OPENs have been exchanged.
#[cfg(feature = "tokio-endec")]
#[derive(Clone, Debug, Default)]
pub struct BgpCodec {
    peer: PeerAttrs,
}

#[cfg(feature = "tokio-endec")]
impl BgpCodec {
    #[must_use]
    pub fn new(peer: PeerAttrs) -> Self {
        Self { peer }
    }

    pub fn set_peer_attrs(&mut self, peer: PeerAttrs) {
        self.peer = peer;
    }

    #[must_use]
    pub fn peer_attrs(&self) -> &PeerAttrs {
        &self.peer
    }
}

#[cfg(feature = "tokio-endec")]
impl Decoder for BgpCodec {
    type Item = Message;
    type Error = crate::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MSG_HEADER_LEN {
            return Ok(None);
        }
        let length = usize::from(u16::from_be_bytes([src[16], src[17]]));
        let length_valid = (MSG_HEADER_LEN..=MSG_MAX_LEN).contains(&length);
        if length_valid && src.len() < length {
            // Wait for the rest of the message
            return Ok(None);
        }
        // An out-of-range length is consumed as a bare header so that
        // `Header::from_bytes` can reject it without stalling the stream.
        let frame_len = if length_valid { length } else { MSG_HEADER_LEN };
        let mut buf = src.split_to(frame_len).freeze();
        let header = Header::from_bytes(&mut buf)?;
        log::trace!(
            "decoded header: length {}, type {:?}",
            header.length,
            header.type_
        );
        let msg = Message::from_bytes(&header, &mut buf, &self.peer)?;
        Ok(Some(msg))
    }
}

#[cfg(feature = "tokio-endec")]
impl Encoder<Message> for BgpCodec {
    type Error = crate::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let wire = item.to_wire()?;
        dst.extend_from_slice(&wire);
        Ok(())
    }
}
