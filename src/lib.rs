//! BGPWIRE -- BGP-4 wire protocol codec and message model
//!
//! Structs here intend to represent the data instead of the on-wire
//! format. Bytes from a peer are decoded into a typed [`Message`] with all
//! RFC 4271 structural checks applied, and any malformation is reported as
//! a [`MessageError`] carrying the exact NOTIFICATION code, subcode, and
//! offending bytes. The crate does no I/O of its own; the state machine
//! that owns the session feeds it buffers and a [`PeerAttrs`] record with
//! whatever the capability negotiation settled on.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod capability;
mod endec;
pub mod path;
pub mod route;
mod update_builder;

#[cfg(feature = "tokio-endec")]
pub use endec::BgpCodec as Codec;
pub use endec::{Component, Header, MessageType, PeerComponent};
pub use update_builder::UpdateBuilder;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use capability::{AddPathDirection, Afi, Capabilities, OptionalParameters, Safi};
use endec::ensure_remaining;
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use path::PathAttributes;
use route::Routes;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Supported BGP version
pub const BGP_VERSION: u8 = 4;

/// Reserved two-octet ASN standing in for a four-octet one (RFC 6793)
pub const AS_TRANS: u16 = 23456;

/// BGP marker
pub const MARKER: [u8; 16] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// Length of the fixed message header
pub const MSG_HEADER_LEN: usize = 19;

/// Maximum length of any BGP message
pub const MSG_MAX_LEN: usize = 4096;

/// BGP packet errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("requires MP-BGP capability")]
    NoMpBgp,
    #[error("attempting to update NLRI without next hop")]
    NoNextHop,
}

/// A protocol error detected while decoding or encoding a message
///
/// Carries exactly what the resulting NOTIFICATION needs: the RFC 4271
/// error code, the subcode, and a copy of the offending bytes. Decode
/// functions either return a fully valid value or one of these; no partial
/// state is ever handed back alongside an error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{code:?} ({subcode}): {message}")]
pub struct MessageError {
    pub code: NotificationErrorCode,
    pub subcode: u8,
    pub data: Bytes,
    pub message: &'static str,
}

impl MessageError {
    #[must_use]
    pub fn header(subcode: MessageHeaderErrorSubcode, data: Bytes, message: &'static str) -> Self {
        Self {
            code: NotificationErrorCode::MessageHeaderError,
            subcode: subcode as u8,
            data,
            message,
        }
    }

    #[must_use]
    pub fn open(subcode: OpenMessageErrorSubcode, data: Bytes, message: &'static str) -> Self {
        Self {
            code: NotificationErrorCode::OpenMessageError,
            subcode: subcode as u8,
            data,
            message,
        }
    }

    #[must_use]
    pub fn update(subcode: UpdateMessageErrorSubcode, data: Bytes, message: &'static str) -> Self {
        Self {
            code: NotificationErrorCode::UpdateMessageError,
            subcode: subcode as u8,
            data,
            message,
        }
    }

    /// Attach the offending bytes if an inner decoder did not have them
    pub(crate) fn or_data(mut self, data: Bytes) -> Self {
        if self.data.is_empty() {
            self.data = data;
        }
        self
    }
}

/// BGP message
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Open(Open),
    Update(Update),
    Notification(Notification),
    Keepalive,
}

impl Message {
    /// The wire type of this message
    #[must_use]
    pub const fn type_(&self) -> MessageType {
        match self {
            Self::Open(_) => MessageType::Open,
            Self::Update(_) => MessageType::Update,
            Self::Notification(_) => MessageType::Notification,
            Self::Keepalive => MessageType::Keepalive,
        }
    }

    /// Decode a message body.
    ///
    /// `src` must hold the `header.length - 19` bytes that followed the
    /// header on the wire. UPDATE framing depends on `peer`; OPEN
    /// establishes those attributes and therefore ignores it.
    ///
    /// An UPDATE carrying an AS4_PATH from a two-octet peer comes out with
    /// that attribute folded into AS_PATH in the four-octet representation
    /// (RFC 6793). This is the only post-decode mutation; everything else
    /// round-trips byte-identically.
    pub fn from_bytes(
        header: &Header,
        src: &mut Bytes,
        peer: &PeerAttrs,
    ) -> Result<Self, MessageError> {
        let body_len = header.body_len();
        ensure_remaining!(
            src,
            body_len,
            MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                src.clone(),
                "message body shorter than the header length",
            )
        );
        let mut body = src.split_to(body_len);
        let msg = match header.type_ {
            MessageType::Open => Self::Open(Open::from_bytes(&mut body)?),
            MessageType::Update => {
                let mut update = Update::from_bytes(&mut body, peer)?;
                let has_as4_path = update
                    .path_attributes
                    .iter()
                    .any(|v| matches!(v.data, path::Data::As4Path(_)));
                if peer.as_size == AsSize::Two && has_as4_path {
                    update.normalize_as_path();
                }
                Self::Update(update)
            }
            MessageType::Notification => Self::Notification(Notification::from_bytes(&mut body)?),
            MessageType::Keepalive => Self::Keepalive,
        };
        if body.has_remaining() {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                body,
                "trailing bytes after the message body",
            ));
        }
        Ok(msg)
    }

    /// Encode the message, header included, computing the length field.
    ///
    /// Fails if the total exceeds the 4096-byte message ceiling.
    pub fn to_wire(&self) -> Result<Bytes, MessageError> {
        let mut body = BytesMut::new();
        match self.clone() {
            Self::Open(msg) => {
                msg.to_bytes(&mut body);
            }
            Self::Update(msg) => {
                msg.to_bytes(&mut body);
            }
            Self::Notification(msg) => {
                msg.to_bytes(&mut body);
            }
            Self::Keepalive => {}
        }
        let total = MSG_HEADER_LEN + body.len();
        if total > MSG_MAX_LEN {
            return Err(MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                Bytes::new(),
                "encoded message exceeds the maximum message size",
            ));
        }
        let header = Header {
            length: u16::try_from(total).expect("message length overflow"),
            type_: self.type_(),
        };
        let mut dst = BytesMut::with_capacity(total);
        header.to_bytes(&mut dst);
        dst.unsplit(body);
        Ok(dst.freeze())
    }
}

/// Negotiated peer attributes that change how later messages are framed
///
/// Produced by the FSM from the capability negotiation and threaded
/// through every decode. The default is a two-octet-AS peer with no
/// Add-Path families, which is what RFC 4271 alone gives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerAttrs {
    pub as_size: AsSize,
    pub add_path: HashMap<(Afi, Safi), AddPathDirection>,
}

impl PeerAttrs {
    /// Record what the peer advertised in its OPEN.
    ///
    /// This is advertisement, not negotiation: the FSM still intersects
    /// both sides' capabilities before installing the result here.
    #[must_use]
    pub fn from_open(open: &Open) -> Self {
        let mut attrs = Self::default();
        for param in open.opt_params.iter() {
            if let capability::OptionalParameterValue::Capabilities(caps) = param {
                if caps.four_octet_asn().is_some() {
                    attrs.as_size = AsSize::Four;
                }
                for family in caps.add_path_families() {
                    attrs
                        .add_path
                        .insert((family.afi, family.safi), family.direction);
                }
            }
        }
        attrs
    }

    /// Whether NLRI for the family carries RFC 7911 path identifiers
    #[must_use]
    pub fn has_add_path(&self, afi: Afi, safi: Safi) -> bool {
        self.add_path.contains_key(&(afi, safi))
    }
}

/// Width of the AS numbers in AS_PATH, settled by the four-octet-AS
/// capability exchange (RFC 6793)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AsSize {
    #[default]
    Two,
    Four,
}

impl AsSize {
    /// Wire width of one AS number in bytes
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

/// BGP open message
#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: OptionalParameters,
}

impl Component for Open {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            10,
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                src.clone(),
                "not enough data to decode the OPEN fixed fields",
            )
        );
        let version = src.get_u8();
        if version != BGP_VERSION {
            // The data field carries the highest version we do support
            return Err(MessageError::open(
                OpenMessageErrorSubcode::UnsupportedVersionNumber,
                Bytes::copy_from_slice(&u16::from(BGP_VERSION).to_be_bytes()),
                "unsupported BGP version",
            ));
        }
        let asn = src.get_u16();
        if asn == 0 {
            return Err(MessageError::open(
                OpenMessageErrorSubcode::BadPeerAs,
                Bytes::copy_from_slice(&asn.to_be_bytes()),
                "peer AS 0 is invalid",
            ));
        }
        let hold_time = src.get_u16();
        if hold_time == 1 || hold_time == 2 {
            return Err(MessageError::open(
                OpenMessageErrorSubcode::UnacceptableHoldTime,
                Bytes::copy_from_slice(&hold_time.to_be_bytes()),
                "hold time below three seconds",
            ));
        }
        let bgp_id = Ipv4Addr::from(src.get_u32());
        if bgp_id.is_unspecified() || bgp_id.is_broadcast() {
            return Err(MessageError::open(
                OpenMessageErrorSubcode::BadBgpIdentifier,
                Bytes::copy_from_slice(&bgp_id.octets()),
                "BGP identifier is not a valid host address",
            ));
        }
        let opt_params = OptionalParameters::from_bytes(src)?;
        Ok(Self {
            version,
            asn,
            hold_time,
            bgp_id,
            opt_params,
        })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        len += self.version.to_bytes(dst);
        len += self.asn.to_bytes(dst);
        len += self.hold_time.to_bytes(dst);
        len += self.bgp_id.to_bytes(dst);
        len += self.opt_params.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        1 + 2 + 2 + 4 + self.opt_params.encoded_len()
    }
}

impl Open {
    /// Create a new BGP open message.
    ///
    /// An ASN beyond the two-octet range is collapsed to [`AS_TRANS`] on
    /// the wire field; the true value always travels in a four-octet-AS
    /// capability, which is appended if the caller did not provide one.
    #[must_use]
    pub fn new(asn: u32, hold_time: u16, bgp_id: Ipv4Addr, capabilities: Capabilities) -> Self {
        let mut capabilities = capabilities;
        let oldbgp_asn = u16::try_from(asn).unwrap_or(AS_TRANS);
        if asn > u32::from(u16::MAX) && capabilities.four_octet_asn().is_none() {
            capabilities
                .0
                .push(capability::Value::FourOctetAsNumber(asn.into()));
        }
        Self {
            version: BGP_VERSION,
            asn: oldbgp_asn,
            hold_time,
            bgp_id,
            opt_params: vec![capability::OptionalParameterValue::Capabilities(
                capabilities,
            )]
            .into(),
        }
    }
}

/// BGP update message
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub withdrawn_routes: Routes,
    pub path_attributes: PathAttributes,
    pub nlri: Routes,
}

impl PeerComponent for Update {
    fn from_bytes(src: &mut Bytes, peer: &PeerAttrs) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            2,
            MessageError::update(
                UpdateMessageErrorSubcode::MalformedAttributeList,
                src.clone(),
                "not enough data to decode the withdrawn routes length",
            )
        );
        let withdrawn_len = usize::from(src.get_u16());
        if withdrawn_len + 2 > src.remaining() {
            return Err(MessageError::update(
                UpdateMessageErrorSubcode::MalformedAttributeList,
                Bytes::new(),
                "withdrawn routes length overruns the message",
            ));
        }
        let extended = peer.has_add_path(Afi::Ipv4, Safi::Unicast);
        let mut wdr_buf = src.split_to(withdrawn_len);
        let withdrawn_routes = Routes::from_bytes(&mut wdr_buf, extended, 32)?;
        let tpa_len = usize::from(src.get_u16());
        if tpa_len > src.remaining() {
            return Err(MessageError::update(
                UpdateMessageErrorSubcode::MalformedAttributeList,
                Bytes::new(),
                "total path attribute length overruns the message",
            ));
        }
        let mut tpa_buf = src.split_to(tpa_len);
        let path_attributes = PathAttributes::from_bytes(&mut tpa_buf, peer)?;
        let nlri = Routes::from_bytes(src, extended, 32)?;
        let update = Self {
            withdrawn_routes,
            path_attributes,
            nlri,
        };
        update.validate()?;
        Ok(update)
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        let wdr_len_pos = dst.len();
        len += 0u16.to_bytes(dst); // Placeholder for withdrawn routes length
        let wdr_len = self.withdrawn_routes.to_bytes(dst);
        len += wdr_len;
        dst[wdr_len_pos..wdr_len_pos + 2].copy_from_slice(
            &(u16::try_from(wdr_len)
                .expect("Withdrawn routes length overflow")
                .to_be_bytes()),
        );
        let tpa_len_pos = dst.len();
        len += 0u16.to_bytes(dst); // Placeholder for total path attributes length
        let tpa_len = self.path_attributes.to_bytes(dst);
        len += tpa_len;
        dst[tpa_len_pos..tpa_len_pos + 2].copy_from_slice(
            &(u16::try_from(tpa_len)
                .expect("Total path attributes length overflow")
                .to_be_bytes()),
        );
        len += self.nlri.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + self.withdrawn_routes.encoded_len()
            + 2
            + self.path_attributes.encoded_len()
            + self.nlri.encoded_len()
    }
}

impl Update {
    /// Cross-attribute checks that only make sense once the whole list is
    /// decoded (RFC 4271 Section 6.3)
    fn validate(&self) -> Result<(), MessageError> {
        let mut seen = [false; 256];
        for attr in self.path_attributes.iter() {
            let code = attr.type_code();
            if seen[usize::from(code)] {
                return Err(MessageError::update(
                    UpdateMessageErrorSubcode::MalformedAttributeList,
                    Bytes::copy_from_slice(&[code]),
                    "attribute type appears twice in the UPDATE",
                ));
            }
            seen[usize::from(code)] = true;
        }
        if !self.nlri.is_empty() {
            for required in [path::Type::Origin, path::Type::AsPath, path::Type::NextHop] {
                if !seen[required as usize] {
                    return Err(MessageError::update(
                        UpdateMessageErrorSubcode::MissingWellKnownAttribute,
                        Bytes::copy_from_slice(&[required as u8]),
                        "missing well-known mandatory attribute",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fold a received AS4_PATH into AS_PATH and leave the path in the
    /// canonical four-octet representation (RFC 6793). Idempotent; see
    /// [`path::PathAttributes::normalize_as_path`].
    pub fn normalize_as_path(&mut self) {
        self.path_attributes.normalize_as_path();
    }
}

/// BGP notification message
///
/// The error code and subcode are kept as raw octets: RFC 4271 gives the
/// receiver no way to report an error in a NOTIFICATION, so whatever the
/// peer sent is preserved and round-trips. Use [`Notification::code`] for
/// the typed view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub error_code: u8,
    pub error_subcode: u8,
    pub data: Bytes,
}

impl Component for Notification {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            2,
            MessageError::header(
                MessageHeaderErrorSubcode::BadMessageLength,
                src.clone(),
                "truncated NOTIFICATION body",
            )
        );
        let error_code = src.get_u8();
        let error_subcode = src.get_u8();
        let data = src.copy_to_bytes(src.remaining());
        if NotificationErrorCode::from_u8(error_code).is_none() {
            log::warn!("NOTIFICATION with undefined error code {error_code}");
        }
        Ok(Self {
            error_code,
            error_subcode,
            data,
        })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        self.error_code.to_bytes(dst);
        self.error_subcode.to_bytes(dst);
        dst.put_slice(&self.data);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl Notification {
    /// Create a new BGP notification message
    #[must_use]
    pub const fn new(code: NotificationErrorCode, subcode: u8, data: Bytes) -> Self {
        Self {
            error_code: code as u8,
            error_subcode: subcode,
            data,
        }
    }

    /// The typed error code, if the peer sent a defined one
    #[must_use]
    pub fn code(&self) -> Option<NotificationErrorCode> {
        NotificationErrorCode::from_u8(self.error_code)
    }
}

impl From<&MessageError> for Notification {
    /// Build the NOTIFICATION that reports a decode error, echoing the
    /// offending bytes
    fn from(err: &MessageError) -> Self {
        Self {
            error_code: err.code as u8,
            error_subcode: err.subcode,
            data: err.data.clone(),
        }
    }
}

/// Notification error codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum NotificationErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

/// Notification error subcodes for `MessageHeaderError`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageHeaderErrorSubcode {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

/// Notification error subcodes for `OpenMessageError`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum OpenMessageErrorSubcode {
    Unspecific = 0,
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
    UnsupportedCapability = 7,
}

/// Notification error subcodes for `UpdateMessageError`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum UpdateMessageErrorSubcode {
    MalformedAttributeList = 1,
    UnrecognizedWellKnownAttribute = 2,
    MissingWellKnownAttribute = 3,
    AttributeFlagsError = 4,
    AttributeLengthError = 5,
    InvalidOriginAttribute = 6,
    AsRoutingLoop = 7,
    InvalidNextHopAttribute = 8,
    OptionalAttributeError = 9,
    InvalidNetworkField = 10,
    MalformedAsPath = 11,
}

/// Notification error subcodes for Cease, constructed by the state
/// machine rather than this codec
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum CeaseSubcode {
    MaximumNumberOfPrefixesReached = 1,
    AdministrativeShutdown = 2,
    PeerDeconfigured = 3,
    AdministrativeReset = 4,
    ConnectionRejected = 5,
    OtherConfigurationChange = 6,
    ConnectionCollisionResolution = 7,
    OutOfResources = 8,
}

#[cfg(test)]
const fn convert_one_hex_digit(c: u8) -> u8 {
    if c.is_ascii_digit() {
        c - b'0'
    } else if c.is_ascii_lowercase() {
        c - b'a' + 10
    } else if c.is_ascii_uppercase() {
        c - b'A' + 10
    } else {
        panic!("invalid hex character");
    }
}

#[cfg(test)]
#[must_use]
pub fn hex_to_bytes(hex: &str) -> Bytes {
    // Skip these characters on octet boundary
    const SKIP: &[u8] = b" \t\n\r:.";
    let hex = hex.as_bytes();
    let mut octets = BytesMut::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i < hex.len() {
        let c = hex[i];
        if SKIP.contains(&c) {
            i += 1;
            continue;
        }
        let hi = convert_one_hex_digit(c) << 4;
        assert!(i + 1 < hex.len(), "odd number of hex digits");
        let lo = convert_one_hex_digit(hex[i + 1]);
        octets.put_u8(hi | lo);
        i += 2;
    }
    octets.freeze()
}
