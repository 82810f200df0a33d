//! BGP path attributes (RFC 4271 Section 4.3)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::capability::{Afi, Safi};
use crate::endec::{ensure_remaining, Component, PeerComponent};
use crate::route::Routes;
use crate::{AsSize, MessageError, PeerAttrs, UpdateMessageErrorSubcode, AS_TRANS};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Deref;

/// BGP path attributes
#[derive(Clone, Debug, Default, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct PathAttributes(pub Vec<Value>);

impl PeerComponent for PathAttributes {
    fn from_bytes(src: &mut Bytes, peer: &PeerAttrs) -> Result<Self, MessageError> {
        let mut attributes = Vec::new();
        while src.has_remaining() {
            attributes.push(Value::from_bytes(src, peer)?);
        }
        Ok(Self(attributes))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for attribute in self.0 {
            len += attribute.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Value::encoded_len).sum()
    }
}

impl Deref for PathAttributes {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PathAttributes {
    /// Fold a received AS4_PATH into AS_PATH (RFC 6793 Section 4.2.3) and
    /// leave AS_PATH in the canonical four-octet representation.
    ///
    /// The AS4_PATH attribute is removed from the list. Idempotent.
    pub fn normalize_as_path(&mut self) {
        let as4_path = self
            .0
            .iter()
            .position(|v| matches!(v.data, Data::As4Path(_)))
            .map(|i| self.0.remove(i));
        let Some(path) = self.0.iter_mut().find_map(|v| {
            if let Data::AsPath(path) = &mut v.data {
                Some(path)
            } else {
                None
            }
        }) else {
            return;
        };
        path.widen();
        if let Some(Value {
            data: Data::As4Path(as4),
            ..
        }) = as4_path
        {
            let n4 = as4.num_ases();
            let n2 = path.num_ases();
            if n4 <= n2 {
                let mut merged = path.leading_ases(n2 - n4);
                merged.extend(as4.0.into_iter().map(AsSegment::As4));
                path.0 = merged;
            } else {
                // RFC 6793: an AS4_PATH longer than AS_PATH is ignored
                log::debug!("ignoring AS4_PATH with {n4} ASes against AS_PATH with {n2}");
            }
        }
    }
}

/// BGP path attribute
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub flags: Flags,
    pub data: Data,
}

impl Value {
    /// The attribute's wire type code
    #[must_use]
    pub fn type_code(&self) -> u8 {
        u8::from(&self.data)
    }
}

impl PeerComponent for Value {
    fn from_bytes(src: &mut Bytes, peer: &PeerAttrs) -> Result<Self, MessageError> {
        let whole = src.clone();
        ensure_remaining!(
            src,
            3,
            MessageError::update(
                UpdateMessageErrorSubcode::MalformedAttributeList,
                whole,
                "not enough data to decode the attribute envelope",
            )
        );
        let flags = Flags(src.get_u8());
        let type_ = src.get_u8();
        let (len, envelope_len) = if flags.is_extended_length() {
            ensure_remaining!(
                src,
                2,
                MessageError::update(
                    UpdateMessageErrorSubcode::MalformedAttributeList,
                    whole,
                    "not enough data to decode the extended attribute length",
                )
            );
            (src.get_u16() as usize, 4)
        } else {
            (usize::from(src.get_u8()), 3)
        };
        // The bytes echoed back in a NOTIFICATION must cover the whole
        // attribute, envelope included
        let attr_bytes = whole.slice(..(envelope_len + len).min(whole.len()));
        ensure_remaining!(
            src,
            len,
            MessageError::update(
                UpdateMessageErrorSubcode::MalformedAttributeList,
                attr_bytes,
                "attribute length overruns the attribute list",
            )
        );
        let code = Type::from_u8(type_);
        if let Some(code) = code {
            let (required, mask) = code.flag_pattern();
            if (flags.0 ^ required) & mask != 0 {
                return Err(MessageError::update(
                    UpdateMessageErrorSubcode::AttributeFlagsError,
                    attr_bytes,
                    "attribute flags do not match the mandatory pattern",
                ));
            }
            if let Some(fixed) = code.fixed_len() {
                if len != fixed {
                    return Err(MessageError::update(
                        UpdateMessageErrorSubcode::AttributeLengthError,
                        attr_bytes,
                        "attribute length does not match its fixed size",
                    ));
                }
            }
        } else if !flags.is_optional() {
            return Err(MessageError::update(
                UpdateMessageErrorSubcode::UnrecognizedWellKnownAttribute,
                attr_bytes,
                "unrecognized attribute without the optional bit",
            ));
        }
        let mut body = src.split_to(len);
        let data = match code {
            Some(Type::Origin) => Data::Origin(
                Origin::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::AsPath) => Data::AsPath(
                AsPath::from_bytes(&mut body, peer.as_size)
                    .map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::NextHop) => {
                let addr = Ipv4Addr::from_bytes(&mut body)?;
                if addr.is_unspecified() || addr.is_broadcast() || addr.is_multicast() {
                    return Err(MessageError::update(
                        UpdateMessageErrorSubcode::InvalidNextHopAttribute,
                        attr_bytes,
                        "NEXT_HOP is not a valid unicast address",
                    ));
                }
                Data::NextHop(addr)
            }
            Some(Type::MultiExitDisc) => Data::MultiExitDisc(body.get_u32()),
            Some(Type::LocalPref) => Data::LocalPref(body.get_u32()),
            Some(Type::AtomicAggregate) => Data::AtomicAggregate,
            Some(Type::Aggregator) => Data::Aggregator(
                Aggregator::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::OriginatorId) => Data::OriginatorId(Ipv4Addr::from_bytes(&mut body)?),
            Some(Type::ClusterList) => Data::ClusterList(
                ClusterList::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::MpReachNlri) => Data::MpReachNlri(
                MpReachNlri::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::MpUnreachNlri) => Data::MpUnreachNlri(
                MpUnreachNlri::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::As4Path) => Data::As4Path(
                As4Path::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            Some(Type::As4Aggregator) => Data::As4Aggregator(
                As4Aggregator::from_bytes(&mut body).map_err(|e| e.or_data(attr_bytes.clone()))?,
            ),
            None => Data::Unsupported(type_, body),
        };
        Ok(Self { flags, data })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        let type_code = self.type_code();
        dst.put_u8(self.flags.0); // Flags
        len += 1;
        dst.put_u8(type_code); // Type
        len += 1;
        let len_pos = dst.len();
        let two_byte_len = if self.flags.is_extended_length() {
            dst.put_u16(0); // Placeholder for the length
            len += 2;
            true
        } else {
            dst.put_u8(0); // Placeholder for the length
            len += 1;
            false
        };
        let data_len = match self.data {
            Data::Origin(origin) => origin.to_bytes(dst),
            Data::AsPath(as_path) => as_path.to_bytes(dst),
            Data::NextHop(next_hop) => next_hop.to_bytes(dst),
            Data::MultiExitDisc(med) => med.to_bytes(dst),
            Data::LocalPref(local_pref) => local_pref.to_bytes(dst),
            Data::AtomicAggregate => 0,
            Data::Aggregator(agg) => agg.to_bytes(dst),
            Data::OriginatorId(id) => id.to_bytes(dst),
            Data::ClusterList(cl) => cl.to_bytes(dst),
            Data::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.to_bytes(dst),
            Data::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.to_bytes(dst),
            Data::As4Path(as4_path) => as4_path.to_bytes(dst),
            Data::As4Aggregator(agg) => agg.to_bytes(dst),
            Data::Unsupported(_, data) => {
                let len = data.len();
                dst.put_slice(&data);
                len
            }
        };
        if two_byte_len {
            dst[len_pos..len_pos + 2].copy_from_slice(
                &(u16::try_from(data_len)
                    .expect("Path attribute length overflow")
                    .to_be_bytes()),
            );
        } else {
            dst[len_pos] = u8::try_from(data_len).expect("Path attribute length overflow");
        }
        len + data_len
    }

    fn encoded_len(&self) -> usize {
        1 + 1
            + if self.flags.is_extended_length() {
                2
            } else {
                1
            }
            + match &self.data {
                Data::Origin(origin) => origin.encoded_len(),
                Data::AsPath(as_path) => as_path.encoded_len(),
                Data::NextHop(next_hop) => next_hop.encoded_len(),
                Data::MultiExitDisc(_) | Data::LocalPref(_) | Data::OriginatorId(_) => 4,
                Data::AtomicAggregate => 0,
                Data::Aggregator(agg) => agg.encoded_len(),
                Data::ClusterList(cl) => cl.encoded_len(),
                Data::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.encoded_len(),
                Data::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.encoded_len(),
                Data::As4Path(as4_path) => as4_path.encoded_len(),
                Data::As4Aggregator(agg) => agg.encoded_len(),
                Data::Unsupported(_, data) => data.len(),
            }
    }
}

/// BGP path attribute flags
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    /// Transitive, well-known, complete
    pub const WELL_KNOWN_COMPLETE: Flags = Flags(0b0100_0000);
    /// Optional, transitive, complete
    pub const OPTIONAL_TRANSITIVE: Flags = Flags(0b1100_0000);
    /// Optional, non-transitive, extended length
    pub const OPTIONAL_EXTENDED: Flags = Flags(0b1001_0000);

    /// Check if the attribute is optional
    pub const fn is_optional(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Check if the attribute is transitive
    pub const fn is_transitive(self) -> bool {
        self.0 & 0x40 != 0
    }

    /// Check if the attribute is partial
    pub const fn is_partial(self) -> bool {
        self.0 & 0x20 != 0
    }

    /// Check if the attribute is extended length
    pub const fn is_extended_length(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// BGP path attribute data
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Origin(Origin),
    AsPath(AsPath),
    /// BGP next hop (RFC 4271 Section 5.1.3)
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    OriginatorId(Ipv4Addr),     // RFC 4456
    ClusterList(ClusterList),   // RFC 4456
    MpReachNlri(MpReachNlri),   // RFC 4760
    MpUnreachNlri(MpUnreachNlri), // RFC 4760
    As4Path(As4Path),           // RFC 6793
    As4Aggregator(As4Aggregator), // RFC 6793
    /// Unrecognized optional attribute, preserved verbatim so that a
    /// transitive one can be forwarded on re-encode
    Unsupported(u8, Bytes),
}

// It does not make sense to implement Component for Data because its length
// is given by the Flags

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
    OriginatorId = 9,
    ClusterList = 10,
    MpReachNlri = 14,
    MpUnreachNlri = 15,
    As4Path = 17,
    As4Aggregator = 18,
}

impl Type {
    /// Mandatory flag pattern for the attribute: (required bits, mask).
    ///
    /// The extended-length bit never participates; the partial bit is only
    /// free for optional transitive attributes.
    const fn flag_pattern(self) -> (u8, u8) {
        match self {
            Self::Origin
            | Self::AsPath
            | Self::NextHop
            | Self::LocalPref
            | Self::AtomicAggregate => (0x40, 0xE0),
            Self::MultiExitDisc
            | Self::OriginatorId
            | Self::ClusterList
            | Self::MpReachNlri
            | Self::MpUnreachNlri => (0x80, 0xE0),
            Self::Aggregator | Self::As4Path | Self::As4Aggregator => (0xC0, 0xC0),
        }
    }

    /// Fixed wire length of the attribute value, if it has one
    const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Origin => Some(1),
            Self::NextHop | Self::MultiExitDisc | Self::LocalPref | Self::OriginatorId => Some(4),
            Self::AtomicAggregate => Some(0),
            Self::Aggregator => Some(6),
            Self::As4Aggregator => Some(8),
            _ => None,
        }
    }
}

impl From<&Data> for u8 {
    fn from(data: &Data) -> u8 {
        match data {
            Data::Origin(_) => Type::Origin as u8,
            Data::AsPath(_) => Type::AsPath as u8,
            Data::NextHop(_) => Type::NextHop as u8,
            Data::MultiExitDisc(_) => Type::MultiExitDisc as u8,
            Data::LocalPref(_) => Type::LocalPref as u8,
            Data::AtomicAggregate => Type::AtomicAggregate as u8,
            Data::Aggregator(_) => Type::Aggregator as u8,
            Data::OriginatorId(_) => Type::OriginatorId as u8,
            Data::ClusterList(_) => Type::ClusterList as u8,
            Data::MpReachNlri(_) => Type::MpReachNlri as u8,
            Data::MpUnreachNlri(_) => Type::MpUnreachNlri as u8,
            Data::As4Path(_) => Type::As4Path as u8,
            Data::As4Aggregator(_) => Type::As4Aggregator as u8,
            Data::Unsupported(type_, _) => *type_,
        }
    }
}

/// BGP origin
#[derive(Copy, Clone, Debug, PartialEq, Primitive)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Component for Origin {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            1,
            MessageError::update(
                UpdateMessageErrorSubcode::InvalidOriginAttribute,
                Bytes::new(),
                "empty ORIGIN attribute",
            )
        );
        let value = src.get_u8();
        Self::from_u8(value).ok_or_else(|| {
            MessageError::update(
                UpdateMessageErrorSubcode::InvalidOriginAttribute,
                Bytes::new(),
                "undefined ORIGIN value",
            )
        })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u8(self as u8);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

/// BGP AS path segment type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum AsSegmentType {
    Set = 1,
    Sequence = 2,
}

/// AS path segment with two-octet members (pre-RFC 6793 peers)
#[derive(Clone, Debug, PartialEq)]
pub struct As2Segment {
    pub type_: AsSegmentType,
    pub asns: Vec<u16>,
}

/// AS path segment with four-octet members (RFC 6793)
#[derive(Clone, Debug, PartialEq)]
pub struct As4Segment {
    pub type_: AsSegmentType,
    pub asns: Vec<u32>,
}

impl As2Segment {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let (type_, count) = segment_header(src)?;
        ensure_remaining!(
            src,
            count * 2,
            MessageError::update(
                UpdateMessageErrorSubcode::MalformedAsPath,
                src.clone(),
                "AS path segment overruns the attribute",
            )
        );
        let mut asns = Vec::with_capacity(count);
        for _ in 0..count {
            asns.push(src.get_u16());
        }
        Ok(Self { type_, asns })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let encoded_len = 2 + self.asns.len() * 2;
        dst.put_u8(self.type_ as u8);
        dst.put_u8(u8::try_from(self.asns.len()).expect("AS segment length overflow"));
        for asn in self.asns {
            dst.put_u16(asn);
        }
        encoded_len
    }

    /// Widen to the four-octet representation (always lossless)
    #[must_use]
    pub fn to_four_octet(&self) -> As4Segment {
        As4Segment {
            type_: self.type_,
            asns: self.asns.iter().map(|&asn| u32::from(asn)).collect(),
        }
    }
}

impl As4Segment {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let (type_, count) = segment_header(src)?;
        ensure_remaining!(
            src,
            count * 4,
            MessageError::update(
                UpdateMessageErrorSubcode::MalformedAsPath,
                src.clone(),
                "AS path segment overruns the attribute",
            )
        );
        let mut asns = Vec::with_capacity(count);
        for _ in 0..count {
            asns.push(src.get_u32());
        }
        Ok(Self { type_, asns })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let encoded_len = 2 + self.asns.len() * 4;
        dst.put_u8(self.type_ as u8);
        dst.put_u8(u8::try_from(self.asns.len()).expect("AS segment length overflow"));
        for asn in self.asns {
            dst.put_u32(asn);
        }
        encoded_len
    }

    /// Narrow to the two-octet representation, substituting AS_TRANS for
    /// members that do not fit. The second value reports whether the
    /// mapping was lossless; a lossy result means the caller must also emit
    /// an AS4_PATH.
    #[must_use]
    pub fn to_two_octet(&self) -> (As2Segment, bool) {
        let mut lossless = true;
        let asns = self
            .asns
            .iter()
            .map(|&asn| {
                u16::try_from(asn).unwrap_or_else(|_| {
                    lossless = false;
                    AS_TRANS
                })
            })
            .collect();
        (
            As2Segment {
                type_: self.type_,
                asns,
            },
            lossless,
        )
    }
}

fn segment_header(src: &mut Bytes) -> Result<(AsSegmentType, usize), MessageError> {
    ensure_remaining!(
        src,
        2,
        MessageError::update(
            UpdateMessageErrorSubcode::MalformedAsPath,
            src.clone(),
            "not enough data to decode the AS path segment header",
        )
    );
    let type_octet = src.get_u8();
    let type_ = AsSegmentType::from_u8(type_octet).ok_or_else(|| {
        MessageError::update(
            UpdateMessageErrorSubcode::MalformedAsPath,
            Bytes::copy_from_slice(&[type_octet]),
            "undefined AS path segment type",
        )
    })?;
    Ok((type_, usize::from(src.get_u8())))
}

/// BGP AS path segment (RFC 4271 Section 5.1.2, RFC 6793 Section 4)
///
/// A segment is either two- or four-octet framed; which one arrives on the
/// wire depends on the AS size the peer negotiated, and which one is sent
/// depends on how the segment was built.
#[derive(Clone, Debug, PartialEq)]
pub enum AsSegment {
    As2(As2Segment),
    As4(As4Segment),
}

impl AsSegment {
    pub(crate) fn from_bytes(src: &mut Bytes, as_size: AsSize) -> Result<Self, MessageError> {
        match as_size {
            AsSize::Two => As2Segment::from_bytes(src).map(Self::As2),
            AsSize::Four => As4Segment::from_bytes(src).map(Self::As4),
        }
    }

    pub(crate) fn to_bytes(self, dst: &mut BytesMut) -> usize {
        match self {
            Self::As2(seg) => seg.to_bytes(dst),
            Self::As4(seg) => seg.to_bytes(dst),
        }
    }

    pub(crate) fn encoded_len(&self) -> usize {
        2 + self.len()
            * match self {
                Self::As2(_) => 2,
                Self::As4(_) => 4,
            }
    }

    #[must_use]
    pub fn segment_type(&self) -> AsSegmentType {
        match self {
            Self::As2(seg) => seg.type_,
            Self::As4(seg) => seg.type_,
        }
    }

    /// Number of AS members in the segment
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::As2(seg) => seg.asns.len(),
            Self::As4(seg) => seg.asns.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The quantity consumed by best-path selection: a set counts as one
    /// hop regardless of its size
    #[must_use]
    pub fn num_ases(&self) -> usize {
        match self.segment_type() {
            AsSegmentType::Set => 1,
            AsSegmentType::Sequence => self.len(),
        }
    }

    /// Prepend an AS. Returns false if the segment is full (255 members)
    /// so the caller can start a new segment instead.
    pub fn prepend(&mut self, asn: u32) -> bool {
        if self.len() >= 255 {
            return false;
        }
        match self {
            Self::As2(seg) => seg.asns.insert(0, u16::try_from(asn).unwrap_or(AS_TRANS)),
            Self::As4(seg) => seg.asns.insert(0, asn),
        }
        true
    }

    /// Append an AS. Returns false if the segment is full (255 members)
    /// so the caller can start a new segment instead.
    pub fn append(&mut self, asn: u32) -> bool {
        if self.len() >= 255 {
            return false;
        }
        match self {
            Self::As2(seg) => seg.asns.push(u16::try_from(asn).unwrap_or(AS_TRANS)),
            Self::As4(seg) => seg.asns.push(asn),
        }
        true
    }
}

/// BGP AS path
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsPath(pub Vec<AsSegment>);

impl AsPath {
    pub(crate) fn from_bytes(src: &mut Bytes, as_size: AsSize) -> Result<Self, MessageError> {
        let mut segments = Vec::new();
        while src.has_remaining() {
            segments.push(AsSegment::from_bytes(src, as_size)?);
        }
        Ok(Self(segments))
    }

    pub(crate) fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for segment in self.0 {
            len += segment.to_bytes(dst);
        }
        len
    }

    pub(crate) fn encoded_len(&self) -> usize {
        self.0.iter().map(AsSegment::encoded_len).sum()
    }

    /// Total AS count as seen by best-path selection
    #[must_use]
    pub fn num_ases(&self) -> usize {
        self.0.iter().map(AsSegment::num_ases).sum()
    }

    /// Prepend an AS, starting a new sequence segment when the head
    /// segment is a set or already full
    pub fn prepend(&mut self, asn: u32) {
        if let Some(head) = self.0.first_mut() {
            if head.segment_type() == AsSegmentType::Sequence && head.prepend(asn) {
                return;
            }
        }
        let segment = match self.0.first() {
            Some(AsSegment::As2(_)) => AsSegment::As2(As2Segment {
                type_: AsSegmentType::Sequence,
                asns: vec![u16::try_from(asn).unwrap_or(AS_TRANS)],
            }),
            _ => AsSegment::As4(As4Segment {
                type_: AsSegmentType::Sequence,
                asns: vec![asn],
            }),
        };
        self.0.insert(0, segment);
    }

    /// Convert every segment to the two-octet framing for a pre-RFC 6793
    /// peer. The second value reports whether the conversion was lossless;
    /// when it is not, the caller must emit an AS4_PATH alongside.
    #[must_use]
    pub fn to_two_octet(&self) -> (AsPath, bool) {
        let mut lossless = true;
        let segments = self
            .0
            .iter()
            .map(|seg| match seg {
                AsSegment::As2(seg) => AsSegment::As2(seg.clone()),
                AsSegment::As4(seg) => {
                    let (narrowed, seg_lossless) = seg.to_two_octet();
                    lossless &= seg_lossless;
                    AsSegment::As2(narrowed)
                }
            })
            .collect();
        (AsPath(segments), lossless)
    }

    /// Rewrite every segment in the four-octet framing
    pub(crate) fn widen(&mut self) {
        for segment in &mut self.0 {
            if let AsSegment::As2(seg) = segment {
                *segment = AsSegment::As4(seg.to_four_octet());
            }
        }
    }

    /// The leading `count` ASes of the path, preserving segment structure.
    /// A set counts as one AS and is never split.
    fn leading_ases(&self, mut count: usize) -> Vec<AsSegment> {
        let mut out = Vec::new();
        for segment in &self.0 {
            if count == 0 {
                break;
            }
            match segment.segment_type() {
                AsSegmentType::Set => {
                    out.push(segment.clone());
                    count -= 1;
                }
                AsSegmentType::Sequence => {
                    if segment.num_ases() <= count {
                        count -= segment.num_ases();
                        out.push(segment.clone());
                    } else {
                        let truncated = match segment {
                            AsSegment::As2(seg) => AsSegment::As2(As2Segment {
                                type_: AsSegmentType::Sequence,
                                asns: seg.asns[..count].to_vec(),
                            }),
                            AsSegment::As4(seg) => AsSegment::As4(As4Segment {
                                type_: AsSegmentType::Sequence,
                                asns: seg.asns[..count].to_vec(),
                            }),
                        };
                        out.push(truncated);
                        count = 0;
                    }
                }
            }
        }
        out
    }
}

impl Deref for AsPath {
    type Target = Vec<AsSegment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP AS4 path: always four-octet framed regardless of the negotiated AS
/// size (RFC 6793 Section 3)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct As4Path(pub Vec<As4Segment>);

impl Component for As4Path {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let mut segments = Vec::new();
        while src.has_remaining() {
            segments.push(As4Segment::from_bytes(src)?);
        }
        Ok(Self(segments))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for segment in self.0 {
            len += segment.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(|seg| 2 + seg.asns.len() * 4).sum()
    }
}

impl As4Path {
    /// Total AS count as seen by best-path selection
    #[must_use]
    pub fn num_ases(&self) -> usize {
        self.0
            .iter()
            .map(|seg| match seg.type_ {
                AsSegmentType::Set => 1,
                AsSegmentType::Sequence => seg.asns.len(),
            })
            .sum()
    }
}

impl Deref for As4Path {
    type Target = Vec<As4Segment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP aggregator (RFC 4271 Section 5.1.7)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aggregator {
    pub asn: u16,
    pub ip: Ipv4Addr,
}

impl Component for Aggregator {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            6,
            MessageError::update(
                UpdateMessageErrorSubcode::AttributeLengthError,
                Bytes::new(),
                "AGGREGATOR is shorter than 6 bytes",
            )
        );
        let asn = src.get_u16();
        let ip = Ipv4Addr::from_bytes(src)?;
        Ok(Self { asn, ip })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u16(self.asn);
        self.ip.to_bytes(dst) + 2 // 2 bytes for ASN
    }

    fn encoded_len(&self) -> usize {
        4 + 2
    }
}

/// BGP aggregator with a four-octet AS (RFC 6793 Section 3)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct As4Aggregator {
    pub asn: u32,
    pub ip: Ipv4Addr,
}

impl Component for As4Aggregator {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            8,
            MessageError::update(
                UpdateMessageErrorSubcode::AttributeLengthError,
                Bytes::new(),
                "AS4_AGGREGATOR is shorter than 8 bytes",
            )
        );
        let asn = src.get_u32();
        let ip = Ipv4Addr::from_bytes(src)?;
        Ok(Self { asn, ip })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u32(self.asn);
        self.ip.to_bytes(dst) + 4 // 4 bytes for ASN
    }

    fn encoded_len(&self) -> usize {
        4 + 4
    }
}

/// BGP route reflection cluster list (RFC 4456 Section 8)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterList(pub Vec<u32>);

impl Component for ClusterList {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        if src.remaining() % 4 != 0 {
            return Err(MessageError::update(
                UpdateMessageErrorSubcode::AttributeLengthError,
                Bytes::new(),
                "CLUSTER_LIST length is not a multiple of 4",
            ));
        }
        let mut ids = Vec::with_capacity(src.remaining() / 4);
        while src.has_remaining() {
            ids.push(src.get_u32());
        }
        Ok(Self(ids))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let len = self.encoded_len();
        for id in self.0 {
            dst.put_u32(id);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.len() * 4
    }
}

impl ClusterList {
    /// Prepend the local cluster ID when reflecting a route
    pub fn prepend(&mut self, id: u32) {
        self.0.insert(0, id);
    }
}

impl Deref for ClusterList {
    type Target = Vec<u32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP MP_REACH_NLRI (RFC 4760 Section 3)
#[derive(Clone, Debug, PartialEq)]
pub struct MpReachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub next_hop: MpNextHop,
    pub nlri: Routes,
}

impl Component for MpReachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            5,
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "truncated MP_REACH_NLRI header",
            )
        );
        let afi = src.get_u16();
        let afi = Afi::from_u16(afi).ok_or_else(|| {
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "unrecognized MP_REACH_NLRI AFI",
            )
        })?;
        let safi = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi)).ok_or_else(|| {
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "unrecognized MP_REACH_NLRI SAFI",
            )
        })?;
        let nh_len = usize::from(src.get_u8());
        ensure_remaining!(
            src,
            nh_len + 1,
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "MP_REACH_NLRI next hop overruns the attribute",
            )
        );
        let mut nh_src = src.split_to(nh_len);
        let next_hop = MpNextHop::from_bytes(&mut nh_src)?;
        let _ = src.get_u8(); // Reserved
        let nlri = Routes::from_bytes(src, false, family_max_bits(afi))?;
        Ok(Self {
            afi,
            safi,
            next_hop,
            nlri,
        })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        dst.put_u16(self.afi as u16);
        len += 2;
        dst.put_u8(self.safi as u16 as u8);
        len += 1;
        dst.put_u8(
            u8::try_from(self.next_hop.encoded_len())
                .expect("MP_REACH_NLRI next hop length overflow"),
        );
        len += 1;
        len += self.next_hop.to_bytes(dst);
        dst.put_u8(0); // Reserved
        len += 1;
        len += self.nlri.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + 1 + 1 + self.next_hop.encoded_len() + 1 + self.nlri.encoded_len()
    }
}

const fn family_max_bits(afi: Afi) -> u8 {
    match afi {
        Afi::Ipv4 => 32,
        Afi::Ipv6 => 128,
    }
}

/// Next hop for MP_REACH_NLRI
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MpNextHop {
    Single(IpAddr),
    V6AndLL(Ipv6Addr, Ipv6Addr),
}

impl Component for MpNextHop {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        match src.remaining() {
            4 | 16 => Ok(MpNextHop::Single(IpAddr::from_bytes(src)?)),
            32 => {
                let v6local = Ipv6Addr::from_bytes(src)?;
                let v6ll = Ipv6Addr::from_bytes(src)?;
                Ok(MpNextHop::V6AndLL(v6local, v6ll))
            }
            _ => Err(MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "MP_REACH_NLRI next hop is not 4, 16, or 32 bytes",
            )),
        }
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        match self {
            MpNextHop::Single(ip) => {
                ip.to_bytes(dst);
            }
            MpNextHop::V6AndLL(v6local, v6ll) => {
                v6local.to_bytes(dst);
                v6ll.to_bytes(dst);
            }
        };
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        match self {
            MpNextHop::Single(IpAddr::V4(_)) => 4,
            MpNextHop::Single(IpAddr::V6(_)) => 16,
            MpNextHop::V6AndLL(_, _) => 32,
        }
    }
}

impl From<IpAddr> for MpNextHop {
    fn from(ip: IpAddr) -> Self {
        MpNextHop::Single(ip)
    }
}

/// BGP MP_UNREACH_NLRI (RFC 4760 Section 4)
#[derive(Clone, Debug, PartialEq)]
pub struct MpUnreachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub withdrawn_routes: Routes,
}

impl Component for MpUnreachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            3,
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "truncated MP_UNREACH_NLRI header",
            )
        );
        let afi = src.get_u16();
        let afi = Afi::from_u16(afi).ok_or_else(|| {
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "unrecognized MP_UNREACH_NLRI AFI",
            )
        })?;
        let safi = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi)).ok_or_else(|| {
            MessageError::update(
                UpdateMessageErrorSubcode::OptionalAttributeError,
                Bytes::new(),
                "unrecognized MP_UNREACH_NLRI SAFI",
            )
        })?;
        let withdrawn_routes = Routes::from_bytes(src, false, family_max_bits(afi))?;
        Ok(Self {
            afi,
            safi,
            withdrawn_routes,
        })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        dst.put_u16(self.afi as u16);
        len += 2;
        dst.put_u8(self.safi as u16 as u8);
        len += 1;
        len += self.withdrawn_routes.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        3 + self.withdrawn_routes.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_to_bytes;
    use crate::route::{Nlri, Prefix};
    use crate::NotificationErrorCode;

    fn peer2() -> PeerAttrs {
        PeerAttrs::default()
    }

    fn peer4() -> PeerAttrs {
        PeerAttrs {
            as_size: AsSize::Four,
            ..PeerAttrs::default()
        }
    }

    #[test]
    fn test_origin() {
        let mut src = hex_to_bytes("40 01 01 00");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::Origin(Origin::Igp),
            }
        );
    }

    #[test]
    fn test_origin_undefined_value() {
        let mut src = hex_to_bytes("40 01 01 03");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(err.code, NotificationErrorCode::UpdateMessageError);
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::InvalidOriginAttribute as u8
        );
        assert_eq!(err.data, hex_to_bytes("40 01 01 03"));
    }

    #[test]
    fn test_origin_bad_length() {
        let mut src = hex_to_bytes("40 01 02 00 00");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::AttributeLengthError as u8
        );
        assert_eq!(err.data, hex_to_bytes("40 01 02 00 00"));
    }

    #[test]
    fn test_origin_bad_flags() {
        // ORIGIN with the optional bit set
        let mut src = hex_to_bytes("c0 01 01 00");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::AttributeFlagsError as u8
        );
        assert_eq!(err.data, hex_to_bytes("c0 01 01 00"));
    }

    #[test]
    fn test_as2_aspath() {
        let mut src = hex_to_bytes("40 02 04 0201 fd7d");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment::As2(As2Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![0xfd7d],
                })])),
            }
        );
    }

    #[test]
    fn test_as4_aspath() {
        let mut src = hex_to_bytes("40 02 0e 0203 fcde39d1 fcde3880 fcde3122");
        let pa = Value::from_bytes(&mut src, &peer4()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment::As4(As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![0xfcde_39d1, 0xfcde_3880, 0xfcde_3122],
                })])),
            }
        );
    }

    #[test]
    fn test_aspath_trailing_bytes() {
        // Segment claims 2 members but only carries one and a half
        let mut src = hex_to_bytes("40 02 05 0202 fd7d 00");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::MalformedAsPath as u8
        );
    }

    #[test]
    fn test_aspath_bad_segment_type() {
        let mut src = hex_to_bytes("40 02 04 0501 fd7d");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::MalformedAsPath as u8
        );
        assert_eq!(err.data, hex_to_bytes("40 02 04 0501 fd7d"));
    }

    #[test]
    fn test_next_hop() {
        let mut src = hex_to_bytes("40 03 04 7f000001");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x40),
                data: Data::NextHop(Ipv4Addr::new(127, 0, 0, 1)),
            }
        );
    }

    #[test]
    fn test_next_hop_invalid() {
        let mut src = hex_to_bytes("40 03 04 00000000");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::InvalidNextHopAttribute as u8
        );
        assert_eq!(err.data, hex_to_bytes("40 03 04 00000000"));
    }

    #[test]
    fn test_as4path() {
        let mut src = hex_to_bytes("c0 11 06 0201 0000fd7d");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0xc0),
                data: Data::As4Path(As4Path(vec![As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![0xfd7d],
                }])),
            }
        );
    }

    #[test]
    fn test_aggregator() {
        let mut src = hex_to_bytes("c0 07 06 fd7d 0a000001");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0xc0),
                data: Data::Aggregator(Aggregator {
                    asn: 0xfd7d,
                    ip: Ipv4Addr::new(10, 0, 0, 1),
                }),
            }
        );
    }

    #[test]
    fn test_as4_aggregator() {
        let mut src = hex_to_bytes("c0 12 08 0002000c 0a000001");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0xc0),
                data: Data::As4Aggregator(As4Aggregator {
                    asn: 131_084,
                    ip: Ipv4Addr::new(10, 0, 0, 1),
                }),
            }
        );
    }

    #[test]
    fn test_originator_id_and_cluster_list() {
        let mut src = hex_to_bytes("80 09 04 0a000001 80 0a 08 0a000002 0a000003");
        let peer = peer2();
        let originator = Value::from_bytes(&mut src, &peer).unwrap();
        assert_eq!(
            originator.data,
            Data::OriginatorId(Ipv4Addr::new(10, 0, 0, 1))
        );
        let cluster = Value::from_bytes(&mut src, &peer).unwrap();
        assert_eq!(
            cluster.data,
            Data::ClusterList(ClusterList(vec![0x0a00_0002, 0x0a00_0003]))
        );
    }

    #[test]
    fn test_mp_reach_v6() {
        let mut src = hex_to_bytes(
            "90 0e 002e 0002 01
                20 fdc0:d227:0306:ee01:0000:0000:0000:0161 fe80:0000:0000:0000:84cf:65ff:fead:2f30
                00
                40 fdc7:3c9d:ff31:0007",
        );
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x90),
                data: Data::MpReachNlri(MpReachNlri {
                    afi: Afi::Ipv6,
                    safi: Safi::Unicast,
                    next_hop: MpNextHop::V6AndLL(
                        Ipv6Addr::new(0xfdc0, 0xd227, 0x0306, 0xee01, 0, 0, 0, 0x0161),
                        Ipv6Addr::new(0xfe80, 0, 0, 0, 0x84cf, 0x65ff, 0xfead, 0x2f30),
                    ),
                    nlri: Routes(vec![Nlri::Plain(Prefix::new_v6(
                        "fdc7:3c9d:ff31:7::".parse().unwrap(),
                        64,
                    ))]),
                }),
            }
        );
    }

    #[test]
    fn test_mp_unreach() {
        let mut src = hex_to_bytes("90 0f 0007 0001 01 18 cb1441");
        let pa = Value::from_bytes(&mut src, &peer2()).unwrap();
        assert_eq!(
            pa,
            Value {
                flags: Flags(0x90),
                data: Data::MpUnreachNlri(MpUnreachNlri {
                    afi: Afi::Ipv4,
                    safi: Safi::Unicast,
                    withdrawn_routes: Routes(vec![Nlri::Plain(Prefix::new_v4(
                        Ipv4Addr::new(203, 20, 65, 0),
                        24,
                    ))]),
                }),
            }
        );
    }

    #[test]
    fn test_mp_reach_bad_next_hop_len() {
        // Next hop length of 5 is not a recognized encoding
        let mut src = hex_to_bytes("90 0e 000a 0001 01 05 0101010101 00");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::OptionalAttributeError as u8
        );
    }

    #[test]
    fn test_unsupported_preserved() {
        // Communities (type 8) is not recognized here
        let data = hex_to_bytes("c0 08 0c fbff0004 fbff0018 fbff0022");
        let pa = Value::from_bytes(&mut data.clone(), &peer2()).unwrap();
        assert_eq!(
            pa.data,
            Data::Unsupported(8, hex_to_bytes("fbff0004 fbff0018 fbff0022"))
        );
        let mut dst = BytesMut::new();
        pa.to_bytes(&mut dst);
        assert_eq!(dst.freeze(), data);
    }

    #[test]
    fn test_unrecognized_well_known() {
        // Type 200 with the optional bit clear
        let mut src = hex_to_bytes("40 c8 01 00");
        let err = Value::from_bytes(&mut src, &peer2()).unwrap_err();
        assert_eq!(
            err.subcode,
            UpdateMessageErrorSubcode::UnrecognizedWellKnownAttribute as u8
        );
    }

    #[test]
    fn test_segment_conversion() {
        let seg = As4Segment {
            type_: AsSegmentType::Sequence,
            asns: vec![65001, 131_072],
        };
        let (narrowed, lossless) = seg.to_two_octet();
        assert!(!lossless);
        assert_eq!(narrowed.asns, vec![65001, AS_TRANS]);

        let seg = As4Segment {
            type_: AsSegmentType::Sequence,
            asns: vec![65001, 65002],
        };
        let (narrowed, lossless) = seg.to_two_octet();
        assert!(lossless);
        assert_eq!(narrowed.to_four_octet().asns, vec![65001, 65002]);
    }

    #[test]
    fn test_as_path_prepend() {
        let mut path = AsPath::default();
        path.prepend(65002);
        path.prepend(65001);
        assert_eq!(
            path.0,
            vec![AsSegment::As4(As4Segment {
                type_: AsSegmentType::Sequence,
                asns: vec![65001, 65002],
            })]
        );
        assert_eq!(path.num_ases(), 2);
    }

    #[test]
    fn test_segment_full_refuses_prepend() {
        let mut seg = AsSegment::As4(As4Segment {
            type_: AsSegmentType::Sequence,
            asns: vec![1; 255],
        });
        assert!(!seg.prepend(65001));
        assert!(!seg.append(65001));
        assert_eq!(seg.len(), 255);
    }

    #[test]
    fn test_normalize_folds_as4_path() {
        // AS_PATH [65001, AS_TRANS] as 2-byte, AS4_PATH [65001, 131072]
        let mut attrs = PathAttributes(vec![
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment::As2(As2Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001, AS_TRANS],
                })])),
            },
            Value {
                flags: Flags(0xc0),
                data: Data::As4Path(As4Path(vec![As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001, 131_072],
                }])),
            },
        ]);
        attrs.normalize_as_path();
        assert_eq!(attrs.len(), 1);
        assert_eq!(
            attrs[0].data,
            Data::AsPath(AsPath(vec![AsSegment::As4(As4Segment {
                type_: AsSegmentType::Sequence,
                asns: vec![65001, 131_072],
            })]))
        );
        // Idempotent
        let before = attrs.clone();
        attrs.normalize_as_path();
        assert_eq!(attrs, before);
    }

    #[test]
    fn test_normalize_keeps_leading_ases() {
        // AS_PATH has 3 ASes, AS4_PATH covers the last 2
        let mut attrs = PathAttributes(vec![
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment::As2(As2Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![64512, 65001, AS_TRANS],
                })])),
            },
            Value {
                flags: Flags(0xc0),
                data: Data::As4Path(As4Path(vec![As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001, 131_072],
                }])),
            },
        ]);
        attrs.normalize_as_path();
        assert_eq!(
            attrs[0].data,
            Data::AsPath(AsPath(vec![
                AsSegment::As4(As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![64512],
                }),
                AsSegment::As4(As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001, 131_072],
                }),
            ]))
        );
    }

    #[test]
    fn test_normalize_ignores_longer_as4_path() {
        let mut attrs = PathAttributes(vec![
            Value {
                flags: Flags(0x40),
                data: Data::AsPath(AsPath(vec![AsSegment::As2(As2Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001],
                })])),
            },
            Value {
                flags: Flags(0xc0),
                data: Data::As4Path(As4Path(vec![As4Segment {
                    type_: AsSegmentType::Sequence,
                    asns: vec![65001, 131_072],
                }])),
            },
        ]);
        attrs.normalize_as_path();
        assert_eq!(attrs.len(), 1);
        assert_eq!(
            attrs[0].data,
            Data::AsPath(AsPath(vec![AsSegment::As4(As4Segment {
                type_: AsSegmentType::Sequence,
                asns: vec![65001],
            })]))
        );
    }
}
