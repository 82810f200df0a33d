//! BGP open message optional parameters and the capability parameter
//!
//! RFC 4271 Section 4.2 specifies the optional parameters that can be
//! included in the BGP open message. However, the only optional parameter
//! defined is the capability parameter (RFC 3392/5492), so both are
//! implemented in this module.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::endec::{ensure_remaining, Component};
use crate::{MessageError, OpenMessageErrorSubcode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::ops::Deref;

/// A list of BGP optional parameters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionalParameters(pub Vec<OptionalParameterValue>);

impl Component for OptionalParameters {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        // RFC 4271 4.2 Optional Parameters Length
        ensure_remaining!(
            src,
            1,
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                Bytes::new(),
                "not enough data to decode the optional parameters length",
            )
        );
        let len = src.get_u8() as usize;
        if src.remaining() != len {
            return Err(MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                src.clone(),
                "optional parameters length does not match the message",
            ));
        }
        let mut opt_params = Vec::new();
        // RFC 4271 4.2 Optional Parameters
        while src.has_remaining() {
            let param = OptionalParameterValue::from_bytes(src)?;
            opt_params.push(param);
        }
        Ok(Self(opt_params))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        let length_pos = dst.len();
        dst.put_u8(0); // Placeholder for length
        for param in self.0 {
            len += param.to_bytes(dst);
        }
        dst[length_pos] = u8::try_from(len).expect("Optional parameters length overflow");
        len + 1 // Length
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Component::encoded_len).sum::<usize>() + 1 // Length
    }
}

impl From<Vec<OptionalParameterValue>> for OptionalParameters {
    fn from(params: Vec<OptionalParameterValue>) -> Self {
        Self(params)
    }
}

impl Deref for OptionalParameters {
    type Target = Vec<OptionalParameterValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP optional parameter (RFC 4271 4.2)
///
/// `Unknown` can be constructed and re-encoded for pass-through, but an
/// unrecognized parameter type is a protocol error on decode.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum OptionalParameterValue {
    Capabilities(Capabilities),
    Unknown { type_: u8, data: Bytes },
}

/// BGP optional parameter types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum OptionalParameterType {
    Capabilities = 2,
}

impl Component for OptionalParameterValue {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let whole = src.clone();
        ensure_remaining!(
            src,
            2,
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                whole,
                "not enough data to decode the optional parameter type and length",
            )
        );
        // RFC 5492 4. Optional Parameters -> Parameter Type
        let param_type = src.get_u8();
        // RFC 5492 4. Optional Parameters -> Parameter Length
        let param_len = src.get_u8() as usize;
        ensure_remaining!(
            src,
            param_len,
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                whole,
                "optional parameter length overruns the message",
            )
        );
        match OptionalParameterType::from_u8(param_type) {
            Some(OptionalParameterType::Capabilities) => {
                let mut param_buf = src.split_to(param_len);
                let cap = Capabilities::from_bytes(&mut param_buf)?;
                Ok(Self::Capabilities(cap))
            }
            _ => Err(MessageError::open(
                OpenMessageErrorSubcode::UnsupportedOptionalParameter,
                whole.slice(..(param_len + 2).min(whole.len())),
                "unrecognized optional parameter type",
            )),
        }
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let type_pos = dst.len();
        dst.put_u8(0); // Placeholder for type
        let len_pos = dst.len();
        dst.put_u8(0); // Placeholder for length
        match self {
            OptionalParameterValue::Capabilities(cap) => {
                let len = cap.to_bytes(dst);
                dst[type_pos] = OptionalParameterType::Capabilities as u8;
                dst[len_pos] = u8::try_from(len).expect("Capabilities length overflow");
                len + 2 // Type and length
            }
            OptionalParameterValue::Unknown { type_, data } => {
                let len = data.len();
                dst.put_slice(&data);
                dst[type_pos] = type_;
                dst[len_pos] = u8::try_from(len).expect("Optional parameter length overflow");
                len + 2 // Type and length
            }
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            OptionalParameterValue::Capabilities(cap) => cap.encoded_len() + 2, // Type and length
            OptionalParameterValue::Unknown { data, .. } => data.len() + 2,
        }
    }
}

/// BGP capability list
// "a BGP speaker MUST be prepared to accept such multiple instances," so a Vec must be used
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capabilities(pub Vec<Value>);

impl Component for Capabilities {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let mut cap = Vec::new();
        while src.has_remaining() {
            ensure_remaining!(
                src,
                2,
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    src.clone(),
                    "not enough data to decode the capability code and length",
                )
            );
            // RFC 5492 4. Optional Parameters -> Capability Code
            let code = src.get_u8();
            // RFC 5492 4. Optional Parameters -> Capability Length
            let len = src.get_u8() as usize;
            ensure_remaining!(
                src,
                len,
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    src.clone(),
                    "capability length overruns the parameter",
                )
            );
            // Avoid processing trailing bytes
            let mut src = src.split_to(len);
            log::trace!("Capability code: {code}, length: {len}, data: {src:?}");
            let value = match Type::from_u8(code) {
                Some(Type::MultiProtocol) => {
                    Value::MultiProtocol(MultiProtocol::from_bytes(&mut src)?)
                }
                Some(Type::FourOctetAsNumber) => {
                    ensure_remaining!(
                        src,
                        4,
                        MessageError::open(
                            OpenMessageErrorSubcode::Unspecific,
                            src.clone(),
                            "four-octet AS capability is shorter than 4 bytes",
                        )
                    );
                    Value::FourOctetAsNumber(FourOctetAsNumber { asn: src.get_u32() })
                }
                Some(Type::AddPath) => Value::AddPath(AddPath::from_bytes(&mut src)?),
                _ => Value::Unsupported(code, src.copy_to_bytes(src.remaining())),
            };
            cap.push(value);
        }
        Ok(Self(cap))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for value in self.0 {
            dst.put_u8((&value).into());
            let len_pos = dst.len();
            dst.put_u8(0); // Placeholder for length
            let value_len = match value {
                Value::MultiProtocol(mp) => mp.to_bytes(dst),
                Value::FourOctetAsNumber(four) => four.asn.to_bytes(dst),
                Value::AddPath(ap) => ap.to_bytes(dst),
                Value::Unsupported(_, data) => {
                    let len = data.len();
                    dst.put_slice(&data);
                    len
                }
            };
            dst[len_pos] = u8::try_from(value_len).expect("Capability length overflow");
            len += value_len + 2; // Code and length
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0
            .iter()
            .map(|v| {
                let len = match v {
                    Value::MultiProtocol(mp) => mp.encoded_len(),
                    Value::FourOctetAsNumber(_) => 4,
                    Value::AddPath(ap) => ap.encoded_len(),
                    Value::Unsupported(_, data) => data.len(),
                };
                len + 2 // Code and length
            })
            .sum()
    }
}

impl From<Vec<Value>> for Capabilities {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl Deref for Capabilities {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Capabilities {
    /// Check if a specific capability is present
    pub fn has(&self, cap: &Value) -> bool {
        self.0.iter().any(|v| *v == *cap)
    }

    /// Check if a multi-protocol capability for the family is present
    #[must_use]
    pub fn has_mp(&self, afi: Afi, safi: Safi) -> bool {
        self.has(&Value::MultiProtocol(MultiProtocol { afi, safi }))
    }

    /// Get the advertised four-octet AS number, if any
    #[must_use]
    pub fn four_octet_asn(&self) -> Option<u32> {
        self.0.iter().find_map(|v| {
            if let Value::FourOctetAsNumber(four) = v {
                Some(four.asn)
            } else {
                None
            }
        })
    }

    /// Iterate over all advertised Add-Path families
    pub fn add_path_families(&self) -> impl Iterator<Item = &AddPathValue> {
        self.0.iter().flat_map(|v| {
            if let Value::AddPath(ap) = v {
                ap.0.as_slice()
            } else {
                &[]
            }
        })
    }

    /// Get the value of an unsupported capability
    #[must_use]
    pub fn get_unsupported(&self, code: u8) -> Option<&Bytes> {
        self.0.iter().find_map(|v| {
            if let Value::Unsupported(c, data) = v {
                if *c == code {
                    Some(data)
                } else {
                    None
                }
            } else {
                None
            }
        })
    }
}

/// BGP capability (RFC 3392/5492)
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// BGP multi-protocol capability (RFC 2858/4760)
    MultiProtocol(MultiProtocol),
    /// BGP four-octet AS number capability (RFC 6793)
    FourOctetAsNumber(FourOctetAsNumber),
    /// BGP additional-paths capability (RFC 7911)
    AddPath(AddPath),
    /// Other unsupported capability, preserved verbatim for re-encode
    Unsupported(u8, Bytes),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    MultiProtocol = 1,
    FourOctetAsNumber = 65,
    AddPath = 69,
}

impl From<&Value> for u8 {
    fn from(cap: &Value) -> Self {
        match cap {
            Value::MultiProtocol(_) => Type::MultiProtocol as u8,
            Value::FourOctetAsNumber(_) => Type::FourOctetAsNumber as u8,
            Value::AddPath(_) => Type::AddPath as u8,
            Value::Unsupported(code, _) => *code,
        }
    }
}

/// BGP multi-protocol capability value field (RFC 4760 Section 8)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultiProtocol {
    pub afi: Afi,
    pub safi: Safi,
}

impl Component for MultiProtocol {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            4,
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                src.clone(),
                "multi-protocol capability is shorter than 4 bytes",
            )
        );
        let afi = src.get_u16();
        let afi = Afi::from_u16(afi).ok_or_else(|| {
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                Bytes::copy_from_slice(&afi.to_be_bytes()),
                "unrecognized multi-protocol AFI",
            )
        })?;
        let _ = src.get_u8(); // Reserved
        let safi = src.get_u8();
        let safi = Safi::from_u16(u16::from(safi)).ok_or_else(|| {
            MessageError::open(
                OpenMessageErrorSubcode::Unspecific,
                Bytes::copy_from_slice(&[safi]),
                "unrecognized multi-protocol SAFI",
            )
        })?;
        Ok(Self { afi, safi })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(0); // Reserved
        dst.put_u8(self.safi as u16 as u8);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

/// BGP address family identifier
///
/// # References
/// [Address Family Numbers](https://www.iana.org/assignments/address-family-numbers/address-family-numbers.xhtml)
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
}

/// BGP subsequent address family identifier
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
    MplsLabel = 4,
    Vpn = 128,
    VpnMulticast = 129,
}

/// Send/receive disposition advertised per family in the Add-Path
/// capability (RFC 7911 Section 4)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum AddPathDirection {
    Receive = 1,
    Send = 2,
    Both = 3,
}

/// BGP additional-paths capability (RFC 7911)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddPath(pub Vec<AddPathValue>);

/// One Add-Path family entry: AFI(2), SAFI(1), send/receive(1)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AddPathValue {
    pub afi: Afi,
    pub safi: Safi,
    pub direction: AddPathDirection,
}

impl From<Vec<AddPathValue>> for AddPath {
    fn from(values: Vec<AddPathValue>) -> Self {
        Self(values)
    }
}

impl Deref for AddPath {
    type Target = Vec<AddPathValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Component for AddPath {
    fn from_bytes(src: &mut Bytes) -> Result<Self, MessageError> {
        let mut values = Vec::with_capacity(src.remaining() / 4);
        while src.has_remaining() {
            ensure_remaining!(
                src,
                4,
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    src.clone(),
                    "Add-Path capability entry is shorter than 4 bytes",
                )
            );
            let afi = src.get_u16();
            let afi = Afi::from_u16(afi).ok_or_else(|| {
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    Bytes::copy_from_slice(&afi.to_be_bytes()),
                    "unrecognized Add-Path AFI",
                )
            })?;
            let safi = src.get_u8();
            let safi = Safi::from_u16(u16::from(safi)).ok_or_else(|| {
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    Bytes::copy_from_slice(&[safi]),
                    "unrecognized Add-Path SAFI",
                )
            })?;
            let direction = src.get_u8();
            let direction = AddPathDirection::from_u8(direction).ok_or_else(|| {
                MessageError::open(
                    OpenMessageErrorSubcode::Unspecific,
                    Bytes::copy_from_slice(&[direction]),
                    "unrecognized Add-Path send/receive value",
                )
            })?;
            values.push(AddPathValue {
                afi,
                safi,
                direction,
            });
        }
        Ok(Self(values))
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let len = self.encoded_len();
        for value in self.0 {
            dst.put_u16(value.afi as u16);
            dst.put_u8(value.safi as u16 as u8);
            dst.put_u8(value.direction as u8);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.len() * 4
    }
}

/// BGP four-octet AS number capability value field (RFC 6793)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FourOctetAsNumber {
    pub asn: u32,
}

impl From<u32> for FourOctetAsNumber {
    fn from(asn: u32) -> Self {
        Self { asn }
    }
}

impl Deref for FourOctetAsNumber {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.asn
    }
}

/// Builder for BGP capabilities
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    data: Vec<Value>,
    add_paths: Vec<AddPathValue>,
}

impl CapabilitiesBuilder {
    /// Create a new capabilities builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a multi-protocol capability
    #[must_use]
    pub fn multi_protocol(mut self, afi: Afi, safi: Safi) -> Self {
        self.data
            .push(Value::MultiProtocol(MultiProtocol { afi, safi }));
        self
    }

    /// Shortcut for adding an IPv4 unicast multi-protocol capability
    #[must_use]
    pub fn mp_ipv4_unicast(self) -> Self {
        self.multi_protocol(Afi::Ipv4, Safi::Unicast)
    }

    /// Shortcut for adding an IPv6 unicast multi-protocol capability
    #[must_use]
    pub fn mp_ipv6_unicast(self) -> Self {
        self.multi_protocol(Afi::Ipv6, Safi::Unicast)
    }

    /// Add one family to the Add-Path capability
    #[must_use]
    pub fn add_path(mut self, afi: Afi, safi: Safi, direction: AddPathDirection) -> Self {
        self.add_paths.push(AddPathValue {
            afi,
            safi,
            direction,
        });
        self
    }

    /// Add a four-octet AS number capability
    #[must_use]
    pub fn four_octet_as_number(mut self, asn: u32) -> Self {
        self.data
            .push(Value::FourOctetAsNumber(FourOctetAsNumber { asn }));
        self
    }

    /// Add a four-octet AS number capability if the AS number is greater
    /// than 65535
    #[must_use]
    pub fn four_octet_as_number_if_needed(self, asn: u32) -> Self {
        if asn > u32::from(u16::MAX) {
            self.four_octet_as_number(asn)
        } else {
            self
        }
    }

    /// Add an unsupported capability
    #[must_use]
    pub fn other(mut self, code: u8, data: Bytes) -> Self {
        self.data.push(Value::Unsupported(code, data));
        self
    }

    /// Build the capabilities
    #[must_use]
    pub fn build(self) -> Capabilities {
        let mut data = self.data;
        if !self.add_paths.is_empty() {
            data.push(Value::AddPath(AddPath(self.add_paths)));
        }
        Capabilities(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_to_bytes;

    #[test]
    fn test_cap_builder() {
        let cap = CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .mp_ipv6_unicast()
            .add_path(Afi::Ipv4, Safi::Unicast, AddPathDirection::Both)
            .four_octet_as_number(65536)
            .other(255, Bytes::from_static(&[1, 2, 3, 4]))
            .build();
        assert_eq!(cap.0.len(), 5);
        assert!(cap.has_mp(Afi::Ipv4, Safi::Unicast));
        assert!(cap.has_mp(Afi::Ipv6, Safi::Unicast));
        assert_eq!(cap.four_octet_asn(), Some(65536));
        assert_eq!(cap.add_path_families().count(), 1);
        assert_eq!(
            cap.get_unsupported(255),
            Some(&Bytes::from_static(&[1, 2, 3, 4]))
        );
        // Add-Path entries are folded into a single capability at the end
        assert!(matches!(cap.0.last().unwrap(), Value::AddPath(ap) if ap.len() == 1));
    }

    #[test]
    fn test_add_path_capability() {
        let mut src = hex_to_bytes("0001 01 03");
        let ap = AddPath::from_bytes(&mut src).unwrap();
        assert_eq!(
            ap,
            AddPath(vec![AddPathValue {
                afi: Afi::Ipv4,
                safi: Safi::Unicast,
                direction: AddPathDirection::Both,
            }])
        );
        let mut dst = BytesMut::new();
        let len = ap.clone().to_bytes(&mut dst);
        assert_eq!(len, 4);
        assert_eq!(dst.freeze(), hex_to_bytes("0001 01 03"));
    }

    #[test]
    fn test_capabilities_unknown_preserved() {
        // Route refresh (code 2) is deliberately not recognized here
        let data = hex_to_bytes("0200 4104 fcde349d");
        let caps = Capabilities::from_bytes(&mut data.clone()).unwrap();
        assert_eq!(caps.0.len(), 2);
        assert_eq!(caps.0[0], Value::Unsupported(2, Bytes::new()));
        assert_eq!(caps.four_octet_asn(), Some(0xfcde_349d));
        let mut dst = BytesMut::new();
        caps.to_bytes(&mut dst);
        assert_eq!(dst.freeze(), data);
    }

    #[test]
    fn test_unknown_parameter_encodes_verbatim() {
        // Decoding an unknown parameter type is a protocol error, but a
        // locally built one must still serialize for pass-through
        let param = OptionalParameterValue::Unknown {
            type_: 255,
            data: Bytes::from_static(&[0xaa, 0xbb]),
        };
        assert_eq!(param.encoded_len(), 4);
        let mut dst = BytesMut::new();
        let len = param.to_bytes(&mut dst);
        assert_eq!(len, 4);
        assert_eq!(dst.freeze(), hex_to_bytes("ff 02 aabb"));
    }

    #[test]
    fn test_capability_length_overrun() {
        // Capability claims 6 bytes but only 4 remain
        let mut src = hex_to_bytes("4106 fcde349d");
        let err = Capabilities::from_bytes(&mut src).unwrap_err();
        assert_eq!(err.code, crate::NotificationErrorCode::OpenMessageError);
        assert_eq!(err.subcode, OpenMessageErrorSubcode::Unspecific as u8);
    }
}
