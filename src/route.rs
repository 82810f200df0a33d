//! BGP route NLRI
//!
//! These structures do not contain information about the address family of
//! the route as they correspond to BGP's NLRI fields. To determine the
//! address family, the caller must know the context (BGP.nlri,
//! MP_REACH_NLRI, etc). Whether each entry carries an RFC 7911 path
//! identifier is decided by the peer's Add-Path negotiation, so the caller
//! passes that in as well.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::endec::ensure_remaining;
use crate::{MessageError, UpdateMessageErrorSubcode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::Deref;

/// Compute the number of prefix octets from the prefix length
fn n_prefix_octets(prefix_len: u8) -> usize {
    #[allow(clippy::verbose_bit_mask)]
    let result = if prefix_len & 0x07 == 0 {
        prefix_len >> 3
    } else {
        (prefix_len >> 3) + 1
    };
    usize::from(result)
}

/// BGP route CIDR block
///
/// A compact representation of a u8 prefix length and the minimum number of
/// octets to represent the prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prefix {
    pub length: u8,
    pub prefix: Bytes,
}

impl Prefix {
    /// Build an IPv4 prefix, keeping only the covered octets
    #[must_use]
    pub fn new_v4(addr: Ipv4Addr, length: u8) -> Self {
        let n = n_prefix_octets(length.min(32));
        Self {
            length,
            prefix: Bytes::copy_from_slice(&addr.octets()[..n]),
        }
    }

    /// Build an IPv6 prefix, keeping only the covered octets
    #[must_use]
    pub fn new_v6(addr: Ipv6Addr, length: u8) -> Self {
        let n = n_prefix_octets(length.min(128));
        Self {
            length,
            prefix: Bytes::copy_from_slice(&addr.octets()[..n]),
        }
    }

    /// The prefix zero-padded to a full IPv4 address
    #[must_use]
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.length > 32 || self.prefix.len() > 4 {
            return None;
        }
        let mut octets = [0u8; 4];
        octets[..self.prefix.len()].copy_from_slice(&self.prefix);
        Some(Ipv4Addr::from(octets))
    }

    fn from_bytes(src: &mut Bytes, max_bits: u8) -> Result<Self, MessageError> {
        let whole = src.clone();
        let length = src.get_u8();
        if length > max_bits {
            return Err(MessageError::update(
                UpdateMessageErrorSubcode::InvalidNetworkField,
                Bytes::copy_from_slice(&[length]),
                "prefix length exceeds the address family size",
            ));
        }
        let n = n_prefix_octets(length);
        ensure_remaining!(
            src,
            n,
            MessageError::update(
                UpdateMessageErrorSubcode::InvalidNetworkField,
                whole,
                "prefix overruns the NLRI field",
            )
        );
        let prefix = src.split_to(n);
        Ok(Self { length, prefix })
    }

    fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u8(self.length);
        dst.put_slice(&self.prefix);
        1 + self.prefix.len()
    }

    fn encoded_len(&self) -> usize {
        1 + self.prefix.len()
    }
}

/// One NLRI entry
///
/// The `Extended` variant is the RFC 7911 framing with a 4-byte path
/// identifier in front of the prefix; which variant is on the wire for a
/// family is fixed by the Add-Path negotiation, not by the data itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nlri {
    Plain(Prefix),
    Extended { path_id: u32, prefix: Prefix },
}

impl Nlri {
    pub(crate) fn from_bytes(
        src: &mut Bytes,
        extended: bool,
        max_bits: u8,
    ) -> Result<Self, MessageError> {
        ensure_remaining!(
            src,
            1,
            MessageError::update(
                UpdateMessageErrorSubcode::InvalidNetworkField,
                Bytes::new(),
                "empty NLRI entry",
            )
        );
        if extended {
            ensure_remaining!(
                src,
                5,
                MessageError::update(
                    UpdateMessageErrorSubcode::InvalidNetworkField,
                    src.clone(),
                    "NLRI entry too short for a path identifier",
                )
            );
            let path_id = src.get_u32();
            let prefix = Prefix::from_bytes(src, max_bits)?;
            Ok(Self::Extended { path_id, prefix })
        } else {
            Ok(Self::Plain(Prefix::from_bytes(src, max_bits)?))
        }
    }

    pub(crate) fn to_bytes(self, dst: &mut BytesMut) -> usize {
        match self {
            Self::Plain(prefix) => prefix.to_bytes(dst),
            Self::Extended { path_id, prefix } => {
                dst.put_u32(path_id);
                4 + prefix.to_bytes(dst)
            }
        }
    }

    pub(crate) fn encoded_len(&self) -> usize {
        match self {
            Self::Plain(prefix) => prefix.encoded_len(),
            Self::Extended { prefix, .. } => 4 + prefix.encoded_len(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &Prefix {
        match self {
            Self::Plain(prefix) | Self::Extended { prefix, .. } => prefix,
        }
    }

    #[must_use]
    pub fn path_id(&self) -> Option<u32> {
        match self {
            Self::Plain(_) => None,
            Self::Extended { path_id, .. } => Some(*path_id),
        }
    }
}

impl From<Prefix> for Nlri {
    fn from(prefix: Prefix) -> Self {
        Self::Plain(prefix)
    }
}

/// BGP routes
///
/// A compact list of NLRI entries without a length field; decoding runs
/// until the buffer is exhausted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Routes(pub Vec<Nlri>);

impl Routes {
    pub(crate) fn from_bytes(
        src: &mut Bytes,
        extended: bool,
        max_bits: u8,
    ) -> Result<Self, MessageError> {
        let mut routes = Vec::new();
        while src.has_remaining() {
            routes.push(Nlri::from_bytes(src, extended, max_bits)?);
        }
        Ok(Self(routes))
    }

    pub(crate) fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for route in self.0 {
            len += route.to_bytes(dst);
        }
        len
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::slice_encoded_len(&self.0)
    }

    /// Find the encoded size of a slice of routes
    fn slice_encoded_len(routes: &[Nlri]) -> usize {
        routes.iter().map(Nlri::encoded_len).sum()
    }

    /// Find a set of split points for the given routes, such that each
    /// set of routes encodes to a size less than or equal to `allowed_size`.
    ///
    /// If no split is required, the result will be `vec![len]`.
    /// However, if the routes are too large to encode in the allowed size,
    /// the result will be an empty vector.
    pub fn split_routes_to_allowed_size_each(&self, allowed_size: usize) -> Vec<usize> {
        // The algorithm is to exponentially decrease the number of routes
        // to keep in each iteration to fit one set. For the next set, the
        // number of routes to keep is inherited from the previous set.
        // If later routes are shorter than the previous set, the algorithm
        // produces a suboptimal result.
        let len = self.len();
        let mut split_points = Vec::new();
        let mut start = 0;
        let mut to_keep_each = len;
        while start < self.len() {
            let mut end = len.min(start + to_keep_each);
            let mut encoded_len = Self::slice_encoded_len(&self[start..end]);
            while encoded_len > allowed_size {
                to_keep_each /= 2;
                if to_keep_each == 0 {
                    return Vec::new();
                }
                end = len.min(start + to_keep_each);
                encoded_len = Self::slice_encoded_len(&self[start..end]);
            }
            split_points.push(end);
            start += to_keep_each;
        }
        split_points
    }

    /// Similar to `split_routes_to_allowed_size_each`, but returns the
    /// left boundary of each split instead of the right boundary and
    /// reverses the order of the split points. This is useful for
    /// calling `Vec::split_off` without having to offset the split points.
    pub fn split_routes_to_allowed_size_rev(&self, allowed_size: usize) -> Vec<usize> {
        let mut split_points = self.split_routes_to_allowed_size_each(allowed_size);
        // Remove tail and add 0 and reverse in place
        split_points.pop();
        split_points.reverse();
        split_points.push(0);
        split_points
    }
}

impl Deref for Routes {
    type Target = Vec<Nlri>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<I, T> From<I> for Routes
where
    I: IntoIterator<Item = T>,
    T: Into<Nlri>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
