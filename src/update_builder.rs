//! Build UPDATE messages.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::capability::{Afi, Safi};
use crate::endec::{Component, PeerComponent};
use crate::path::{
    self, AsPath, AsSegment, MpNextHop, MpReachNlri, MpUnreachNlri, Origin, PathAttributes,
};
use crate::route::{Nlri, Routes};
use crate::{Error, Update, MSG_HEADER_LEN, MSG_MAX_LEN};
use std::net::IpAddr;

/// Builder for UPDATE messages.
///
/// Splits the routes over as many UPDATE messages as needed to stay under
/// the 4096-byte message ceiling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateBuilder {
    pub withdrawn_ipv4_routes: Routes,
    pub withdrawn_ipv6_routes: Routes,
    pub nlri_ipv4_routes: Routes,
    pub nlri_ipv6_routes: Routes,
    pub origin: Option<Origin>,
    pub as_path: AsPath,
    pub next_hop: Option<MpNextHop>,
    pub other_path_attrs: PathAttributes,
    pub enable_mp_bgp: bool,
}

impl UpdateBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(enable_mp_bgp: bool) -> Self {
        Self {
            enable_mp_bgp,
            ..Default::default()
        }
    }

    /// Withdraw some IPv4 routes.
    #[must_use]
    pub fn withdraw_ipv4_routes(mut self, routes: Routes) -> Self {
        self.withdrawn_ipv4_routes = routes;
        self
    }

    /// Withdraw some IPv6 routes.
    #[must_use]
    pub fn withdraw_ipv6_routes(mut self, routes: Routes) -> Self {
        self.withdrawn_ipv6_routes = routes;
        self
    }

    /// Withdraw a single IPv4 route.
    #[must_use]
    pub fn withdraw_ipv4_route(mut self, route: impl Into<Nlri>) -> Self {
        self.withdrawn_ipv4_routes.0.push(route.into());
        self
    }

    /// Add some IPv4 routes.
    #[must_use]
    pub fn add_ipv4_routes(mut self, routes: Routes) -> Self {
        self.nlri_ipv4_routes = routes;
        self
    }

    /// Add some IPv6 routes.
    #[must_use]
    pub fn add_ipv6_routes(mut self, routes: Routes) -> Self {
        self.nlri_ipv6_routes = routes;
        self
    }

    /// Add a single IPv4 route.
    #[must_use]
    pub fn add_ipv4_route(mut self, route: impl Into<Nlri>) -> Self {
        self.nlri_ipv4_routes.0.push(route.into());
        self
    }

    /// Add a single IPv6 route.
    #[must_use]
    pub fn add_ipv6_route(mut self, route: impl Into<Nlri>) -> Self {
        self.nlri_ipv6_routes.0.push(route.into());
        self
    }

    /// Set the origin.
    #[must_use]
    pub fn set_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Add an AS path segment.
    #[must_use]
    pub fn push_as_segment(mut self, segment: AsSegment) -> Self {
        self.as_path.0.push(segment);
        self
    }

    /// Set the next hop.
    #[must_use]
    pub fn set_next_hop(mut self, next_hop: MpNextHop) -> Self {
        self.next_hop = Some(next_hop);
        self
    }

    /// Add a path attribute.
    #[must_use]
    pub fn path_attribute(mut self, attr: path::Value) -> Self {
        self.other_path_attrs.0.push(attr);
        self
    }

    /// Find out how to represent the next hop. If MP-BGP is not enabled,
    /// the next hop will be added to the path attributes.
    ///
    /// After this method is called, if no next hop is set, it means that
    /// NLRI components are empty and no next hop is needed.
    fn check_next_hop(&mut self) -> Result<(), Error> {
        if let Some(next_hop) = &self.next_hop {
            if self.enable_mp_bgp {
                Ok(())
            } else if let MpNextHop::Single(IpAddr::V4(addr)) = next_hop {
                self.other_path_attrs.0.push(path::Value {
                    flags: path::Flags::WELL_KNOWN_COMPLETE,
                    data: path::Data::NextHop(*addr),
                });
                Ok(())
            } else {
                Err(Error::NoMpBgp)
            }
        } else if !self.nlri_ipv6_routes.is_empty() || !self.withdrawn_ipv6_routes.is_empty() {
            Err(Error::NoNextHop)
        } else {
            Ok(())
        }
    }

    /// Make an MP_UNREACH_NLRI path attribute from a list of routes.
    fn make_mp_unreach_nlri(routes: Routes, afi: Afi) -> path::Value {
        let mp_unreach_nlri = MpUnreachNlri {
            afi,
            safi: Safi::Unicast,
            withdrawn_routes: routes,
        };
        path::Value {
            flags: path::Flags::OPTIONAL_EXTENDED,
            data: path::Data::MpUnreachNlri(mp_unreach_nlri),
        }
    }

    /// Make an MP_REACH_NLRI path attribute from a list of routes.
    fn make_mp_reach_nlri(routes: Routes, afi: Afi, next_hop: MpNextHop) -> path::Value {
        let mp_reach_nlri = MpReachNlri {
            afi,
            safi: Safi::Unicast,
            next_hop,
            nlri: routes,
        };
        path::Value {
            flags: path::Flags::OPTIONAL_EXTENDED,
            data: path::Data::MpReachNlri(mp_reach_nlri),
        }
    }

    /// Make an MP_UNREACH UPDATE message from routes split into smaller chunks.
    fn make_mp_unreach_update(
        all_withdrawn_routes: Routes,
        afi: Afi,
        allowed_size: usize,
        common_path_attributes: &PathAttributes,
        updates: &mut Vec<Update>,
    ) {
        if all_withdrawn_routes.is_empty() {
            return;
        }
        let route_splits = all_withdrawn_routes.split_routes_to_allowed_size_rev(allowed_size);
        let mut leftover = all_withdrawn_routes.0;
        for end in route_splits {
            let withdrawn_routes = leftover.split_off(end);
            let mut this_path_attributes = common_path_attributes.clone();
            this_path_attributes
                .0
                .push(Self::make_mp_unreach_nlri(Routes(withdrawn_routes), afi));
            updates.push(Update {
                withdrawn_routes: Routes::default(),
                path_attributes: this_path_attributes,
                nlri: Routes::default(),
            });
        }
    }

    /// Make an MP_REACH UPDATE message from routes split into smaller chunks.
    fn make_mp_reach_update(
        all_nlri_routes: Routes,
        afi: Afi,
        allowed_size: usize,
        common_path_attributes: &PathAttributes,
        next_hop: MpNextHop,
        updates: &mut Vec<Update>,
    ) {
        if all_nlri_routes.is_empty() {
            return;
        }
        let route_splits = all_nlri_routes.split_routes_to_allowed_size_rev(allowed_size);
        let mut leftover = all_nlri_routes.0;
        for end in route_splits {
            let nlri_routes = leftover.split_off(end);
            let mut this_path_attributes = common_path_attributes.clone();
            this_path_attributes.0.push(Self::make_mp_reach_nlri(
                Routes(nlri_routes),
                afi,
                next_hop,
            ));
            updates.push(Update {
                withdrawn_routes: Routes::default(),
                path_attributes: this_path_attributes,
                nlri: Routes::default(),
            });
        }
    }

    /// Build one or more UPDATE messages depending on the size of routes.
    pub fn build(mut self) -> Result<Vec<Update>, Error> {
        // The algorithm is quite simple and not very efficient.
        self.check_next_hop()?;
        let Self {
            withdrawn_ipv4_routes,
            withdrawn_ipv6_routes,
            nlri_ipv4_routes,
            nlri_ipv6_routes,
            origin,
            as_path,
            next_hop,
            other_path_attrs: mut small_attrs,
            enable_mp_bgp,
        } = self;
        // Prepare path attributes that are common for all UPDATE messages
        if let Some(origin) = origin {
            small_attrs.0.push(path::Value {
                flags: path::Flags::WELL_KNOWN_COMPLETE,
                data: path::Data::Origin(origin),
            });
        }
        small_attrs.0.push(path::Value {
            flags: path::Flags::WELL_KNOWN_COMPLETE,
            data: path::Data::AsPath(as_path),
        });
        // Split the routes into smaller chunks and pack them into UPDATE messages
        let mut updates = Vec::new();
        if enable_mp_bgp {
            // First send withdrawn routes
            // 4096 - BGP header - UPDATE lengths - attribute envelope - MP_UNREACH_NLRI header
            let remaining_size =
                MSG_MAX_LEN - MSG_HEADER_LEN - 4 - 4 - 3 - small_attrs.encoded_len();
            Self::make_mp_unreach_update(
                withdrawn_ipv4_routes,
                Afi::Ipv4,
                remaining_size,
                &small_attrs,
                &mut updates,
            );
            Self::make_mp_unreach_update(
                withdrawn_ipv6_routes,
                Afi::Ipv6,
                remaining_size,
                &small_attrs,
                &mut updates,
            );
            // Then send NLRI
            if let Some(next_hop) = next_hop {
                // 4096 - BGP header - UPDATE lengths - attribute envelope
                // - MP_REACH_NLRI header - MP_NEXT_HOP
                let remaining_size = MSG_MAX_LEN
                    - MSG_HEADER_LEN
                    - 4
                    - 4
                    - 5
                    - next_hop.encoded_len()
                    - small_attrs.encoded_len();
                Self::make_mp_reach_update(
                    nlri_ipv4_routes,
                    Afi::Ipv4,
                    remaining_size,
                    &small_attrs,
                    next_hop,
                    &mut updates,
                );
                Self::make_mp_reach_update(
                    nlri_ipv6_routes,
                    Afi::Ipv6,
                    remaining_size,
                    &small_attrs,
                    next_hop,
                    &mut updates,
                );
            }
            // Else: `check_next_hop` ensures that there are no NLRI components
        } else {
            // Just IPv4 stuff for vanilla BGP-4
            let remaining_size = MSG_MAX_LEN - MSG_HEADER_LEN - 4 - small_attrs.encoded_len();
            // First send withdrawn routes
            if !withdrawn_ipv4_routes.is_empty() {
                let route_splits =
                    withdrawn_ipv4_routes.split_routes_to_allowed_size_rev(remaining_size);
                let mut leftover = withdrawn_ipv4_routes.0;
                for end in route_splits {
                    let withdrawn_routes = leftover.split_off(end);
                    updates.push(Update {
                        withdrawn_routes: Routes(withdrawn_routes),
                        path_attributes: small_attrs.clone(),
                        nlri: Routes::default(),
                    });
                }
            }
            // Then send NLRI
            if !nlri_ipv4_routes.is_empty()
                && matches!(next_hop, Some(MpNextHop::Single(IpAddr::V4(_))))
            {
                // `check_next_hop` already moved the NEXT_HOP into the
                // common attributes
                let remaining_size = remaining_size - 4 - 3;
                let route_splits =
                    nlri_ipv4_routes.split_routes_to_allowed_size_rev(remaining_size);
                let mut leftover = nlri_ipv4_routes.0;
                for end in route_splits {
                    let nlri_routes = leftover.split_off(end);
                    updates.push(Update {
                        withdrawn_routes: Routes::default(),
                        path_attributes: small_attrs.clone(),
                        nlri: Routes(nlri_routes),
                    });
                }
            }
        }
        Ok(updates)
    }
}
