//! Lightweight origin check for station traffic.
//!
//! A station may carry a registered address. Requests claiming that station
//! must then originate from the registered host. The check trusts
//! `X-Forwarded-For` and is only meant for trusted networks.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::model::Station;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny,
}

pub trait OriginPolicy: Send + Sync {
    fn authorize(&self, station: &Station, origin: Option<&str>) -> Authorization;
}

/// Allows a request when the station has no registered address or when the
/// origin host equals the registered host.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegisteredAddressPolicy;

impl OriginPolicy for RegisteredAddressPolicy {
    fn authorize(&self, station: &Station, origin: Option<&str>) -> Authorization {
        let registered = match station.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => address,
            _ => return Authorization::Allow,
        };

        match origin {
            Some(origin) if registered_host(registered) == strip_brackets(origin) => {
                Authorization::Allow
            }
            _ => Authorization::Deny,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

impl OriginPolicy for AllowAllPolicy {
    fn authorize(&self, _station: &Station, _origin: Option<&str>) -> Authorization {
        Authorization::Allow
    }
}

/// Host part of a registered address such as `http://10.0.0.5:5000/`.
pub fn registered_host(address: &str) -> &str {
    let without_scheme = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);

    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    // Bare IPv6 without brackets cannot carry a port
    if authority.matches(':').count() > 1 {
        return authority;
    }
    authority.split(':').next().unwrap_or(authority)
}

fn strip_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

/// First `X-Forwarded-For` entry if present, else the peer IP.
pub fn origin_from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

/// Originating address of a request, if it can be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(pub Option<String>);

impl Origin {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Origin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Origin(origin_from_parts(&parts.headers, peer)))
    }
}
