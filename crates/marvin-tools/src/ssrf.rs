// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! SSRF guard (§4.1): classifies a URL (and each redirect hop) as fetchable
//! or denied before `web_fetch` touches the network.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;

/// Maximum number of redirect hops `web_fetch` will follow, re-validating
/// the target of each hop through [`check_url`] (§4.1).
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsrfDenial {
    /// Scheme is not `http` or `https`.
    BadScheme(String),
    /// URL has no host.
    NoHost,
    /// Host resolves (or is written) as a loopback address.
    Loopback,
    /// Host is a link-local address (169.254.0.0/16, fe80::/10).
    LinkLocal,
    /// Host is in a private address range (RFC 1918 / unique local IPv6).
    PrivateRange,
    /// Host is the unspecified address (`0.0.0.0` / `::`).
    Unspecified,
    /// Host carries a `.local` or `.internal` suffix.
    InternalSuffix,
    /// Too many redirect hops were followed.
    TooManyRedirects,
}

impl fmt::Display for SsrfDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsrfDenial::BadScheme(s) => write!(f, "scheme '{s}' is not allowed (only http/https)"),
            SsrfDenial::NoHost => write!(f, "URL has no host"),
            SsrfDenial::Loopback => write!(f, "refusing to fetch a loopback address"),
            SsrfDenial::LinkLocal => write!(f, "refusing to fetch a link-local address"),
            SsrfDenial::PrivateRange => write!(f, "refusing to fetch a private address range"),
            SsrfDenial::Unspecified => write!(f, "refusing to fetch the unspecified address"),
            SsrfDenial::InternalSuffix => write!(f, "refusing to fetch a .local/.internal host"),
            SsrfDenial::TooManyRedirects => {
                write!(f, "exceeded the maximum of {MAX_REDIRECTS} redirect hops")
            }
        }
    }
}

impl std::error::Error for SsrfDenial {}

/// Validate a URL string before it is fetched or followed as a redirect
/// target. Parses the host as a literal IP (accepting decimal, octal, and
/// hex-dotted forms a naive string check would miss) or, for a named host,
/// rejects suffixes known to resolve internally.
pub fn check_url(raw: &str) -> Result<(), SsrfDenial> {
    let url = Url::parse(raw).map_err(|_| SsrfDenial::BadScheme(raw.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(SsrfDenial::BadScheme(other.to_string())),
    }

    let host = url.host_str().ok_or(SsrfDenial::NoHost)?;
    check_host(host)
}

fn check_host(host: &str) -> Result<(), SsrfDenial> {
    let host = host.trim_matches(|c| c == '[' || c == ']');

    if let Some(ip) = parse_ip_literal(host) {
        return check_ip(ip);
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost" || lower.ends_with(".localhost") {
        return Err(SsrfDenial::Loopback);
    }
    if lower.ends_with(".local") || lower.ends_with(".internal") {
        return Err(SsrfDenial::InternalSuffix);
    }

    Ok(())
}

fn check_ip(ip: IpAddr) -> Result<(), SsrfDenial> {
    match ip {
        IpAddr::V4(v4) => check_ipv4(v4),
        IpAddr::V6(v6) => check_ipv6(v6),
    }
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), SsrfDenial> {
    if ip.is_unspecified() {
        return Err(SsrfDenial::Unspecified);
    }
    if ip.is_loopback() {
        return Err(SsrfDenial::Loopback);
    }
    if ip.is_link_local() {
        return Err(SsrfDenial::LinkLocal);
    }
    if ip.is_private() || is_carrier_grade_nat(ip) {
        return Err(SsrfDenial::PrivateRange);
    }
    Ok(())
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), SsrfDenial> {
    if ip.is_unspecified() {
        return Err(SsrfDenial::Unspecified);
    }
    if ip.is_loopback() {
        return Err(SsrfDenial::Loopback);
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return check_ipv4(v4);
    }
    // fe80::/10 link-local
    let segments = ip.segments();
    if (segments[0] & 0xffc0) == 0xfe80 {
        return Err(SsrfDenial::LinkLocal);
    }
    // fc00::/7 unique local
    if (segments[0] & 0xfe00) == 0xfc00 {
        return Err(SsrfDenial::PrivateRange);
    }
    Ok(())
}

/// 100.64.0.0/10 — RFC 6598 carrier-grade NAT range, commonly used for
/// internal cloud metadata/service networks.
fn is_carrier_grade_nat(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 100 && (o[1] & 0b1100_0000) == 0b0100_0000
}

/// Parse a host string as an IP literal, accepting the decimal-dotted form
/// plus octal (`0177.0.0.1`) and hexadecimal (`0x7f.0.0.1`) per-octet
/// encodings some HTTP clients normalize before loopback checks ever run.
fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    parse_ipv4_exotic(host)
}

fn parse_ipv4_exotic(host: &str) -> Option<IpAddr> {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    let mut octets = [0u32; 4];
    let mut parsed = Vec::with_capacity(parts.len());
    for part in &parts {
        parsed.push(parse_numeric(part)?);
    }
    // A single-octet or dotted-quad literal is collapsed the way inet_aton
    // does: the last component absorbs the remaining bits.
    match parsed.len() {
        4 => {
            for v in &parsed {
                if *v > 0xff {
                    return None;
                }
            }
            octets = [parsed[0] as u8 as u32, parsed[1] as u8 as u32, parsed[2] as u8 as u32, parsed[3] as u8 as u32];
        }
        1 => {
            let v = parsed[0];
            octets = [(v >> 24) & 0xff, (v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff];
        }
        _ => return None,
    }
    Some(IpAddr::V4(Ipv4Addr::new(
        octets[0] as u8,
        octets[1] as u8,
        octets[2] as u8,
        octets[3] as u8,
    )))
}

fn parse_numeric(part: &str) -> Option<u32> {
    if let Some(hex) = part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if part.len() > 1 && part.starts_with('0') && part.chars().all(|c| c.is_ascii_digit()) {
        return u32::from_str_radix(part, 8).ok();
    }
    part.parse::<u32>().ok()
}
