//! Share-link parsing and validation.
//!
//! # Responsibilities
//! - Recognise vmess://, vless://, trojan:// and ss:// links
//! - Extract server host, port and display name
//! - Reject servers outside the allowed domain
//!
//! # Design Decisions
//! - Links are trimmed before parsing
//! - Missing ports fall back to the protocol's conventional default
//! - Credentials are not extracted here; the document builder re-reads
//!   them from the stored link

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::schema::LinkSettings;

const DEFAULT_TLS_PORT: u16 = 443;
const DEFAULT_SS_PORT: u16 = 8388;

/// Proxy protocol of a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "vmess")]
    Vmess,
    #[serde(rename = "vless")]
    Vless,
    #[serde(rename = "trojan")]
    Trojan,
    #[serde(rename = "ss")]
    Shadowsocks,
}

impl Protocol {
    /// URL scheme, also used as the stored protocol name.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "ss",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            Protocol::Vmess => "VMess Connection",
            Protocol::Vless => "VLESS Connection",
            Protocol::Trojan => "Trojan Connection",
            Protocol::Shadowsocks => "Shadowsocks Connection",
        }
    }

    fn from_link(link: &str) -> Option<(Self, &str)> {
        [
            Protocol::Vmess,
            Protocol::Vless,
            Protocol::Trojan,
            Protocol::Shadowsocks,
        ]
        .into_iter()
        .find_map(|p| {
            link.strip_prefix(p.scheme())
                .and_then(|rest| rest.strip_prefix("://"))
                .map(|rest| (p, rest))
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Errors produced while parsing a share link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unsupported protocol; only vmess://, vless://, trojan:// and ss:// are supported")]
    Unsupported,

    #[error("invalid {protocol} link: {reason}")]
    Malformed { protocol: Protocol, reason: String },

    #[error("invalid {protocol} link: missing '{field}'")]
    MissingField {
        protocol: Protocol,
        field: &'static str,
    },

    #[error("invalid {protocol} link: bad port '{value}'")]
    InvalidPort { protocol: Protocol, value: String },

    #[error("connection host must be {allowed} or a subdomain of it, got {host}")]
    HostNotAllowed { host: String, allowed: String },
}

/// A validated share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub protocol: Protocol,
    pub server_host: String,
    pub server_port: u16,
    /// The trimmed link as given.
    pub link: String,
    pub name: String,
}

impl ParsedLink {
    /// Attach a storage ID.
    pub fn into_connection(self, id: u64) -> Connection {
        Connection {
            id,
            name: self.name,
            link: self.link,
            protocol: self.protocol,
            server_host: self.server_host,
            server_port: self.server_port,
        }
    }
}

/// A stored connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: u64,
    pub name: String,
    pub link: String,
    pub protocol: Protocol,
    pub server_host: String,
    pub server_port: u16,
}

/// Parse `link` and check its host against `policy`.
pub fn parse_link(link: &str, policy: &LinkSettings) -> Result<ParsedLink, LinkError> {
    let link = link.trim();
    let (protocol, rest) = Protocol::from_link(link).ok_or(LinkError::Unsupported)?;

    let (server_host, server_port, name) = match protocol {
        Protocol::Vmess => parse_vmess(rest)?,
        Protocol::Vless | Protocol::Trojan => parse_url_link(protocol, link)?,
        Protocol::Shadowsocks => parse_shadowsocks(link, rest)?,
    };

    check_host(&server_host, policy)?;

    Ok(ParsedLink {
        protocol,
        server_host,
        server_port,
        link: link.to_string(),
        name: name.unwrap_or_else(|| protocol.default_name().to_string()),
    })
}

/// Whether `url` is an https URL on the allowed domain.
pub fn is_valid_subscription_url(url: &str, policy: &LinkSettings) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            parsed.scheme() == "https"
                && parsed
                    .host_str()
                    .is_some_and(|host| host_allowed(host, &policy.allowed_domain))
        }
        Err(_) => false,
    }
}

fn host_allowed(host: &str, allowed: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let allowed = allowed.trim().to_ascii_lowercase();
    host == allowed
        || host
            .strip_suffix(allowed.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn check_host(host: &str, policy: &LinkSettings) -> Result<(), LinkError> {
    if host_allowed(host, &policy.allowed_domain) {
        Ok(())
    } else {
        Err(LinkError::HostNotAllowed {
            host: host.to_string(),
            allowed: policy.allowed_domain.clone(),
        })
    }
}

/// Decode standard or URL-safe base64, with or without padding.
pub(crate) fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = input
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

/// Decode the JSON body of a vmess link (everything after `vmess://`).
pub(crate) fn decode_vmess(body: &str) -> Result<Map<String, Value>, LinkError> {
    let malformed = |reason: String| LinkError::Malformed {
        protocol: Protocol::Vmess,
        reason,
    };
    let bytes = decode_base64(body).map_err(|e| malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))
}

/// Read a field that may be either a JSON number or a numeric string.
pub(crate) fn json_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a string field, treating JSON null and empty strings as absent.
pub(crate) fn json_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn parse_vmess(body: &str) -> Result<(String, u16, Option<String>), LinkError> {
    let json = decode_vmess(body)?;

    let host = json_str(&json, "add").ok_or(LinkError::MissingField {
        protocol: Protocol::Vmess,
        field: "add",
    })?;
    let port_value = json.get("port").ok_or(LinkError::MissingField {
        protocol: Protocol::Vmess,
        field: "port",
    })?;
    let port = json_number(port_value)
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .ok_or_else(|| LinkError::InvalidPort {
            protocol: Protocol::Vmess,
            value: port_value.to_string(),
        })?;
    let name = json_str(&json, "ps").map(str::to_string);

    Ok((host.to_string(), port, name))
}

pub(crate) fn parse_url(protocol: Protocol, link: &str) -> Result<Url, LinkError> {
    Url::parse(link).map_err(|e| LinkError::Malformed {
        protocol,
        reason: e.to_string(),
    })
}

fn url_host(protocol: Protocol, url: &Url) -> Result<String, LinkError> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or(LinkError::MissingField {
            protocol,
            field: "host",
        })
}

fn fragment_name(fragment: Option<&str>) -> Option<String> {
    fragment
        .filter(|f| !f.is_empty())
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
}

fn parse_url_link(protocol: Protocol, link: &str) -> Result<(String, u16, Option<String>), LinkError> {
    let url = parse_url(protocol, link)?;
    let host = url_host(protocol, &url)?;
    let port = url.port().filter(|p| *p > 0).unwrap_or(DEFAULT_TLS_PORT);
    Ok((host, port, fragment_name(url.fragment())))
}

fn parse_shadowsocks(link: &str, rest: &str) -> Result<(String, u16, Option<String>), LinkError> {
    let (body, fragment) = match rest.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (rest, None),
    };

    // ss://method:password@host:port or ss://BASE64(userinfo)@host:port
    if body.contains('@') {
        let url = parse_url(Protocol::Shadowsocks, link)?;
        let host = url_host(Protocol::Shadowsocks, &url)?;
        let port = url.port().filter(|p| *p > 0).unwrap_or(DEFAULT_SS_PORT);
        return Ok((host, port, fragment_name(fragment)));
    }

    // ss://BASE64(method:password@host:port)
    let decoded = decode_base64(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| LinkError::Malformed {
            protocol: Protocol::Shadowsocks,
            reason: "server info is not valid base64".to_string(),
        })?;
    let (_, server) = decoded.rsplit_once('@').ok_or(LinkError::MissingField {
        protocol: Protocol::Shadowsocks,
        field: "host",
    })?;
    let (host, port) = match server.split_once(':') {
        Some((host, port)) => (host, port.trim().parse().ok().filter(|p: &u16| *p > 0)),
        None => (server, None),
    };
    if host.is_empty() {
        return Err(LinkError::MissingField {
            protocol: Protocol::Shadowsocks,
            field: "host",
        });
    }

    Ok((
        host.to_string(),
        port.unwrap_or(DEFAULT_SS_PORT),
        fragment_name(fragment),
    ))
}
