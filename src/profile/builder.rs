//! Runtime document generation from stored connections.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::document::ASSET_DIR_KEY;
use crate::profile::link::{
    decode_base64, decode_vmess, json_number, json_str, parse_url, Connection, LinkError, Protocol,
};

/// Tag routing rules send proxied traffic to.
pub const SELECTED_TAG: &str = "outbound_selected";

/// Knobs for [`build_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Runtime log level.
    pub log_level: String,
    /// Local SOCKS inbound port.
    pub socks_port: u16,
    /// Local HTTP inbound port.
    pub http_port: u16,
    /// Emitted as the asset-directory hint when set.
    pub asset_dir: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            log_level: "warning".to_string(),
            socks_port: 10808,
            http_port: 10809,
            asset_dir: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("selected connection {0} is not in the connection list")]
    UnknownSelection(u64),

    #[error("connection {id}: {source}")]
    Link {
        id: u64,
        #[source]
        source: LinkError,
    },

    #[error("failed to serialize runtime document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Build the runtime JSON document for `connections`, routing through `selected_id`.
pub fn build_document(
    connections: &[Connection],
    selected_id: u64,
    options: &BuildOptions,
) -> Result<String, ProfileError> {
    if !connections.iter().any(|c| c.id == selected_id) {
        return Err(ProfileError::UnknownSelection(selected_id));
    }

    let mut outbounds = vec![
        json!({"protocol": "freedom", "tag": "direct"}),
        json!({"protocol": "blackhole", "tag": "blocked"}),
    ];
    for connection in connections {
        let tag = if connection.id == selected_id {
            SELECTED_TAG.to_string()
        } else {
            format!("outbound_{}", connection.id)
        };
        let outbound = outbound_for(connection, &tag).map_err(|source| ProfileError::Link {
            id: connection.id,
            source,
        })?;
        outbounds.push(outbound);
    }

    let mut document = json!({
        "log": {"loglevel": options.log_level},
        "dns": {
            "servers": ["https://1.1.1.1/dns-query", "https://8.8.8.8/dns-query"],
            "queryStrategy": "UseIP"
        },
        "routing": {
            "domainStrategy": "AsIs",
            "rules": [
                {"type": "field", "domain": ["geosite:category-ads-all"], "outboundTag": "blocked"},
                {"type": "field", "ip": ["geoip:private"], "outboundTag": "direct"},
                {"type": "field", "domain": ["geosite:private", "geosite:category-local"], "outboundTag": "direct"},
                {"type": "field", "domain": ["geosite:geolocation-!cn"], "outboundTag": SELECTED_TAG},
                {"type": "field", "network": "tcp,udp", "outboundTag": SELECTED_TAG}
            ]
        },
        "inbounds": [
            {
                "port": options.socks_port,
                "listen": "127.0.0.1",
                "protocol": "socks",
                "settings": {"auth": "noauth", "udp": true},
                "tag": "socks-in"
            },
            {
                "port": options.http_port,
                "listen": "127.0.0.1",
                "protocol": "http",
                "tag": "http-in"
            }
        ],
        "outbounds": outbounds
    });

    if let (Some(dir), Some(root)) = (&options.asset_dir, document.as_object_mut()) {
        root.insert(ASSET_DIR_KEY.to_string(), Value::String(dir.clone()));
    }

    tracing::debug!(
        connections = connections.len(),
        selected = selected_id,
        "Runtime document built"
    );
    Ok(serde_json::to_string_pretty(&document)?)
}

fn outbound_for(connection: &Connection, tag: &str) -> Result<Value, LinkError> {
    match connection.protocol {
        Protocol::Vmess => vmess_outbound(connection, tag),
        Protocol::Vless => vless_outbound(connection, tag),
        Protocol::Trojan => trojan_outbound(connection, tag),
        Protocol::Shadowsocks => shadowsocks_outbound(connection, tag),
    }
}

fn vmess_outbound(connection: &Connection, tag: &str) -> Result<Value, LinkError> {
    let body = connection
        .link
        .strip_prefix("vmess://")
        .unwrap_or(&connection.link);
    let vmess = decode_vmess(body)?;

    let address = json_str(&vmess, "add").unwrap_or(&connection.server_host);
    let port = vmess
        .get("port")
        .and_then(json_number)
        .unwrap_or(u64::from(connection.server_port));
    let alter_id = vmess.get("aid").and_then(json_number).unwrap_or(0);

    let mut stream = Map::new();
    stream.insert("network".into(), json!(json_str(&vmess, "net").unwrap_or("tcp")));
    if json_str(&vmess, "tls") == Some("tls") {
        let mut tls = Map::new();
        if let Some(sni) = json_str(&vmess, "sni") {
            tls.insert("serverName".into(), json!(sni));
        }
        stream.insert("security".into(), json!("tls"));
        stream.insert("tlsSettings".into(), Value::Object(tls));
    }

    Ok(json!({
        "protocol": "vmess",
        "tag": tag,
        "settings": {
            "vnext": [{
                "address": address,
                "port": port,
                "users": [{
                    "id": json_str(&vmess, "id").unwrap_or(""),
                    "alterId": alter_id,
                    "security": json_str(&vmess, "scy").unwrap_or("auto")
                }]
            }]
        },
        "streamSettings": stream
    }))
}

fn query_map(url: &url::Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn userinfo(url: &url::Url) -> String {
    percent_encoding::percent_decode_str(url.username())
        .decode_utf8_lossy()
        .into_owned()
}

fn vless_outbound(connection: &Connection, tag: &str) -> Result<Value, LinkError> {
    let url = parse_url(Protocol::Vless, &connection.link)?;
    let params = query_map(&url);
    let param = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.is_empty());

    let mut stream = Map::new();
    stream.insert("network".into(), json!(param("type").unwrap_or("tcp")));
    if let Some(security @ ("tls" | "reality")) = param("security") {
        stream.insert("security".into(), json!(security));
        stream.insert(
            "tlsSettings".into(),
            json!({"serverName": param("sni").unwrap_or(&connection.server_host)}),
        );
    }

    Ok(json!({
        "protocol": "vless",
        "tag": tag,
        "settings": {
            "vnext": [{
                "address": connection.server_host,
                "port": connection.server_port,
                "users": [{
                    "id": userinfo(&url),
                    "encryption": param("encryption").unwrap_or("none"),
                    "flow": param("flow").unwrap_or("")
                }]
            }]
        },
        "streamSettings": stream
    }))
}

fn trojan_outbound(connection: &Connection, tag: &str) -> Result<Value, LinkError> {
    let url = parse_url(Protocol::Trojan, &connection.link)?;
    let params = query_map(&url);
    let param = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.is_empty());

    Ok(json!({
        "protocol": "trojan",
        "tag": tag,
        "settings": {
            "servers": [{
                "address": connection.server_host,
                "port": connection.server_port,
                "password": userinfo(&url)
            }]
        },
        "streamSettings": {
            "network": param("type").unwrap_or("tcp"),
            "security": "tls",
            "tlsSettings": {"serverName": param("sni").unwrap_or(&connection.server_host)}
        }
    }))
}

fn split_method_password(credentials: &str) -> (String, String) {
    match credentials.split_once(':') {
        Some((method, password)) => (method.to_string(), password.to_string()),
        None => (credentials.to_string(), String::new()),
    }
}

fn shadowsocks_credentials(connection: &Connection) -> Result<(String, String), LinkError> {
    let body = connection
        .link
        .strip_prefix("ss://")
        .unwrap_or(&connection.link);
    let body = body.split('#').next().unwrap_or_default();

    if body.contains('@') {
        let url = parse_url(Protocol::Shadowsocks, &connection.link)?;
        let user = userinfo(&url);
        let password = url
            .password()
            .map(|p| percent_encoding::percent_decode_str(p).decode_utf8_lossy().into_owned());
        return Ok(match password {
            Some(password) => (user, password),
            // SIP002: userinfo is base64("method:password")
            None => match decode_base64(&user).ok().and_then(|b| String::from_utf8(b).ok()) {
                Some(decoded) => split_method_password(&decoded),
                None => (user, String::new()),
            },
        });
    }

    let decoded = decode_base64(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| LinkError::Malformed {
            protocol: Protocol::Shadowsocks,
            reason: "server info is not valid base64".to_string(),
        })?;
    let credentials = decoded
        .rsplit_once('@')
        .map(|(credentials, _)| credentials)
        .unwrap_or_default();
    Ok(split_method_password(credentials))
}

fn shadowsocks_outbound(connection: &Connection, tag: &str) -> Result<Value, LinkError> {
    let (method, password) = shadowsocks_credentials(connection)?;
    let method = if method.is_empty() {
        "aes-256-gcm".to_string()
    } else {
        method
    };

    Ok(json!({
        "protocol": "shadowsocks",
        "tag": tag,
        "settings": {
            "servers": [{
                "address": connection.server_host,
                "port": connection.server_port,
                "method": method,
                "password": password
            }]
        }
    }))
}
