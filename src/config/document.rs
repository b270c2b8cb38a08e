//! Runtime configuration document.
//!
//! # Responsibilities
//! - Best-effort extraction of the asset-directory hint
//! - Typed view of the proxy runtime's JSON document
//! - Structural checks before the document reaches the runtime
//!
//! # Design Decisions
//! - Only the sections the controller and profile builder touch are typed;
//!   everything else round-trips through `extra`
//! - Hint extraction never fails; loading does

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::runtime::ConfigLoader;

/// Document key carrying the asset-directory hint.
pub const ASSET_DIR_KEY: &str = "gozarAssetDir";

#[derive(Deserialize)]
struct AssetHint {
    #[serde(rename = "gozarAssetDir", default)]
    asset_dir: Option<String>,
}

/// Pull the asset-directory hint out of a document.
///
/// Malformed documents, a missing key, a non-string value and an empty
/// string all yield `None`.
pub fn asset_hint(document: &str) -> Option<PathBuf> {
    let hint: AssetHint = serde_json::from_str(document).ok()?;
    hint.asset_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// Typed subset of the runtime document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RuntimeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingSection>,

    #[serde(default)]
    pub inbounds: Vec<Inbound>,

    #[serde(default)]
    pub outbounds: Vec<Outbound>,

    #[serde(rename = "gozarAssetDir", default, skip_serializing_if = "Option::is_none")]
    pub asset_dir: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LogSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RoutingSection {
    #[serde(rename = "domainStrategy", default, skip_serializing_if = "Option::is_none")]
    pub domain_strategy: Option<String>,

    #[serde(default)]
    pub rules: Vec<RoutingRule>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RoutingRule {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<String>,

    #[serde(rename = "outboundTag", default, skip_serializing_if = "Option::is_none")]
    pub outbound_tag: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Inbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Port number, or a string such as `"1080"` or `"1000-2000"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Outbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,

    #[serde(rename = "streamSettings", default, skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reasons a document cannot be turned into a descriptor.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid runtime document: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("runtime document has no outbounds")]
    NoOutbounds,

    #[error("duplicate {kind} tag '{tag}'")]
    DuplicateTag { kind: &'static str, tag: String },

    #[error("inbound #{index} has invalid port {value}")]
    InvalidPort { index: usize, value: String },

    #[error("routing rule #{index} targets unknown outbound '{tag}'")]
    UnknownRouteTarget { index: usize, tag: String },
}

impl RuntimeDocument {
    /// Parse without structural checks.
    pub fn parse(document: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Structural checks the runtime would otherwise fail on later.
    pub fn check(&self) -> Result<(), DocumentError> {
        if self.outbounds.is_empty() {
            return Err(DocumentError::NoOutbounds);
        }

        let outbound_tags = unique_tags("outbound", self.outbounds.iter().map(|o| o.tag.as_deref()))?;
        unique_tags("inbound", self.inbounds.iter().map(|i| i.tag.as_deref()))?;

        for (index, inbound) in self.inbounds.iter().enumerate() {
            if let Some(port) = &inbound.port {
                if !is_valid_port(port) {
                    return Err(DocumentError::InvalidPort {
                        index,
                        value: port.to_string(),
                    });
                }
            }
        }

        if let Some(routing) = &self.routing {
            for (index, rule) in routing.rules.iter().enumerate() {
                if let Some(tag) = &rule.outbound_tag {
                    if !outbound_tags.contains(tag.as_str()) {
                        return Err(DocumentError::UnknownRouteTarget {
                            index,
                            tag: tag.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Outbound tags in declaration order.
    pub fn outbound_tags(&self) -> impl Iterator<Item = &str> {
        self.outbounds.iter().filter_map(|o| o.tag.as_deref())
    }
}

fn unique_tags<'a>(
    kind: &'static str,
    tags: impl Iterator<Item = Option<&'a str>>,
) -> Result<HashSet<&'a str>, DocumentError> {
    let mut seen = HashSet::new();
    for tag in tags.flatten() {
        if !seen.insert(tag) {
            return Err(DocumentError::DuplicateTag {
                kind,
                tag: tag.to_string(),
            });
        }
    }
    Ok(seen)
}

fn is_valid_port(value: &Value) -> bool {
    fn single(s: &str) -> bool {
        matches!(s.trim().parse::<u16>(), Ok(p) if p > 0)
    }

    match value {
        Value::Number(n) => matches!(n.as_u64(), Some(p) if (1..=65535).contains(&p)),
        Value::String(s) => match s.split_once('-') {
            Some((lo, hi)) => single(lo) && single(hi),
            None => single(s),
        },
        _ => false,
    }
}

/// Loads runtime documents as JSON and checks their structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl ConfigLoader for DocumentLoader {
    type Descriptor = RuntimeDocument;
    type Error = DocumentError;

    fn load(&self, document: &str) -> Result<RuntimeDocument, DocumentError> {
        let parsed = RuntimeDocument::parse(document)?;
        parsed.check()?;
        tracing::debug!(
            inbounds = parsed.inbounds.len(),
            outbounds = parsed.outbounds.len(),
            "Runtime document loaded"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hint_present() {
        assert_eq!(
            asset_hint(r#"{"gozarAssetDir":"/opt/assets"}"#),
            Some(PathBuf::from("/opt/assets"))
        );
    }

    #[test]
    fn hint_absent_empty_or_malformed() {
        assert_eq!(asset_hint("{}"), None);
        assert_eq!(asset_hint(r#"{"gozarAssetDir":""}"#), None);
        assert_eq!(asset_hint(r#"{"gozarAssetDir":42}"#), None);
        assert_eq!(asset_hint("not json at all"), None);
        assert_eq!(asset_hint("[1,2,3]"), None);
        assert_eq!(asset_hint(""), None);
    }

    #[test]
    fn hint_ignores_other_fields() {
        let doc = json!({
            "log": {"loglevel": "warning"},
            "outbounds": [{"protocol": "freedom"}],
            "gozarAssetDir": "/data/geo"
        })
        .to_string();
        assert_eq!(asset_hint(&doc), Some(PathBuf::from("/data/geo")));
    }

    fn minimal() -> Value {
        json!({
            "inbounds": [{"tag": "socks-in", "protocol": "socks", "port": 10808}],
            "outbounds": [
                {"tag": "direct", "protocol": "freedom"},
                {"tag": "blocked", "protocol": "blackhole"}
            ],
            "routing": {"rules": [{"type": "field", "ip": ["geoip:private"], "outboundTag": "direct"}]}
        })
    }

    #[test]
    fn loads_minimal_document() {
        let doc = DocumentLoader.load(&minimal().to_string()).unwrap();
        assert_eq!(doc.outbound_tags().collect::<Vec<_>>(), vec!["direct", "blocked"]);
        assert_eq!(doc.inbounds[0].protocol, "socks");
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let mut value = minimal();
        value["policy"] = json!({"levels": {"0": {"handshake": 4}}});
        value["outbounds"][0]["mux"] = json!({"enabled": false});

        let doc = DocumentLoader.load(&value.to_string()).unwrap();
        assert!(doc.extra.contains_key("policy"));
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["outbounds"][0]["mux"]["enabled"], json!(false));
    }

    #[test]
    fn syntax_error() {
        let err = DocumentLoader.load("{not json").unwrap_err();
        assert!(matches!(err, DocumentError::Syntax(_)));
    }

    #[test]
    fn empty_object_has_no_outbounds() {
        let err = DocumentLoader.load("{}").unwrap_err();
        assert!(matches!(err, DocumentError::NoOutbounds));
    }

    #[test]
    fn duplicate_outbound_tag() {
        let mut value = minimal();
        value["outbounds"][1]["tag"] = json!("direct");
        let err = DocumentLoader.load(&value.to_string()).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateTag { kind: "outbound", .. }));
    }

    #[test]
    fn port_checks() {
        assert!(is_valid_port(&json!(443)));
        assert!(is_valid_port(&json!("1080")));
        assert!(is_valid_port(&json!("1000-2000")));
        assert!(!is_valid_port(&json!(0)));
        assert!(!is_valid_port(&json!(70000)));
        assert!(!is_valid_port(&json!("http")));
        assert!(!is_valid_port(&json!(true)));

        let mut value = minimal();
        value["inbounds"][0]["port"] = json!(0);
        let err = DocumentLoader.load(&value.to_string()).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidPort { index: 0, .. }));
    }

    #[test]
    fn route_to_missing_outbound() {
        let mut value = minimal();
        value["routing"]["rules"][0]["outboundTag"] = json!("outbound_selected");
        let err = DocumentLoader.load(&value.to_string()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "routing rule #0 targets unknown outbound 'outbound_selected'"
        );
    }
}
