//! Namespaces: named configuration domains and their in-memory state.
//!
//! A namespace is either a flat key/value set (`properties`) or a single raw
//! document (`json`, `yaml`, `yml`, `xml`, `txt`) stored under
//! [`CONTENT_KEY`](crate::CONTENT_KEY).

mod store;
pub use store::*;


use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Key/value content of one namespace
pub type KeyValues = HashMap<String, String>;

/// Serialization format of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceFormat {
    #[default]
    Properties,
    Xml,
    Json,
    Yml,
    Yaml,
    Txt,
}

impl NamespaceFormat {
    /// Infers the format from a trailing `.<ext>` naming a known format.
    ///
    /// Names such as `TEST.Namespace1` carry a dot without an extension and
    /// fall back to `Properties`; use `ClientConfig::namespace_formats` when a
    /// name is ambiguous.
    pub fn infer(namespace: &str) -> Self {
        namespace
            .rsplit_once('.')
            .and_then(|(stem, ext)| {
                if stem.is_empty() {
                    None
                } else {
                    ext.parse().ok()
                }
            })
            .unwrap_or_default()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            NamespaceFormat::Properties => "properties",
            NamespaceFormat::Xml => "xml",
            NamespaceFormat::Json => "json",
            NamespaceFormat::Yml => "yml",
            NamespaceFormat::Yaml => "yaml",
            NamespaceFormat::Txt => "txt",
        }
    }

    /// Raw formats keep the whole document under the content key.
    pub fn is_raw(&self) -> bool {
        !matches!(self, NamespaceFormat::Properties)
    }
}

impl FromStr for NamespaceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "properties" => Ok(NamespaceFormat::Properties),
            "xml" => Ok(NamespaceFormat::Xml),
            "json" => Ok(NamespaceFormat::Json),
            "yml" => Ok(NamespaceFormat::Yml),
            "yaml" => Ok(NamespaceFormat::Yaml),
            "txt" => Ok(NamespaceFormat::Txt),
            other => Err(format!("unknown namespace format: {other}")),
        }
    }
}

impl fmt::Display for NamespaceFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Name used on the wire: the service addresses properties namespaces
/// without their extension and every other format with it.
pub fn remote_namespace_name(namespace: &str) -> &str {
    namespace.strip_suffix(".properties").unwrap_or(namespace)
}
