//! Inbound webhook payload: items to forward and an optional sender.
//!
//! The webhook body is loosely shaped JSON, so every field is decoded leniently: a wrong
//! type degrades to "absent" (or an empty list) instead of rejecting the whole delivery.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// One webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundPayload {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub items: Vec<InboundItem>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: Option<String>,
}

/// One post (image, video, reel, carousel...) from the source platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundItem {
    /// Unchecked type label; see [`crate::classify::classify`].
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub media: Vec<MediaRef>,
}

/// A single remote media resource. Unusable without a url.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaRef {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

impl InboundPayload {
    /// Decode an already-parsed JSON body. Anything that is not an object yields an empty payload.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

impl InboundItem {
    /// Media entries that carry a url, in source order.
    pub fn usable_media(&self) -> impl Iterator<Item = (&MediaRef, &str)> {
        self.media
            .iter()
            .filter_map(|m| m.url.as_deref().map(|url| (m, url)))
    }
}

impl MediaRef {
    pub fn is_video(&self) -> bool {
        self.kind.as_deref() == Some("video")
    }

    /// True when the entry's own type is `expected` or missing.
    pub fn matches_or_untyped(&self, expected: &str) -> bool {
        match self.kind.as_deref() {
            None => true,
            Some(k) => k == expected,
        }
    }
}

/// Strings pass through, numbers are stringified; null, bool, containers and "" are absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Non-arrays become empty; elements that do not decode (e.g. null) are dropped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(entries) => entries
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}
