//! Citavi payload recovery
//!
//! The instruction text format is undocumented and varies between Citavi
//! versions: sometimes a bare base64 blob, sometimes a format tag followed by
//! base64, sometimes plain JSON embedded in other text. Strategies are tried
//! in order and the first one that yields JSON wins.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

type Strategy = fn(&str) -> Option<Value>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("base64", decode_base64_json),
    ("tagged base64", decode_tagged_base64_json),
    ("embedded json", decode_embedded_json),
];

/// Recover the structured payload from instruction text
pub fn decode(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let value = strategy(text)?;
        tracing::trace!(strategy = name, "Decoded Citavi payload");
        Some(value)
    })
}

/// Whole text is base64 of UTF-8 JSON
pub fn decode_base64_json(text: &str) -> Option<Value> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = LENIENT_BASE64.decode(compact.as_bytes()).ok()?;
    serde_json::from_str(&String::from_utf8_lossy(&bytes)).ok()
}

/// A leading format tag, then base64
pub fn decode_tagged_base64_json(text: &str) -> Option<Value> {
    let (_, rest) = text.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    decode_base64_json(rest)
}

/// The span from the first `{` to the last `}`
pub fn decode_embedded_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
