//! Payload decoding property tests

use base64::Engine;
use citemigrate_core::decoder::{decode, decode_embedded_json};
use citemigrate_core::normalizer::normalize;
use citemigrate_core::synthesizer::chunk_instruction;
use proptest::prelude::*;
use serde_json::json;

fn encode(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text)
}

proptest! {
    #[test]
    fn decode_recovers_base64_payloads(title in "[A-Za-z ]{1,40}", year in 1000u32..2999) {
        let payload = json!({"Title": title, "Year": year.to_string()});
        let encoded = encode(&payload.to_string());

        prop_assert_eq!(decode(&encoded), Some(payload.clone()));
        prop_assert_eq!(decode(&format!("CitaviPlaceholder {}", encoded)), Some(payload));
    }

    #[test]
    fn decode_tolerates_wrapped_base64(title in "[a-z]{1,30}") {
        let payload = json!({"title": title});
        let encoded = encode(&payload.to_string());
        let wrapped: String = encoded
            .as_bytes()
            .chunks(8)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        prop_assert_eq!(decode(&wrapped), Some(payload));
    }

    #[test]
    fn decode_never_panics(text in "\\PC{0,200}") {
        let _ = decode(&text);
        let _ = decode_embedded_json(&text);
    }

    #[test]
    fn normalized_record_keeps_trimmed_title(title in "[A-Za-z]{1,20}", pad in " {0,3}") {
        let payload = json!({"Title": format!("{}{}{}", pad, title, pad)});
        let records = normalize(&payload);
        prop_assert_eq!(records.len(), 1);
        prop_assert_eq!(records[0].title.as_deref(), Some(title.as_str()));
    }

    #[test]
    fn chunks_rejoin_and_respect_size(text in "\\PC{0,600}", size in 1usize..300) {
        let chunks = chunk_instruction(&text, size);
        prop_assert_eq!(chunks.concat(), text);
        prop_assert!(chunks.iter().all(|c| c.chars().count() <= size));
    }
}

#[test]
fn test_embedded_json_inside_field_text() {
    let text = r#"ADDIN CitaviPlaceholder{"Title":"Embedded","Year":"2004"} trailing"#;
    assert_eq!(
        decode(text),
        Some(json!({"Title": "Embedded", "Year": "2004"}))
    );
}

#[test]
fn test_garbage_is_none() {
    assert_eq!(decode(""), None);
    assert_eq!(decode("   "), None);
    assert_eq!(decode("ADDIN CitaviPlaceholder"), None);
}
