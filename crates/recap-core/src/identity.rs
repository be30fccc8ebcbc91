//! Identity recipes: canonical JSON payloads and their SHA-256 fingerprints.
//!
//! Every identifier the engine derives (selection set ids, selection
//! fingerprints, grouping ids, window ids) is the lowercase hex SHA-256 of a
//! canonical JSON rendering of a small payload. Canonical means object keys
//! are sorted recursively and no whitespace is emitted, so the digest never
//! depends on how the payload was assembled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::Result;

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Payload identifying one selection set: a league week under one window.
pub fn selection_set_id_payload(
  league_id: &str,
  season: i64,
  week_index: i64,
  window_id: &str,
) -> Value {
  json!({
    "league_id":  league_id,
    "season":     season,
    "week_index": week_index,
    "window_id":  window_id,
  })
}

/// Payload over the final included/excluded sets of a selection.
///
/// Each array is sorted ascending on its own, so the resulting fingerprint is
/// invariant to the order in which signals were discovered upstream.
/// `excluded_reason_codes` is only present in the payload when supplied.
pub fn selection_fingerprint_payload<S: AsRef<str>>(
  included_signal_ids: &[S],
  excluded_signal_ids: &[S],
  excluded_reason_codes: Option<&[S]>,
) -> Value {
  let mut payload = Map::new();
  payload.insert(
    "included_signal_ids".into(),
    sorted_strings(included_signal_ids).into(),
  );
  payload.insert(
    "excluded_signal_ids".into(),
    sorted_strings(excluded_signal_ids).into(),
  );
  if let Some(codes) = excluded_reason_codes {
    payload.insert("excluded_reason_codes".into(), sorted_strings(codes).into());
  }
  Value::Object(payload)
}

/// Payload for a signal grouping id.
pub fn group_id_payload<S: AsRef<str>>(members: &[S]) -> Value {
  json!({ "members": sorted_strings(members) })
}

/// Payload for a resolved weekly window.
pub fn window_id_payload(
  league_id: &str,
  season: i64,
  week_index: i64,
  mode: &str,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> Value {
  json!({
    "league_id":    league_id,
    "season":       season,
    "week_index":   week_index,
    "window_mode":  mode,
    "window_start": start.to_rfc3339(),
    "window_end":   end.to_rfc3339(),
  })
}

fn sorted_strings<S: AsRef<str>>(items: &[S]) -> Vec<String> {
  let mut out: Vec<String> =
    items.iter().map(|s| s.as_ref().to_owned()).collect();
  out.sort();
  out
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// Render `payload` as canonical JSON bytes: keys sorted at every depth, no
/// insignificant whitespace.
///
/// Fails only when the payload cannot be represented as JSON (e.g. a map with
/// non-string keys).
pub fn canonical_json_bytes<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
  let value = serde_json::to_value(payload)?;
  Ok(serde_json::to_vec(&sort_keys(value))?)
}

/// SHA-256 over the canonical JSON of `payload`, as 64 lowercase hex chars.
pub fn compute_sha256_hex_from_payload<T: Serialize + ?Sized>(
  payload: &T,
) -> Result<String> {
  let bytes = canonical_json_bytes(payload)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Rebuild every object with its keys inserted in sorted order. Holds even
/// when `serde_json` is compiled with `preserve_order`.
fn sort_keys(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(String, Value)> = map.into_iter().collect();
      entries.sort_by(|(a, _), (b, _)| a.cmp(b));
      Value::Object(
        entries
          .into_iter()
          .map(|(k, v)| (k, sort_keys(v)))
          .collect(),
      )
    }
    Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  #[test]
  fn fingerprint_ignores_input_order() {
    let a = compute_sha256_hex_from_payload(&selection_fingerprint_payload(
      &["b", "a"],
      &["z", "y"],
      None,
    ))
    .unwrap();
    let b = compute_sha256_hex_from_payload(&selection_fingerprint_payload(
      &["a", "b"],
      &["y", "z"],
      None,
    ))
    .unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn fingerprint_payload_sorts_every_array() {
    let payload = selection_fingerprint_payload(
      &["b", "a"],
      &["z", "y"],
      Some(&["OUT_OF_WINDOW", "LOW_CONFIDENCE"][..]),
    );
    assert_eq!(payload["included_signal_ids"], json!(["a", "b"]));
    assert_eq!(payload["excluded_signal_ids"], json!(["y", "z"]));
    assert_eq!(
      payload["excluded_reason_codes"],
      json!(["LOW_CONFIDENCE", "OUT_OF_WINDOW"])
    );
  }

  #[test]
  fn reason_codes_key_absent_when_not_supplied() {
    let payload = selection_fingerprint_payload(&["a"], &[], None);
    assert!(payload.get("excluded_reason_codes").is_none());
  }

  #[test]
  fn reason_codes_change_the_fingerprint() {
    let without = compute_sha256_hex_from_payload(&selection_fingerprint_payload(
      &["a"],
      &["b"],
      None,
    ))
    .unwrap();
    let with = compute_sha256_hex_from_payload(&selection_fingerprint_payload(
      &["a"],
      &["b"],
      Some(&["LOW_CONFIDENCE"][..]),
    ))
    .unwrap();
    assert_ne!(without, with);
  }

  #[test]
  fn digest_is_64_lowercase_hex() {
    let digest =
      compute_sha256_hex_from_payload(&selection_set_id_payload("L1", 2024, 3, "w"))
        .unwrap();
    assert_eq!(digest.len(), 64);
    assert!(
      digest
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    );
  }

  #[test]
  fn key_order_does_not_change_the_digest() {
    let forward = json!({ "a": 1, "b": { "x": [1, 2], "y": "s" } });
    let mut reversed = Map::new();
    let mut inner = Map::new();
    inner.insert("y".into(), json!("s"));
    inner.insert("x".into(), json!([1, 2]));
    reversed.insert("b".into(), Value::Object(inner));
    reversed.insert("a".into(), json!(1));

    assert_eq!(
      compute_sha256_hex_from_payload(&forward).unwrap(),
      compute_sha256_hex_from_payload(&Value::Object(reversed)).unwrap()
    );
  }

  #[test]
  fn canonical_bytes_are_compact() {
    let bytes = canonical_json_bytes(&json!({ "b": 1, "a": [true, null] })).unwrap();
    assert_eq!(bytes, br#"{"a":[true,null],"b":1}"#);
  }

  #[test]
  fn non_string_map_keys_fail_loudly() {
    let mut bad: HashMap<(i32, i32), i32> = HashMap::new();
    bad.insert((1, 2), 3);
    assert!(compute_sha256_hex_from_payload(&bad).is_err());
  }

  #[test]
  fn selection_set_payload_is_deterministic() {
    assert_eq!(
      selection_set_id_payload("L1", 2024, 5, "wid"),
      selection_set_id_payload("L1", 2024, 5, "wid")
    );
  }
}
