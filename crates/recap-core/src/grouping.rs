//! Clustering of related signals into groupings by shared fact basis.
//!
//! Two signals are groupable when they share a scope key, a subject key, and
//! at least one fact-basis key. Groupings are the connected components of
//! that relation; only components with two or more members are emitted.
//! The output never depends on input order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  identity::{compute_sha256_hex_from_payload, group_id_payload},
  signal::SignalView,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupBasis {
  SharedFactBasis,
}

/// A cluster of at least two signals. Members are sorted ascending and the
/// id is derived from them, so equal member sets give equal groupings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrouping")]
pub struct SignalGrouping {
  group_id:    String,
  group_basis: GroupBasis,
  signal_ids:  Vec<String>,
}

impl SignalGrouping {
  pub fn new<I, S>(members: I, group_basis: GroupBasis) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let signal_ids: Vec<String> = members
      .into_iter()
      .map(Into::into)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    if signal_ids.len() < 2 {
      return Err(Error::GroupingTooSmall(signal_ids.len()));
    }
    let group_id = compute_sha256_hex_from_payload(&group_id_payload(signal_ids.as_slice()))?;
    Ok(Self { group_id, group_basis, signal_ids })
  }

  pub fn group_id(&self) -> &str { &self.group_id }

  pub fn group_basis(&self) -> GroupBasis { self.group_basis }

  pub fn signal_ids(&self) -> &[String] { &self.signal_ids }
}

/// Deserialisation goes back through [`SignalGrouping::new`]; a stored id
/// that does not match its members is refused.
#[derive(Deserialize)]
struct RawGrouping {
  group_id:    String,
  group_basis: GroupBasis,
  signal_ids:  Vec<String>,
}

impl TryFrom<RawGrouping> for SignalGrouping {
  type Error = Error;

  fn try_from(raw: RawGrouping) -> Result<Self> {
    let grouping = SignalGrouping::new(raw.signal_ids, raw.group_basis)?;
    if grouping.group_id != raw.group_id {
      return Err(Error::InconsistentState(format!(
        "grouping id {} does not match its members",
        raw.group_id
      )));
    }
    Ok(grouping)
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Cluster `signals` into groupings.
///
/// Signals without an id, scope key, or subject key never group. Duplicate
/// ids within one (scope, subject) bucket are treated as one signal.
pub fn build_signal_groupings<S: SignalView>(signals: &[S]) -> Result<Vec<SignalGrouping>> {
  // (scope, subject) → signal id → fact-basis keys
  let mut buckets: BTreeMap<(&str, &str), BTreeMap<&str, BTreeSet<&str>>> =
    BTreeMap::new();

  for signal in signals {
    let (Some(id), Some(scope), Some(subject)) =
      (signal.signal_id(), signal.scope_key(), signal.subject_key())
    else {
      continue;
    };
    buckets
      .entry((scope, subject))
      .or_default()
      .entry(id)
      .or_default()
      .extend(signal.fact_basis_keys());
  }

  let mut groupings = Vec::new();
  for members in buckets.values() {
    for component in connected_components(members) {
      if component.len() >= 2 {
        groupings.push(SignalGrouping::new(component, GroupBasis::SharedFactBasis)?);
      }
    }
  }

  groupings.sort_by(|a, b| a.signal_ids.cmp(&b.signal_ids));
  Ok(groupings)
}

/// Union signals that share any fact-basis key. Each component comes back
/// as a sorted list of ids.
fn connected_components<'a>(
  members: &BTreeMap<&'a str, BTreeSet<&'a str>>,
) -> Vec<Vec<&'a str>> {
  let ids: Vec<&str> = members.keys().copied().collect();
  let mut parent: Vec<usize> = (0..ids.len()).collect();

  let mut owner_of_key: BTreeMap<&str, usize> = BTreeMap::new();
  for (index, keys) in members.values().enumerate() {
    for &key in keys {
      match owner_of_key.get(key) {
        Some(&owner) => union(&mut parent, owner, index),
        None => {
          owner_of_key.insert(key, index);
        }
      }
    }
  }

  let mut components: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
  for index in 0..ids.len() {
    let root = find(&mut parent, index);
    components.entry(root).or_default().push(ids[index]);
  }
  components.into_values().collect()
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
  while parent[node] != node {
    parent[node] = parent[parent[node]];
    node = parent[node];
  }
  node
}

fn union(parent: &mut [usize], a: usize, b: usize) {
  let (ra, rb) = (find(parent, a), find(parent, b));
  if ra != rb {
    // Smaller index wins so roots are stable across runs.
    let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
    parent[hi] = lo;
  }
}

#[cfg(test)]
mod tests {
  use serde_json::{Value, json};

  use super::*;
  use crate::signal::Signal;

  fn sig(id: &str, scope: &str, subject: &str, basis: &[&str]) -> Value {
    json!({
      "signal_id": id,
      "scope_key": scope,
      "subject_key": subject,
      "fact_basis_keys": basis,
    })
  }

  #[test]
  fn single_signal_yields_nothing() {
    let groups = build_signal_groupings(&[sig("s1", "L", "T1", &["f1"])]).unwrap();
    assert!(groups.is_empty());
  }

  #[test]
  fn differing_scope_subject_or_basis_yields_nothing() {
    let cases = [
      [sig("s1", "L", "T1", &["f1"]), sig("s2", "M", "T1", &["f1"])],
      [sig("s1", "L", "T1", &["f1"]), sig("s2", "L", "T2", &["f1"])],
      [sig("s1", "L", "T1", &["f1"]), sig("s2", "L", "T1", &["f2"])],
    ];
    for case in cases {
      assert!(build_signal_groupings(&case).unwrap().is_empty());
    }
  }

  #[test]
  fn shared_fact_basis_groups_sorted_members() {
    let groups = build_signal_groupings(&[
      sig("s2", "L", "T1", &["f1", "f9"]),
      sig("s1", "L", "T1", &["f1"]),
    ])
    .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].signal_ids(), ["s1", "s2"]);
    assert_eq!(groups[0].group_basis(), GroupBasis::SharedFactBasis);
    assert_eq!(groups[0].group_id().len(), 64);
  }

  #[test]
  fn grouping_is_transitive() {
    // s1–s2 share f1, s2–s3 share f2; s1 and s3 share nothing directly.
    let groups = build_signal_groupings(&[
      sig("s1", "L", "T1", &["f1"]),
      sig("s2", "L", "T1", &["f1", "f2"]),
      sig("s3", "L", "T1", &["f2"]),
      sig("s4", "L", "T1", &["f7"]),
    ])
    .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].signal_ids(), ["s1", "s2", "s3"]);
  }

  #[test]
  fn order_does_not_matter() {
    let mut signals = vec![
      sig("a", "L", "T1", &["f1"]),
      sig("b", "L", "T1", &["f1"]),
      sig("c", "L", "T2", &["f3"]),
      sig("d", "L", "T2", &["f3", "f4"]),
      sig("e", "L", "T2", &["f4"]),
      sig("f", "L", "T3", &["f5"]),
    ];
    let forward = build_signal_groupings(&signals).unwrap();
    signals.reverse();
    let reversed = build_signal_groupings(&signals).unwrap();

    assert_eq!(forward, reversed);
    assert_eq!(forward.len(), 2);
    assert!(forward.iter().all(|g| g.group_id().len() == 64));
  }

  #[test]
  fn group_id_is_hash_of_members() {
    let groups = build_signal_groupings(&[
      sig("x", "L", "T", &["f"]),
      sig("y", "L", "T", &["f"]),
    ])
    .unwrap();
    let expected =
      compute_sha256_hex_from_payload(&json!({ "members": ["x", "y"] })).unwrap();
    assert_eq!(groups[0].group_id(), expected);
  }

  #[test]
  fn missing_keys_never_group() {
    let groups = build_signal_groupings(&[
      json!({ "signal_id": "s1", "fact_basis_keys": ["f1"] }),
      json!({ "signal_id": "s2", "fact_basis_keys": ["f1"] }),
    ])
    .unwrap();
    assert!(groups.is_empty());
  }

  #[test]
  fn struct_backed_signals_group_too() {
    let make = |id: &str| Signal {
      signal_id:              id.into(),
      signal_type:            "TRADE_COMPLETED".into(),
      taxonomy_category:      "TRANSACTIONS".into(),
      derived_from_event_ids: vec!["e1".into()],
      scope_key:              Some("L".into()),
      subject_key:            Some("T".into()),
      fact_basis_keys:        vec!["trade:1".into()],
      confidence:             None,
      lineage_complete:       true,
      in_window:              true,
    };
    let groups = build_signal_groupings(&[make("b"), make("a")]).unwrap();
    assert_eq!(groups[0].signal_ids(), ["a", "b"]);
  }

  #[test]
  fn constructor_rejects_singletons() {
    assert!(matches!(
      SignalGrouping::new(["only"], GroupBasis::SharedFactBasis),
      Err(Error::GroupingTooSmall(1))
    ));
    assert!(matches!(
      SignalGrouping::new(["dup", "dup"], GroupBasis::SharedFactBasis),
      Err(Error::GroupingTooSmall(1))
    ));
  }

  #[test]
  fn deserialisation_validates_the_id() {
    let good = SignalGrouping::new(["a", "b"], GroupBasis::SharedFactBasis).unwrap();
    let json = serde_json::to_value(&good).unwrap();
    let back: SignalGrouping = serde_json::from_value(json.clone()).unwrap();
    assert_eq!(back, good);

    let mut tampered = json;
    tampered["group_id"] = json!("0".repeat(64));
    assert!(serde_json::from_value::<SignalGrouping>(tampered).is_err());
  }
}
