//! Selection of signals for a league week, content-addressed by fingerprint.
//!
//! Raw records pass the taxonomy, then the selection policy. Every accepted
//! signal ends up either included or excluded with exactly one reason code.
//! The fingerprint is computed over the final sets, so rebuilding from the
//! same records in any order gives the same fingerprint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Result,
  grouping::{SignalGrouping, build_signal_groupings},
  identity::{
    compute_sha256_hex_from_payload, selection_fingerprint_payload,
    selection_set_id_payload,
  },
  signal::{ConfidenceTier, SelectableSignal, SignalView},
  taxonomy::{EnforcementResult, SignalTaxonomyEnforcer},
  window::ResolvedWindow,
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Which taxonomy-valid signals make it into a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
  /// Weakest confidence tier still included. Signals without a tier are
  /// excluded.
  pub min_confidence:           ConfidenceTier,
  pub require_complete_lineage: bool,
}

impl Default for SelectionPolicy {
  fn default() -> Self {
    Self {
      min_confidence:           ConfidenceTier::B,
      require_complete_lineage: true,
    }
  }
}

impl SelectionPolicy {
  /// The single reason a signal is excluded, or `None` if it is included.
  /// Checked in order: window, lineage, confidence.
  pub fn exclusion_for<S: SelectableSignal>(&self, signal: &S) -> Option<ExclusionReason> {
    if !signal.in_window() {
      return Some(ExclusionReason::OutOfWindow);
    }
    if self.require_complete_lineage && !signal.lineage_complete() {
      return Some(ExclusionReason::IncompleteLineage);
    }
    match signal.confidence() {
      Some(tier) if tier.meets(self.min_confidence) => None,
      _ => Some(ExclusionReason::LowConfidence),
    }
  }
}

// ─── Selection types ─────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExclusionReason {
  OutOfWindow,
  IncompleteLineage,
  LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSignal {
  pub signal_id:   String,
  pub reason_code: ExclusionReason,
}

/// The signals chosen for one league week under one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
  pub selection_set_id:      String,
  pub league_id:             String,
  pub season:                i64,
  pub week_index:            i64,
  pub window_id:             String,
  /// Sorted ascending, no duplicates.
  pub included_signal_ids:   Vec<String>,
  /// Sorted by signal id.
  pub excluded:              Vec<ExcludedSignal>,
  pub selection_fingerprint: String,
  /// Computed over included signals only.
  pub groupings:             Vec<SignalGrouping>,
}

impl SelectionSet {
  pub fn included_count(&self) -> usize { self.included_signal_ids.len() }
}

/// A selection together with the taxonomy verdicts that preceded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOutcome {
  pub selection_set: SelectionSet,
  pub taxonomy:      EnforcementResult,
}

// ─── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SelectionSetBuilder {
  enforcer: SignalTaxonomyEnforcer,
  policy:   SelectionPolicy,
}

impl SelectionSetBuilder {
  pub fn new(enforcer: SignalTaxonomyEnforcer, policy: SelectionPolicy) -> Self {
    Self { enforcer, policy }
  }

  /// Build the selection for `window` from raw signal records.
  ///
  /// When the same signal id appears more than once, the first occurrence
  /// that passes the taxonomy decides its fate.
  pub fn build(&self, window: &ResolvedWindow, signals: &[Value]) -> Result<SelectionOutcome> {
    let (taxonomy, accepted) = self.enforcer.partition(signals);

    let mut seen = BTreeSet::new();
    let mut included: Vec<&Value> = Vec::new();
    let mut excluded: Vec<ExcludedSignal> = Vec::new();

    for signal in accepted {
      // Accepted records always carry an id.
      let Some(id) = signal.signal_id() else { continue };
      if !seen.insert(id) {
        continue;
      }
      match self.policy.exclusion_for(&signal) {
        None => included.push(signal),
        Some(reason_code) => excluded.push(ExcludedSignal {
          signal_id: id.to_owned(),
          reason_code,
        }),
      }
    }

    let mut included_signal_ids: Vec<String> = included
      .iter()
      .filter_map(|s| s.signal_id())
      .map(str::to_owned)
      .collect();
    included_signal_ids.sort();
    excluded.sort_by(|a, b| a.signal_id.cmp(&b.signal_id));

    let excluded_ids: Vec<String> =
      excluded.iter().map(|e| e.signal_id.clone()).collect();
    let reason_codes: Vec<String> =
      excluded.iter().map(|e| e.reason_code.to_string()).collect();

    let selection_fingerprint = compute_sha256_hex_from_payload(
      &selection_fingerprint_payload(
        included_signal_ids.as_slice(),
        excluded_ids.as_slice(),
        Some(reason_codes.as_slice()),
      ),
    )?;
    let selection_set_id = compute_sha256_hex_from_payload(&selection_set_id_payload(
      &window.league_id,
      window.season,
      window.week_index,
      &window.window_id,
    ))?;
    let groupings = build_signal_groupings(&included)?;

    tracing::info!(
      league_id = %window.league_id,
      season = window.season,
      week_index = window.week_index,
      accepted = taxonomy.accepted_ids.len(),
      rejected = taxonomy.rejected.len(),
      included = included_signal_ids.len(),
      excluded = excluded.len(),
      groupings = groupings.len(),
      fingerprint = %selection_fingerprint,
      "selection built"
    );

    Ok(SelectionOutcome {
      selection_set: SelectionSet {
        selection_set_id,
        league_id: window.league_id.clone(),
        season: window.season,
        week_index: window.week_index,
        window_id: window.window_id.clone(),
        included_signal_ids,
        excluded,
        selection_fingerprint,
        groupings,
      },
      taxonomy,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  use super::*;
  use crate::{
    taxonomy::{RejectionReason, TaxonomyAuthority},
    window::WindowMode,
  };

  fn builder() -> SelectionSetBuilder {
    SelectionSetBuilder::new(
      SignalTaxonomyEnforcer::new(TaxonomyAuthority::new([
        ("TRADE_COMPLETED", "TRANSACTIONS"),
        ("MATCHUP_UPSET", "MATCHUP_RESULTS"),
      ])),
      SelectionPolicy::default(),
    )
  }

  fn window() -> ResolvedWindow {
    ResolvedWindow {
      league_id:  "L1".into(),
      season:     2024,
      week_index: 3,
      window_id:  "w".repeat(64),
      start:      Utc.with_ymd_and_hms(2024, 9, 19, 0, 0, 0).unwrap(),
      end:        Utc.with_ymd_and_hms(2024, 9, 26, 0, 0, 0).unwrap(),
      mode:       WindowMode::LockToLock,
    }
  }

  fn signal(id: &str, confidence: &str, in_window: bool, basis: &str) -> Value {
    json!({
      "signal_id": id,
      "signal_type": "TRADE_COMPLETED",
      "taxonomy_category": "TRANSACTIONS",
      "derived_from_event_ids": [format!("evt-{id}")],
      "scope_key": "league:L1",
      "subject_key": "team:1",
      "fact_basis_keys": [basis],
      "confidence": confidence,
      "lineage_complete": true,
      "in_window": in_window,
    })
  }

  #[test]
  fn partitions_included_and_excluded() {
    let signals = vec![
      signal("s3", "A", true, "f1"),
      signal("s1", "B", true, "f1"),
      signal("s2", "C", true, "f2"),
      signal("s4", "A", false, "f3"),
    ];
    let outcome = builder().build(&window(), &signals).unwrap();
    let set = outcome.selection_set;

    assert_eq!(set.included_signal_ids, vec!["s1", "s3"]);
    assert_eq!(set.excluded, vec![
      ExcludedSignal {
        signal_id:   "s2".into(),
        reason_code: ExclusionReason::LowConfidence,
      },
      ExcludedSignal {
        signal_id:   "s4".into(),
        reason_code: ExclusionReason::OutOfWindow,
      },
    ]);
    assert_eq!(set.selection_fingerprint.len(), 64);
    assert_eq!(set.groupings.len(), 1);
    assert_eq!(set.groupings[0].signal_ids(), ["s1", "s3"]);
  }

  #[test]
  fn fingerprint_ignores_input_order() {
    let mut signals = vec![
      signal("a", "A", true, "f1"),
      signal("b", "C", true, "f1"),
      signal("c", "B", false, "f2"),
      signal("d", "B", true, "f2"),
    ];
    let forward = builder().build(&window(), &signals).unwrap();
    signals.reverse();
    let reversed = builder().build(&window(), &signals).unwrap();
    assert_eq!(forward.selection_set, reversed.selection_set);
  }

  #[test]
  fn fingerprint_tracks_the_final_sets() {
    let base = builder()
      .build(&window(), &[signal("a", "A", true, "f1")])
      .unwrap();
    let more = builder()
      .build(&window(), &[signal("a", "A", true, "f1"), signal("b", "C", true, "f2")])
      .unwrap();
    assert_ne!(
      base.selection_set.selection_fingerprint,
      more.selection_set.selection_fingerprint
    );
  }

  #[test]
  fn taxonomy_rejections_stay_out_of_the_selection() {
    let mut event = signal("e1", "A", true, "f1");
    event["event_id"] = json!("raw-1");
    let outcome = builder()
      .build(&window(), &[event, signal("s1", "A", true, "f1")])
      .unwrap();

    assert_eq!(outcome.selection_set.included_signal_ids, vec!["s1"]);
    assert!(outcome.selection_set.excluded.is_empty());
    assert_eq!(
      outcome.taxonomy.rejected[0].reason,
      RejectionReason::EventObjectNotASignal
    );
  }

  #[test]
  fn duplicate_ids_are_included_once() {
    let outcome = builder()
      .build(&window(), &[signal("s1", "A", true, "f1"), signal("s1", "A", true, "f1")])
      .unwrap();
    assert_eq!(outcome.selection_set.included_signal_ids, vec!["s1"]);
    assert!(outcome.selection_set.groupings.is_empty());
  }

  #[test]
  fn incomplete_lineage_is_excluded_when_required() {
    let mut partial = signal("s1", "A", true, "f1");
    partial["lineage_complete"] = json!(false);

    let strict = builder().build(&window(), &[partial.clone()]).unwrap();
    assert_eq!(
      strict.selection_set.excluded[0].reason_code,
      ExclusionReason::IncompleteLineage
    );

    let lenient = SelectionSetBuilder::new(
      builder().enforcer.clone(),
      SelectionPolicy {
        require_complete_lineage: false,
        ..SelectionPolicy::default()
      },
    );
    let outcome = lenient.build(&window(), &[partial]).unwrap();
    assert_eq!(outcome.selection_set.included_signal_ids, vec!["s1"]);
  }

  #[test]
  fn missing_confidence_is_low_confidence() {
    let mut unrated = signal("s1", "A", true, "f1");
    unrated.as_object_mut().unwrap().remove("confidence");
    let outcome = builder().build(&window(), &[unrated]).unwrap();
    assert_eq!(
      outcome.selection_set.excluded[0].reason_code,
      ExclusionReason::LowConfidence
    );
  }

  #[test]
  fn selection_set_id_depends_on_window_only() {
    let a = builder().build(&window(), &[signal("a", "A", true, "f")]).unwrap();
    let b = builder().build(&window(), &[]).unwrap();
    assert_eq!(a.selection_set.selection_set_id, b.selection_set.selection_set_id);
    assert_ne!(
      a.selection_set.selection_fingerprint,
      b.selection_set.selection_fingerprint
    );
  }

  #[test]
  fn typed_signals_select_like_raw_records() {
    use crate::signal::{ConfidenceTier, Signal};

    let typed = |id: &str, confidence: ConfidenceTier| Signal {
      signal_id:              id.into(),
      signal_type:            "TRADE_COMPLETED".into(),
      taxonomy_category:      "TRANSACTIONS".into(),
      derived_from_event_ids: vec![format!("evt-{id}")],
      scope_key:              Some("league:L1".into()),
      subject_key:            Some("team:1".into()),
      fact_basis_keys:        vec!["f1".into()],
      confidence:             Some(confidence),
      lineage_complete:       true,
      in_window:              true,
    };
    let records = [typed("s1", ConfidenceTier::A), typed("s2", ConfidenceTier::C)]
      .iter()
      .map(Signal::to_json)
      .collect::<crate::Result<Vec<_>>>()
      .unwrap();

    let from_typed = builder().build(&window(), &records).unwrap();
    let from_raw = builder()
      .build(&window(), &[signal("s1", "A", true, "f1"), signal("s2", "C", true, "f1")])
      .unwrap();
    assert_eq!(from_typed.selection_set.included_signal_ids, vec!["s1"]);
    assert_eq!(from_typed, from_raw);
  }
}
