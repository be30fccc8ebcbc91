//! Fail-closed taxonomy enforcement over raw signal records.
//!
//! The authority is a fixed `signal_type → taxonomy_category` map, built once
//! at start-up and passed in explicitly. Every record is checked in a fixed
//! order and the first failing check decides the rejection reason. Anything
//! the enforcer does not recognise is rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

// ─── Authority ───────────────────────────────────────────────────────────────

/// The closed set of valid signal types and the single category each belongs
/// to. Immutable after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyAuthority {
  category_by_type: BTreeMap<String, String>,
}

impl TaxonomyAuthority {
  pub fn new<I, T, C>(entries: I) -> Self
  where
    I: IntoIterator<Item = (T, C)>,
    T: Into<String>,
    C: Into<String>,
  {
    Self {
      category_by_type: entries
        .into_iter()
        .map(|(t, c)| (t.into(), c.into()))
        .collect(),
    }
  }

  pub fn category_for(&self, signal_type: &str) -> Option<&str> {
    self.category_by_type.get(signal_type).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool { self.category_by_type.is_empty() }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Why a record was refused. The string forms are persisted and matched by
/// downstream tooling; do not rename them.
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
pub enum RejectionReason {
  MissingSignalType,
  UnknownSignalType,
  MissingDerivationLineage,
  EventObjectNotASignal,
  CategoryNotExactlyOne,
  CategoryMismatchForType,
  MissingSignalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRejection {
  /// Present whenever the record carried a readable id.
  pub signal_id: Option<String>,
  pub reason:    RejectionReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementResult {
  /// Ids of accepted signals, in input order.
  pub accepted_ids: Vec<String>,
  pub rejected:     Vec<TaxonomyRejection>,
}

// ─── Enforcer ────────────────────────────────────────────────────────────────

/// Validates raw signal records against a [`TaxonomyAuthority`].
#[derive(Debug, Clone)]
pub struct SignalTaxonomyEnforcer {
  authority: TaxonomyAuthority,
}

impl SignalTaxonomyEnforcer {
  pub fn new(authority: TaxonomyAuthority) -> Self { Self { authority } }

  pub fn authority(&self) -> &TaxonomyAuthority { &self.authority }

  /// Check every record; never aborts the batch.
  pub fn enforce(&self, signals: &[Value]) -> EnforcementResult {
    self.partition(signals).0
  }

  /// Like [`enforce`](Self::enforce), also handing back the accepted records
  /// themselves in input order.
  pub fn partition<'a>(&self, signals: &'a [Value]) -> (EnforcementResult, Vec<&'a Value>) {
    let mut result = EnforcementResult::default();
    let mut accepted = Vec::new();
    for signal in signals {
      match self.check(signal) {
        Ok(id) => {
          result.accepted_ids.push(id);
          accepted.push(signal);
        }
        Err(reason) => {
          tracing::debug!(
            signal_id = readable_id(signal),
            %reason,
            "signal rejected by taxonomy"
          );
          result.rejected.push(TaxonomyRejection {
            signal_id: readable_id(signal).map(str::to_owned),
            reason,
          });
        }
      }
    }
    (result, accepted)
  }

  /// Run the checks in order; the first failure wins.
  fn check(&self, signal: &Value) -> Result<String, RejectionReason> {
    let Some(record) = signal.as_object() else {
      return Err(RejectionReason::MissingSignalType);
    };

    let signal_type = record
      .get("signal_type")
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
      .ok_or(RejectionReason::MissingSignalType)?;

    let expected_category = self
      .authority
      .category_for(signal_type)
      .ok_or(RejectionReason::UnknownSignalType)?;

    if !has_lineage(record) {
      return Err(RejectionReason::MissingDerivationLineage);
    }

    if record.contains_key("event_type") || record.contains_key("event_id") {
      return Err(RejectionReason::EventObjectNotASignal);
    }

    let category = resolve_single_category(record.get("taxonomy_category"))
      .ok_or(RejectionReason::CategoryNotExactlyOne)?;
    if category != expected_category {
      return Err(RejectionReason::CategoryMismatchForType);
    }

    readable_id(signal)
      .map(str::to_owned)
      .ok_or(RejectionReason::MissingSignalId)
  }
}

fn readable_id(signal: &Value) -> Option<&str> {
  signal
    .get("signal_id")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
}

/// Lineage must be a non-empty array of non-empty strings.
fn has_lineage(record: &Map<String, Value>) -> bool {
  match record.get("derived_from_event_ids") {
    Some(Value::Array(ids)) => {
      !ids.is_empty()
        && ids
          .iter()
          .all(|id| id.as_str().is_some_and(|s| !s.is_empty()))
    }
    _ => false,
  }
}

/// A category field resolves to exactly one non-empty string, either as a
/// scalar or as a one-element array. Anything else resolves to `None`.
fn resolve_single_category(field: Option<&Value>) -> Option<&str> {
  match field? {
    Value::String(s) if !s.is_empty() => Some(s),
    Value::Array(items) if items.len() == 1 => {
      items[0].as_str().filter(|s| !s.is_empty())
    }
    _ => None,
  }
}
