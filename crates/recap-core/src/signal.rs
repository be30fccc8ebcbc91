//! Signal representations and the accessor traits the engine reads them
//! through.
//!
//! Signals are produced upstream and are immutable inputs. The engine never
//! assumes a concrete representation: grouping and selection only go through
//! [`SignalView`] / [`SelectableSignal`]. Two adapters ship here, one for
//! map-backed signals (`serde_json::Value` / `Map`) and one for the
//! struct-backed [`Signal`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

// ─── Confidence ──────────────────────────────────────────────────────────────

/// Confidence tier attached to a signal upstream. `A` is the strongest.
///
/// Declaration order matters: `A < B < C`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
pub enum ConfidenceTier {
  A,
  B,
  C,
}

impl ConfidenceTier {
  /// True when `self` is at least as strong as `minimum`.
  pub fn meets(self, minimum: ConfidenceTier) -> bool { self <= minimum }
}

// ─── Accessor traits ─────────────────────────────────────────────────────────

/// The capability surface grouping needs from a signal.
pub trait SignalView {
  fn signal_id(&self) -> Option<&str>;
  fn scope_key(&self) -> Option<&str>;
  fn subject_key(&self) -> Option<&str>;
  fn fact_basis_keys(&self) -> Vec<&str>;
}

/// The additional surface the selection policy reads.
pub trait SelectableSignal: SignalView {
  fn confidence(&self) -> Option<ConfidenceTier>;
  fn lineage_complete(&self) -> bool;
  fn in_window(&self) -> bool;
}

impl<T: SignalView + ?Sized> SignalView for &T {
  fn signal_id(&self) -> Option<&str> { (**self).signal_id() }

  fn scope_key(&self) -> Option<&str> { (**self).scope_key() }

  fn subject_key(&self) -> Option<&str> { (**self).subject_key() }

  fn fact_basis_keys(&self) -> Vec<&str> { (**self).fact_basis_keys() }
}

impl<T: SelectableSignal + ?Sized> SelectableSignal for &T {
  fn confidence(&self) -> Option<ConfidenceTier> { (**self).confidence() }

  fn lineage_complete(&self) -> bool { (**self).lineage_complete() }

  fn in_window(&self) -> bool { (**self).in_window() }
}

// ─── Map-backed adapter ──────────────────────────────────────────────────────

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
  map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl SignalView for Map<String, Value> {
  fn signal_id(&self) -> Option<&str> { non_empty_str(self, "signal_id") }

  fn scope_key(&self) -> Option<&str> { non_empty_str(self, "scope_key") }

  fn subject_key(&self) -> Option<&str> { non_empty_str(self, "subject_key") }

  fn fact_basis_keys(&self) -> Vec<&str> {
    match self.get("fact_basis_keys") {
      Some(Value::Array(items)) => items
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .collect(),
      _ => Vec::new(),
    }
  }
}

impl SelectableSignal for Map<String, Value> {
  fn confidence(&self) -> Option<ConfidenceTier> {
    non_empty_str(self, "confidence").and_then(|s| s.parse().ok())
  }

  // Absent flags read as false.
  fn lineage_complete(&self) -> bool {
    self.get("lineage_complete").and_then(Value::as_bool).unwrap_or(false)
  }

  fn in_window(&self) -> bool {
    self.get("in_window").and_then(Value::as_bool).unwrap_or(false)
  }
}

/// Non-object values expose nothing, so they never group or select.
impl SignalView for Value {
  fn signal_id(&self) -> Option<&str> { self.as_object()?.signal_id() }

  fn scope_key(&self) -> Option<&str> { self.as_object()?.scope_key() }

  fn subject_key(&self) -> Option<&str> { self.as_object()?.subject_key() }

  fn fact_basis_keys(&self) -> Vec<&str> {
    self
      .as_object()
      .map(SignalView::fact_basis_keys)
      .unwrap_or_default()
  }
}

impl SelectableSignal for Value {
  fn confidence(&self) -> Option<ConfidenceTier> {
    self.as_object()?.confidence()
  }

  fn lineage_complete(&self) -> bool {
    self.as_object().is_some_and(SelectableSignal::lineage_complete)
  }

  fn in_window(&self) -> bool {
    self.as_object().is_some_and(SelectableSignal::in_window)
  }
}

// ─── Struct-backed adapter ───────────────────────────────────────────────────

/// A typed signal for callers that hold structured records rather than raw
/// JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
  pub signal_id:              String,
  pub signal_type:            String,
  pub taxonomy_category:      String,
  /// Upstream event ids this signal was derived from. Never empty for a
  /// signal that passes the taxonomy.
  pub derived_from_event_ids: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scope_key:              Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject_key:            Option<String>,
  #[serde(default)]
  pub fact_basis_keys:        Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub confidence:             Option<ConfidenceTier>,
  #[serde(default)]
  pub lineage_complete:       bool,
  #[serde(default)]
  pub in_window:              bool,
}

impl Signal {
  /// The map-backed form, suitable for the taxonomy enforcer.
  pub fn to_json(&self) -> crate::Result<Value> { Ok(serde_json::to_value(self)?) }
}

impl SignalView for Signal {
  fn signal_id(&self) -> Option<&str> {
    Some(self.signal_id.as_str()).filter(|s| !s.is_empty())
  }

  fn scope_key(&self) -> Option<&str> { self.scope_key.as_deref() }

  fn subject_key(&self) -> Option<&str> { self.subject_key.as_deref() }

  fn fact_basis_keys(&self) -> Vec<&str> {
    self.fact_basis_keys.iter().map(String::as_str).collect()
  }
}

impl SelectableSignal for Signal {
  fn confidence(&self) -> Option<ConfidenceTier> { self.confidence }

  fn lineage_complete(&self) -> bool { self.lineage_complete }

  fn in_window(&self) -> bool { self.in_window }
}
