//! Editorial attunement: a restraint directive derived from selection
//! metadata.
//!
//! The evaluator only ever sees counts and presence flags, never signal
//! content or narrative text. It can ask downstream rendering to hold back;
//! it cannot widen what the facts support.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::selection::SelectionSet;

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
pub enum EditorialDirective {
  AmbiguityPreferSilence,
  LowConfidenceRestraint,
  ModerateConfidenceOnly,
  /// Reserved. No v1 input produces it.
  HighConfidenceAllowed,
}

/// What the evaluator is allowed to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EalMeta {
  pub has_selection_set: bool,
  pub has_window:        bool,
  pub included_count:    Option<i64>,
}

impl EalMeta {
  /// Metadata for a week whose selection was built.
  pub fn from_selection(selection: &SelectionSet) -> Self {
    Self {
      has_selection_set: true,
      has_window:        true,
      included_count:    i64::try_from(selection.included_count()).ok(),
    }
  }

  /// Metadata for a week with no usable window (and so no selection).
  pub fn without_window() -> Self {
    Self {
      has_selection_set: false,
      has_window:        false,
      included_count:    None,
    }
  }
}

pub fn evaluate_editorial_attunement(meta: &EalMeta) -> EditorialDirective {
  if !meta.has_selection_set || !meta.has_window {
    return EditorialDirective::AmbiguityPreferSilence;
  }
  match meta.included_count {
    None => EditorialDirective::LowConfidenceRestraint,
    Some(n) if n <= 0 => EditorialDirective::AmbiguityPreferSilence,
    Some(n) if n <= 2 => EditorialDirective::LowConfidenceRestraint,
    Some(_) => EditorialDirective::ModerateConfidenceOnly,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn meta(has_selection_set: bool, has_window: bool, included_count: Option<i64>) -> EalMeta {
    EalMeta { has_selection_set, has_window, included_count }
  }

  #[test]
  fn decision_table() {
    use EditorialDirective::*;
    let cases = [
      (meta(false, true, Some(10)), AmbiguityPreferSilence),
      (meta(true, false, Some(10)), AmbiguityPreferSilence),
      (meta(false, false, None), AmbiguityPreferSilence),
      (meta(true, true, None), LowConfidenceRestraint),
      (meta(true, true, Some(0)), AmbiguityPreferSilence),
      (meta(true, true, Some(-3)), AmbiguityPreferSilence),
      (meta(true, true, Some(1)), LowConfidenceRestraint),
      (meta(true, true, Some(2)), LowConfidenceRestraint),
      (meta(true, true, Some(3)), ModerateConfidenceOnly),
      (meta(true, true, Some(500)), ModerateConfidenceOnly),
    ];
    for (input, expected) in cases {
      assert_eq!(evaluate_editorial_attunement(&input), expected, "{input:?}");
    }
  }

  #[test]
  fn deterministic() {
    let m = meta(true, true, Some(4));
    assert_eq!(
      evaluate_editorial_attunement(&m),
      evaluate_editorial_attunement(&m)
    );
  }

  #[test]
  fn high_confidence_is_unreachable() {
    for count in -5..1000 {
      for (sel, win) in [(true, true), (true, false), (false, true)] {
        assert_ne!(
          evaluate_editorial_attunement(&meta(sel, win, Some(count))),
          EditorialDirective::HighConfidenceAllowed
        );
      }
    }
  }

  #[test]
  fn wire_strings_round_trip() {
    for directive in [
      EditorialDirective::AmbiguityPreferSilence,
      EditorialDirective::LowConfidenceRestraint,
      EditorialDirective::ModerateConfidenceOnly,
      EditorialDirective::HighConfidenceAllowed,
    ] {
      let wire = directive.to_string();
      assert_eq!(wire.parse::<EditorialDirective>().unwrap(), directive);
    }
    assert_eq!(
      EditorialDirective::ModerateConfidenceOnly.as_ref(),
      "MODERATE_CONFIDENCE_ONLY"
    );
  }
}
