//! Recap artifacts, their editorial states, and the run trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  approval::{ApprovalAction, ApproverRole},
  attunement::EditorialDirective,
  selection::SelectionSet,
};

/// The artifact type produced by the weekly pipeline.
pub const WEEKLY_RECAP: &str = "WEEKLY_RECAP";

// ─── State machine ───────────────────────────────────────────────────────────

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
pub enum ArtifactState {
  Draft,
  Approved,
  Withheld,
  Superseded,
}

impl ArtifactState {
  /// Whether `self -> to` is a legal lifecycle edge. Only drafts move
  /// freely; an approved artifact can only be superseded; withheld and
  /// superseded rows are final.
  pub fn can_transition_to(self, to: ArtifactState) -> bool {
    use ArtifactState::*;
    matches!(
      (self, to),
      (Draft, Approved) | (Draft, Withheld) | (Draft, Superseded) | (Approved, Superseded)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, ArtifactState::Withheld | ArtifactState::Superseded)
  }
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

/// Everything but the version: the series an artifact belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
  pub league_id:     String,
  pub season:        i64,
  pub week_index:    i64,
  pub artifact_type: String,
}

impl ArtifactKey {
  pub fn new(
    league_id: impl Into<String>,
    season: i64,
    week_index: i64,
    artifact_type: impl Into<String>,
  ) -> Self {
    Self {
      league_id: league_id.into(),
      season,
      week_index,
      artifact_type: artifact_type.into(),
    }
  }

  /// The weekly-recap key for the league week a selection was built for.
  pub fn weekly_recap(selection: &SelectionSet) -> Self {
    Self::new(
      selection.league_id.clone(),
      selection.season,
      selection.week_index,
      WEEKLY_RECAP,
    )
  }
}

/// One persisted version of a recap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapArtifact {
  pub artifact_id:           Uuid,
  pub league_id:             String,
  pub season:                i64,
  pub week_index:            i64,
  pub artifact_type:         String,
  pub version:               i64,
  pub state:                 ArtifactState,
  pub selection_fingerprint: String,
  /// Snapshot of the [`SelectionSet`] this version was drafted from.
  pub selection_json:        Value,
  pub created_by:            String,
  pub created_at:            DateTime<Utc>,
  pub approved_by:           Option<String>,
  pub approved_at:           Option<DateTime<Utc>>,
  pub withheld_reason:       Option<String>,
  pub updated_at:            DateTime<Utc>,
}

impl RecapArtifact {
  pub fn key(&self) -> ArtifactKey {
    ArtifactKey::new(
      self.league_id.clone(),
      self.season,
      self.week_index,
      self.artifact_type.clone(),
    )
  }

  pub fn selection(&self) -> Result<SelectionSet> {
    Ok(serde_json::from_value(self.selection_json.clone())?)
  }
}

/// A draft about to be inserted. The store assigns the version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDraft {
  pub artifact_id:           Uuid,
  pub key:                   ArtifactKey,
  pub selection_fingerprint: String,
  pub selection_json:        Value,
  pub created_by:            String,
  pub created_at:            DateTime<Utc>,
}

impl NewDraft {
  pub fn from_selection(
    key: ArtifactKey,
    selection: &SelectionSet,
    created_by: impl Into<String>,
    created_at: DateTime<Utc>,
  ) -> Result<Self> {
    Ok(Self {
      artifact_id: Uuid::new_v4(),
      key,
      selection_fingerprint: selection.selection_fingerprint.clone(),
      selection_json: serde_json::to_value(selection)?,
      created_by: created_by.into(),
      created_at,
    })
  }

  pub fn into_artifact(self, version: i64) -> RecapArtifact {
    RecapArtifact {
      artifact_id: self.artifact_id,
      league_id: self.key.league_id,
      season: self.key.season,
      week_index: self.key.week_index,
      artifact_type: self.key.artifact_type,
      version,
      state: ArtifactState::Draft,
      selection_fingerprint: self.selection_fingerprint,
      selection_json: self.selection_json,
      created_by: self.created_by,
      created_at: self.created_at,
      approved_by: None,
      approved_at: None,
      withheld_reason: None,
      updated_at: self.created_at,
    }
  }
}

/// A compare-and-set state change: applies only if the row is still in
/// `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub artifact_id:     Uuid,
  pub from:            ArtifactState,
  pub to:              ArtifactState,
  /// Set on the row when moving to `APPROVED`.
  pub approved_by:     Option<String>,
  /// Set on the row when moving to `WITHHELD`.
  pub withheld_reason: Option<String>,
  pub at:              DateTime<Utc>,
}

impl Transition {
  pub fn new(
    artifact_id: Uuid,
    from: ArtifactState,
    to: ArtifactState,
    at: DateTime<Utc>,
  ) -> Result<Self> {
    if !from.can_transition_to(to) {
      return Err(Error::IllegalTransition { artifact_id, from, to });
    }
    Ok(Self {
      artifact_id,
      from,
      to,
      approved_by: None,
      withheld_reason: None,
      at,
    })
  }

  pub fn supersede(artifact: &RecapArtifact, at: DateTime<Utc>) -> Result<Self> {
    Self::new(artifact.artifact_id, artifact.state, ArtifactState::Superseded, at)
  }

  pub fn approve(artifact: &RecapArtifact, approved_by: &str, at: DateTime<Utc>) -> Result<Self> {
    let mut t = Self::new(artifact.artifact_id, artifact.state, ArtifactState::Approved, at)?;
    t.approved_by = Some(approved_by.to_owned());
    Ok(t)
  }

  pub fn withhold(artifact: &RecapArtifact, reason: &ReasonCode, at: DateTime<Utc>) -> Result<Self> {
    let mut t = Self::new(artifact.artifact_id, artifact.state, ArtifactState::Withheld, at)?;
    t.withheld_reason = Some(reason.as_str().to_owned());
    Ok(t)
  }

  /// Apply this transition to an in-memory copy of the row.
  pub fn apply_to(&self, artifact: &mut RecapArtifact) {
    artifact.state = self.to;
    artifact.updated_at = self.at;
    if self.to == ArtifactState::Approved {
      artifact.approved_by = self.approved_by.clone();
      artifact.approved_at = Some(self.at);
    }
    if self.to == ArtifactState::Withheld {
      artifact.withheld_reason = self.withheld_reason.clone();
    }
  }
}

// ─── Reason codes ────────────────────────────────────────────────────────────

/// A withhold reason: non-empty `SCREAMING_SNAKE_CASE`, starting with a
/// letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReasonCode(String);

impl ReasonCode {
  pub fn parse(code: &str) -> Result<Self> {
    let mut chars = code.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
      && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
      && !code.ends_with('_')
      && !code.contains("__");
    if !valid {
      return Err(Error::InvalidReasonCode(code.to_owned()));
    }
    Ok(Self(code.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for ReasonCode {
  type Error = Error;

  fn try_from(code: String) -> Result<Self> { Self::parse(&code) }
}

impl From<ReasonCode> for String {
  fn from(code: ReasonCode) -> Self { code.0 }
}

impl std::fmt::Display for ReasonCode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Run trace ───────────────────────────────────────────────────────────────

/// The run trace of a league week: the fingerprint and window the last
/// selection was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapRun {
  pub league_id:               String,
  pub season:                  i64,
  pub week_index:              i64,
  pub selection_fingerprint:   String,
  pub window_start:            DateTime<Utc>,
  pub window_end:              DateTime<Utc>,
  /// Absent on databases that predate the column, and on runs written
  /// before attunement was evaluated.
  pub editorial_attunement_v1: Option<String>,
}

impl RecapRun {
  /// The stored directive, if present and recognised.
  pub fn directive(&self) -> Option<EditorialDirective> {
    self.editorial_attunement_v1.as_deref()?.parse().ok()
  }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// One human editorial action. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalActionRecord {
  pub action_id:   Uuid,
  pub artifact_id: Uuid,
  pub action:      ApprovalAction,
  pub actor:       String,
  pub actor_role:  ApproverRole,
  pub note:        Option<String>,
  pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn state_wire_strings() {
    assert_eq!(ArtifactState::Draft.to_string(), "DRAFT");
    assert_eq!("SUPERSEDED".parse::<ArtifactState>().unwrap(), ArtifactState::Superseded);
    assert!("draft".parse::<ArtifactState>().is_err());
  }

  #[test]
  fn legal_edges() {
    use ArtifactState::*;
    let all = [Draft, Approved, Withheld, Superseded];
    let legal = [
      (Draft, Approved),
      (Draft, Withheld),
      (Draft, Superseded),
      (Approved, Superseded),
    ];
    for from in all {
      for to in all {
        assert_eq!(
          from.can_transition_to(to),
          legal.contains(&(from, to)),
          "{from} -> {to}"
        );
      }
    }
  }

  #[test]
  fn illegal_transition_is_refused_at_construction() {
    let id = Uuid::new_v4();
    let err = Transition::new(id, ArtifactState::Withheld, ArtifactState::Approved, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::IllegalTransition { artifact_id, .. } if artifact_id == id));
  }

  #[test]
  fn reason_codes() {
    for good in ["LOW_SIGNAL", "X", "DATA_GAP_2"] {
      assert_eq!(ReasonCode::parse(good).unwrap().as_str(), good);
    }
    for bad in ["", "low_signal", "_LEADING", "TRAILING_", "DOUBLE__UNDERSCORE", "2FAST", "SPACE BAR"] {
      assert!(
        matches!(ReasonCode::parse(bad), Err(Error::InvalidReasonCode(_))),
        "{bad:?}"
      );
    }
  }

  #[test]
  fn directive_parses_known_values_only() {
    let mut run = RecapRun {
      league_id:               "L1".into(),
      season:                  2024,
      week_index:              1,
      selection_fingerprint:   "f".repeat(64),
      window_start:            Utc::now(),
      window_end:              Utc::now(),
      editorial_attunement_v1: Some("LOW_CONFIDENCE_RESTRAINT".into()),
    };
    assert_eq!(run.directive(), Some(EditorialDirective::LowConfidenceRestraint));
    run.editorial_attunement_v1 = Some("SOMETHING_ELSE".into());
    assert_eq!(run.directive(), None);
    run.editorial_attunement_v1 = None;
    assert_eq!(run.directive(), None);
  }
}
