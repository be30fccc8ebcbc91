//! Encoding and decoding helpers between recap domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase, enums their
//! wire strings, and the selection snapshot compact JSON.

use chrono::{DateTime, Utc};
use recap_core::artifact::{ApprovalActionRecord, ArtifactState, RecapArtifact, RecapRun};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_state(s: &str) -> Result<ArtifactState> {
  s.parse()
    .map_err(|_| recap_core::Error::UnknownState(s.to_owned()).into())
}

fn decode_enum<T: std::str::FromStr>(column: &'static str, value: String) -> Result<T> {
  value
    .parse()
    .map_err(|_| Error::UnknownValue { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `recap_artifacts` row.
pub struct RawArtifact {
  pub artifact_id:           String,
  pub league_id:             String,
  pub season:                i64,
  pub week_index:            i64,
  pub artifact_type:         String,
  pub version:               i64,
  pub state:                 String,
  pub selection_fingerprint: String,
  pub selection_json:        String,
  pub created_by:            String,
  pub created_at:            String,
  pub approved_by:           Option<String>,
  pub approved_at:           Option<String>,
  pub withheld_reason:       Option<String>,
  pub updated_at:            String,
}

impl RawArtifact {
  /// Read a row selected with [`crate::schema::ARTIFACT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      artifact_id:           row.get(0)?,
      league_id:             row.get(1)?,
      season:                row.get(2)?,
      week_index:            row.get(3)?,
      artifact_type:         row.get(4)?,
      version:               row.get(5)?,
      state:                 row.get(6)?,
      selection_fingerprint: row.get(7)?,
      selection_json:        row.get(8)?,
      created_by:            row.get(9)?,
      created_at:            row.get(10)?,
      approved_by:           row.get(11)?,
      approved_at:           row.get(12)?,
      withheld_reason:       row.get(13)?,
      updated_at:            row.get(14)?,
    })
  }

  pub fn into_artifact(self) -> Result<RecapArtifact> {
    Ok(RecapArtifact {
      artifact_id:           decode_uuid(&self.artifact_id)?,
      league_id:             self.league_id,
      season:                self.season,
      week_index:            self.week_index,
      artifact_type:         self.artifact_type,
      version:               self.version,
      state:                 decode_state(&self.state)?,
      selection_fingerprint: self.selection_fingerprint,
      selection_json:        serde_json::from_str(&self.selection_json)?,
      created_by:            self.created_by,
      created_at:            decode_dt(&self.created_at)?,
      approved_by:           self.approved_by,
      approved_at:           self.approved_at.as_deref().map(decode_dt).transpose()?,
      withheld_reason:       self.withheld_reason,
      updated_at:            decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `recap_runs` row.
pub struct RawRun {
  pub league_id:               String,
  pub season:                  i64,
  pub week_index:              i64,
  pub selection_fingerprint:   String,
  pub window_start:            String,
  pub window_end:              String,
  pub editorial_attunement_v1: Option<String>,
}

impl RawRun {
  pub fn into_run(self) -> Result<RecapRun> {
    Ok(RecapRun {
      league_id:               self.league_id,
      season:                  self.season,
      week_index:              self.week_index,
      selection_fingerprint:   self.selection_fingerprint,
      window_start:            decode_dt(&self.window_start)?,
      window_end:              decode_dt(&self.window_end)?,
      editorial_attunement_v1: self.editorial_attunement_v1,
    })
  }
}

/// Raw values read from a `recap_approval_actions` row.
pub struct RawAction {
  pub action_id:   String,
  pub artifact_id: String,
  pub action:      String,
  pub actor:       String,
  pub actor_role:  String,
  pub note:        Option<String>,
  pub recorded_at: String,
}

impl RawAction {
  pub fn into_record(self) -> Result<ApprovalActionRecord> {
    Ok(ApprovalActionRecord {
      action_id:   decode_uuid(&self.action_id)?,
      artifact_id: decode_uuid(&self.artifact_id)?,
      action:      decode_enum("action", self.action)?,
      actor:       self.actor,
      actor_role:  decode_enum("actor_role", self.actor_role)?,
      note:        self.note,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use recap_core::approval::ApproverRole;

  use super::*;

  #[test]
  fn unknown_state_is_a_core_error() {
    assert!(matches!(
      decode_state("PUBLISHED"),
      Err(Error::Core(recap_core::Error::UnknownState(s))) if s == "PUBLISHED"
    ));
  }

  #[test]
  fn unknown_role_names_its_column() {
    let err = decode_enum::<ApproverRole>("actor_role", "ai_system".into()).unwrap_err();
    assert_eq!(err.to_string(), r#"unknown actor_role value: "ai_system""#);
  }

  #[test]
  fn datetimes_keep_their_instant() {
    let now = Utc::now();
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
