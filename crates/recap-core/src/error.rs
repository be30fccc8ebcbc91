//! Error types for `recap-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{approval::ApprovalError, artifact::ArtifactState};

#[derive(Debug, Error)]
pub enum Error {
  #[error("artifact not found: {0}")]
  ArtifactNotFound(Uuid),

  #[error("illegal transition for artifact {artifact_id}: {from} -> {to}")]
  IllegalTransition {
    artifact_id: Uuid,
    from:        ArtifactState,
    to:          ArtifactState,
  },

  #[error(
    "artifact {artifact_id} already withheld with reason {existing:?}, refusing {requested:?}"
  )]
  WithheldReasonConflict {
    artifact_id: Uuid,
    existing:    Option<String>,
    requested:   String,
  },

  /// A compare-and-set transition found the row in a different state than
  /// expected; the whole transaction was rolled back.
  #[error("artifact {artifact_id} is no longer in state {expected}")]
  TransitionConflict {
    artifact_id: Uuid,
    expected:    ArtifactState,
  },

  #[error("inconsistent artifact state: {0}")]
  InconsistentState(String),

  #[error("invalid reason code: {0:?}")]
  InvalidReasonCode(String),

  #[error("unknown artifact state: {0:?}")]
  UnknownState(String),

  #[error("grouping needs at least 2 distinct members, got {0}")]
  GroupingTooSmall(usize),

  #[error("no weekly window for league {league_id} season {season} week {week_index}")]
  WindowUnresolved {
    league_id:  String,
    season:     i64,
    week_index: i64,
  },

  #[error(transparent)]
  Approval(#[from] ApprovalError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
