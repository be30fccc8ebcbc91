//! The `ArtifactStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `recap-store-sqlite`).
//! The lifecycle in [`crate::lifecycle`] is written against this
//! abstraction, not against any concrete backend.

use uuid::Uuid;

use crate::{
  artifact::{
    ApprovalActionRecord, ArtifactKey, NewDraft, RecapArtifact, RecapRun, Transition,
  },
  attunement::EditorialDirective,
};

/// Abstraction over recap artifact persistence.
///
/// Artifact rows are never deleted and versions are never reused. State
/// changes go through [`ArtifactStore::transition`], which is all-or-nothing.
/// Audit rows are append-only.
pub trait ArtifactStore {
  type Error: std::error::Error + From<crate::Error>;

  // ── Artifacts ─────────────────────────────────────────────────────────

  /// Retrieve an artifact by id. Returns `None` if not found.
  fn get_artifact(&self, artifact_id: Uuid) -> Result<Option<RecapArtifact>, Self::Error>;

  /// Every version of `key`, ascending by version.
  fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<RecapArtifact>, Self::Error>;

  /// Insert `draft` as the next version of its key and apply `retire` in
  /// the same transaction. The version is allocated by the store as one
  /// more than the highest existing version.
  fn insert_draft(
    &mut self,
    draft: NewDraft,
    retire: &[Transition],
  ) -> Result<RecapArtifact, Self::Error>;

  /// Apply `transitions` in order and append `actions`, atomically.
  ///
  /// Each transition is a compare-and-set on its `from` state. If any row
  /// is not in the expected state the whole batch is rolled back with
  /// [`crate::Error::TransitionConflict`].
  fn transition(
    &mut self,
    transitions: &[Transition],
    actions: &[ApprovalActionRecord],
  ) -> Result<(), Self::Error>;

  // ── Run trace ─────────────────────────────────────────────────────────

  /// Read the run trace of a league week. A directive column missing from
  /// an older database reads as `None`.
  fn get_run_trace(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Result<Option<RecapRun>, Self::Error>;

  /// Insert or replace the base columns of a run trace. A stored directive
  /// is left untouched.
  fn upsert_run_trace(&mut self, run: &RecapRun) -> Result<(), Self::Error>;

  /// Store the attunement directive on an existing run trace, adding the
  /// column first if the database predates it.
  fn write_attunement(
    &mut self,
    league_id: &str,
    season: i64,
    week_index: i64,
    directive: EditorialDirective,
  ) -> Result<(), Self::Error>;

  // ── Audit ─────────────────────────────────────────────────────────────

  /// Audit rows for an artifact, oldest first.
  fn list_actions(&self, artifact_id: Uuid) -> Result<Vec<ApprovalActionRecord>, Self::Error>;
}
