//! [`SqliteStore`]: the SQLite implementation of [`ArtifactStore`].

use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension as _, Transaction, params};
use uuid::Uuid;

use recap_core::{
  artifact::{
    ApprovalActionRecord, ArtifactKey, NewDraft, RecapArtifact, RecapRun, Transition,
  },
  attunement::EditorialDirective,
  store::ArtifactStore,
};

use crate::{
  Error, Result,
  encode::{RawAction, RawArtifact, RawRun, encode_dt, encode_uuid},
  schema::{ARTIFACT_COLUMNS, ATTUNEMENT_COLUMN, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A recap store backed by a single SQLite connection.
pub struct SqliteStore {
  conn: Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::from_connection(Connection::open(path)?)
  }

  /// Open an in-memory store, useful for testing.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  /// Wrap an existing connection, creating any missing tables. Existing
  /// tables are left as they are.
  pub fn from_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn })
  }

  /// Whether `recap_runs` has the attunement column.
  fn has_attunement_column(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("PRAGMA table_info(recap_runs)")?;
    let names = stmt
      .query_map([], |row| row.get::<_, String>(1))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == ATTUNEMENT_COLUMN))
  }
}

/// Apply compare-and-set transitions inside `tx`. Any row not in its
/// expected state fails the call; the caller drops `tx` and nothing sticks.
fn apply_transitions(tx: &Transaction<'_>, transitions: &[Transition]) -> Result<()> {
  let mut stmt = tx.prepare(
    "UPDATE recap_artifacts SET
       state           = ?2,
       updated_at      = ?4,
       approved_by     = CASE WHEN ?2 = 'APPROVED' THEN ?5 ELSE approved_by END,
       approved_at     = CASE WHEN ?2 = 'APPROVED' THEN ?4 ELSE approved_at END,
       withheld_reason = CASE WHEN ?2 = 'WITHHELD' THEN ?6 ELSE withheld_reason END
     WHERE artifact_id = ?1 AND state = ?3",
  )?;

  for t in transitions {
    let changed = stmt
      .execute(params![
        encode_uuid(t.artifact_id),
        t.to.as_ref(),
        t.from.as_ref(),
        encode_dt(t.at),
        t.approved_by,
        t.withheld_reason,
      ])
      .map_err(constraint_as_inconsistent)?;
    if changed != 1 {
      return Err(
        recap_core::Error::TransitionConflict {
          artifact_id: t.artifact_id,
          expected:    t.from,
        }
        .into(),
      );
    }
  }
  Ok(())
}

fn insert_actions(tx: &Transaction<'_>, actions: &[ApprovalActionRecord]) -> Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO recap_approval_actions
       (action_id, artifact_id, action, actor, actor_role, note, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
  )?;
  for a in actions {
    stmt.execute(params![
      encode_uuid(a.action_id),
      encode_uuid(a.artifact_id),
      a.action.as_ref(),
      a.actor,
      a.actor_role.as_ref(),
      a.note,
      encode_dt(a.recorded_at),
    ])?;
  }
  Ok(())
}

/// The partial unique indexes reject a second DRAFT or APPROVED row per
/// key; surface that as a lifecycle inconsistency rather than a raw SQL
/// error.
fn constraint_as_inconsistent(err: rusqlite::Error) -> Error {
  match err {
    rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
      recap_core::Error::InconsistentState(
        msg.unwrap_or_else(|| "constraint violation".to_owned()),
      )
      .into()
    }
    other => other.into(),
  }
}

// ─── ArtifactStore impl ──────────────────────────────────────────────────────

impl ArtifactStore for SqliteStore {
  type Error = Error;

  // ── Artifacts ─────────────────────────────────────────────────────────────

  fn get_artifact(&self, artifact_id: Uuid) -> Result<Option<RecapArtifact>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {ARTIFACT_COLUMNS} FROM recap_artifacts WHERE artifact_id = ?1"),
        params![encode_uuid(artifact_id)],
        RawArtifact::from_row,
      )
      .optional()?;
    raw.map(RawArtifact::into_artifact).transpose()
  }

  fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<RecapArtifact>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {ARTIFACT_COLUMNS} FROM recap_artifacts
       WHERE league_id = ?1 AND season = ?2 AND week_index = ?3 AND artifact_type = ?4
       ORDER BY version"
    ))?;
    let raws = stmt
      .query_map(
        params![key.league_id, key.season, key.week_index, key.artifact_type],
        RawArtifact::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  fn insert_draft(&mut self, draft: NewDraft, retire: &[Transition]) -> Result<RecapArtifact> {
    let tx = self.conn.transaction()?;
    apply_transitions(&tx, retire)?;

    let key = &draft.key;
    let version: i64 = tx.query_row(
      "SELECT COALESCE(MAX(version), 0) + 1 FROM recap_artifacts
       WHERE league_id = ?1 AND season = ?2 AND week_index = ?3 AND artifact_type = ?4",
      params![key.league_id, key.season, key.week_index, key.artifact_type],
      |row| row.get(0),
    )?;

    let selection_json = serde_json::to_string(&draft.selection_json)?;
    let created_at = encode_dt(draft.created_at);
    tx.execute(
      "INSERT INTO recap_artifacts (
         artifact_id, league_id, season, week_index, artifact_type, version,
         state, selection_fingerprint, selection_json, created_by, created_at,
         updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'DRAFT', ?7, ?8, ?9, ?10, ?10)",
      params![
        encode_uuid(draft.artifact_id),
        key.league_id,
        key.season,
        key.week_index,
        key.artifact_type,
        version,
        draft.selection_fingerprint,
        selection_json,
        draft.created_by,
        created_at,
      ],
    )
    .map_err(constraint_as_inconsistent)?;

    tx.commit()?;
    Ok(draft.into_artifact(version))
  }

  fn transition(
    &mut self,
    transitions: &[Transition],
    actions: &[ApprovalActionRecord],
  ) -> Result<()> {
    let tx = self.conn.transaction()?;
    apply_transitions(&tx, transitions)?;
    insert_actions(&tx, actions)?;
    tx.commit()?;
    Ok(())
  }

  // ── Run trace ─────────────────────────────────────────────────────────────

  fn get_run_trace(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Result<Option<RecapRun>> {
    let directive = if Self::has_attunement_column(&self.conn)? {
      ATTUNEMENT_COLUMN
    } else {
      "NULL"
    };
    let raw = self
      .conn
      .query_row(
        &format!(
          "SELECT league_id, season, week_index, selection_fingerprint,
                  window_start, window_end, {directive}
           FROM recap_runs
           WHERE league_id = ?1 AND season = ?2 AND week_index = ?3"
        ),
        params![league_id, season, week_index],
        |row| {
          Ok(RawRun {
            league_id:               row.get(0)?,
            season:                  row.get(1)?,
            week_index:              row.get(2)?,
            selection_fingerprint:   row.get(3)?,
            window_start:            row.get(4)?,
            window_end:              row.get(5)?,
            editorial_attunement_v1: row.get(6)?,
          })
        },
      )
      .optional()?;
    raw.map(RawRun::into_run).transpose()
  }

  fn upsert_run_trace(&mut self, run: &RecapRun) -> Result<()> {
    self.conn.execute(
      "INSERT INTO recap_runs
         (league_id, season, week_index, selection_fingerprint, window_start, window_end)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       ON CONFLICT (league_id, season, week_index) DO UPDATE SET
         selection_fingerprint = excluded.selection_fingerprint,
         window_start          = excluded.window_start,
         window_end            = excluded.window_end",
      params![
        run.league_id,
        run.season,
        run.week_index,
        run.selection_fingerprint,
        encode_dt(run.window_start),
        encode_dt(run.window_end),
      ],
    )?;
    Ok(())
  }

  fn write_attunement(
    &mut self,
    league_id: &str,
    season: i64,
    week_index: i64,
    directive: EditorialDirective,
  ) -> Result<()> {
    let tx = self.conn.transaction()?;
    if !Self::has_attunement_column(&tx)? {
      tx.execute_batch(&format!(
        "ALTER TABLE recap_runs ADD COLUMN {ATTUNEMENT_COLUMN} TEXT"
      ))?;
      tracing::info!(column = ATTUNEMENT_COLUMN, "added column to recap_runs");
    }
    let changed = tx.execute(
      &format!(
        "UPDATE recap_runs SET {ATTUNEMENT_COLUMN} = ?4
         WHERE league_id = ?1 AND season = ?2 AND week_index = ?3"
      ),
      params![league_id, season, week_index, directive.as_ref()],
    )?;
    tx.commit()?;

    if changed == 0 {
      tracing::warn!(
        league_id,
        season,
        week_index,
        %directive,
        "no run trace to attach directive to"
      );
    }
    Ok(())
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  fn list_actions(&self, artifact_id: Uuid) -> Result<Vec<ApprovalActionRecord>> {
    let mut stmt = self.conn.prepare(
      "SELECT action_id, artifact_id, action, actor, actor_role, note, recorded_at
       FROM recap_approval_actions
       WHERE artifact_id = ?1
       ORDER BY recorded_at, rowid",
    )?;
    let raws = stmt
      .query_map(params![encode_uuid(artifact_id)], |row| {
        Ok(RawAction {
          action_id:   row.get(0)?,
          artifact_id: row.get(1)?,
          action:      row.get(2)?,
          actor:       row.get(3)?,
          actor_role:  row.get(4)?,
          note:        row.get(5)?,
          recorded_at: row.get(6)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawAction::into_record).collect()
  }
}
