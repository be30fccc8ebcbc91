//! SQL schema for the recap SQLite store.
//!
//! Executed on every open. `CREATE ... IF NOT EXISTS` leaves tables from an
//! older database untouched; columns added later (see
//! [`ATTUNEMENT_COLUMN`]) are probed at runtime instead.

/// Full bootstrap DDL; idempotent.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per league week: the fingerprint and window of the last run.
CREATE TABLE IF NOT EXISTS recap_runs (
    league_id               TEXT    NOT NULL,
    season                  INTEGER NOT NULL,
    week_index              INTEGER NOT NULL,
    selection_fingerprint   TEXT    NOT NULL,
    window_start            TEXT    NOT NULL,   -- RFC 3339 UTC
    window_end              TEXT    NOT NULL,   -- RFC 3339 UTC
    editorial_attunement_v1 TEXT,
    PRIMARY KEY (league_id, season, week_index)
);

-- Versions are never deleted or reused.
CREATE TABLE IF NOT EXISTS recap_artifacts (
    artifact_id           TEXT    PRIMARY KEY,
    league_id             TEXT    NOT NULL,
    season                INTEGER NOT NULL,
    week_index            INTEGER NOT NULL,
    artifact_type         TEXT    NOT NULL,
    version               INTEGER NOT NULL CHECK (version >= 1),
    state                 TEXT    NOT NULL
        CHECK (state IN ('DRAFT', 'APPROVED', 'WITHHELD', 'SUPERSEDED')),
    selection_fingerprint TEXT    NOT NULL,
    selection_json        TEXT    NOT NULL,
    created_by            TEXT    NOT NULL,
    created_at            TEXT    NOT NULL,
    approved_by           TEXT,
    approved_at           TEXT,
    withheld_reason       TEXT,
    updated_at            TEXT    NOT NULL,
    UNIQUE (league_id, season, week_index, artifact_type, version)
);

CREATE UNIQUE INDEX IF NOT EXISTS recap_artifacts_one_draft
    ON recap_artifacts(league_id, season, week_index, artifact_type)
    WHERE state = 'DRAFT';

CREATE UNIQUE INDEX IF NOT EXISTS recap_artifacts_one_approved
    ON recap_artifacts(league_id, season, week_index, artifact_type)
    WHERE state = 'APPROVED';

-- Append-only audit of human editorial actions.
CREATE TABLE IF NOT EXISTS recap_approval_actions (
    action_id   TEXT PRIMARY KEY,
    artifact_id TEXT NOT NULL REFERENCES recap_artifacts(artifact_id),
    action      TEXT NOT NULL,
    actor       TEXT NOT NULL,
    actor_role  TEXT NOT NULL,
    note        TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS recap_approval_actions_artifact_idx
    ON recap_approval_actions(artifact_id);

PRAGMA user_version = 1;
";

/// Optional `recap_runs` column holding the editorial directive. Databases
/// created before it existed do not have it.
pub const ATTUNEMENT_COLUMN: &str = "editorial_attunement_v1";

/// Columns read for every artifact row, in [`crate::encode::RawArtifact`]
/// order.
pub const ARTIFACT_COLUMNS: &str = "artifact_id, league_id, season, week_index, \
   artifact_type, version, state, selection_fingerprint, selection_json, \
   created_by, created_at, approved_by, approved_at, withheld_reason, updated_at";
