//! The recap artifact lifecycle: drafting, approval, withholding, and
//! staleness.
//!
//! Each recap key `(league, season, week, type)` owns a monotonically
//! versioned series of artifacts. At most one version is `DRAFT` and at most
//! one is `APPROVED` at any time. Every operation here is idempotent where
//! repeating it makes sense, and refuses everything else.
//!
//! All functions are generic over [`ArtifactStore`]; nothing here touches a
//! database directly.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  approval::{
    Actor, ApprovalAction, BulkApproval, validate_bulk_approval_request,
  },
  artifact::{
    ApprovalActionRecord, ArtifactKey, ArtifactState, NewDraft, ReasonCode,
    RecapArtifact, RecapRun, Transition,
  },
  attunement::{EalMeta, EditorialDirective, evaluate_editorial_attunement},
  selection::SelectionSet,
  store::ArtifactStore,
  window::ResolvedWindow,
};

// ─── Drafts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DraftOutcome {
  /// A new version was inserted.
  Created(RecapArtifact),
  /// A version with the same fingerprint already existed; nothing changed.
  Existing(RecapArtifact),
}

impl DraftOutcome {
  pub fn artifact(&self) -> &RecapArtifact {
    match self {
      Self::Created(a) | Self::Existing(a) => a,
    }
  }

  pub fn into_artifact(self) -> RecapArtifact {
    match self {
      Self::Created(a) | Self::Existing(a) => a,
    }
  }

  pub fn is_created(&self) -> bool { matches!(self, Self::Created(_)) }
}

/// Draft a new version of `key` from `selection`.
///
/// If the newest live (`DRAFT` or `APPROVED`) version of the key already
/// carries the selection's fingerprint, that version is returned unchanged.
/// Otherwise the next version is inserted as `DRAFT` and any older draft is
/// superseded in the same transaction. Withheld and superseded versions are
/// never handed back, so a selection that reverts to one of them is drafted
/// again.
pub fn create_draft<S: ArtifactStore>(
  store: &mut S,
  key: &ArtifactKey,
  selection: &SelectionSet,
  created_by: &str,
) -> Result<DraftOutcome, S::Error> {
  let versions = store.list_versions(key)?;

  let newest_live = versions
    .iter()
    .filter(|a| !a.state.is_terminal())
    .max_by_key(|a| a.version);
  if let Some(existing) =
    newest_live.filter(|a| a.selection_fingerprint == selection.selection_fingerprint)
  {
    tracing::info!(
      artifact_id = %existing.artifact_id,
      version = existing.version,
      state = %existing.state,
      "draft already exists for fingerprint"
    );
    return Ok(DraftOutcome::Existing(existing.clone()));
  }

  let now = Utc::now();
  let retire = versions
    .iter()
    .filter(|a| a.state == ArtifactState::Draft)
    .map(|a| Transition::supersede(a, now))
    .collect::<Result<Vec<_>, _>>()?;

  let draft = NewDraft::from_selection(key.clone(), selection, created_by, now)?;
  let artifact = store.insert_draft(draft, &retire)?;

  tracing::info!(
    artifact_id = %artifact.artifact_id,
    league_id = %key.league_id,
    season = key.season,
    week_index = key.week_index,
    version = artifact.version,
    superseded = retire.len(),
    "draft created"
  );
  Ok(DraftOutcome::Created(artifact))
}

// ─── Approval ────────────────────────────────────────────────────────────────

/// Approve a draft. The previously approved version of the key, if any, is
/// superseded in the same transaction. Approving an approved artifact is a
/// no-op.
pub fn approve<S: ArtifactStore>(
  store: &mut S,
  artifact_id: Uuid,
  actor: &Actor,
  note: Option<&str>,
) -> Result<RecapArtifact, S::Error> {
  let mut artifact = load(store, artifact_id)?;
  let siblings = store.list_versions(&artifact.key())?;
  let now = Utc::now();

  let transitions = plan_approval(&artifact, &siblings, &actor.name, now)?;
  if transitions.is_empty() {
    tracing::debug!(%artifact_id, "artifact already approved");
    return Ok(artifact);
  }

  let record = action_record(artifact_id, ApprovalAction::Approved, actor, note, now);
  store.transition(&transitions, &[record])?;
  log_transitions(&transitions);

  if let Some(own) = transitions.iter().find(|t| t.artifact_id == artifact_id) {
    own.apply_to(&mut artifact);
  }
  Ok(artifact)
}

/// The transitions that approve `target`, or none if it already is.
fn plan_approval(
  target: &RecapArtifact,
  siblings: &[RecapArtifact],
  approved_by: &str,
  at: DateTime<Utc>,
) -> crate::Result<Vec<Transition>> {
  match target.state {
    ArtifactState::Approved => return Ok(Vec::new()),
    ArtifactState::Draft => {}
    from => {
      return Err(Error::IllegalTransition {
        artifact_id: target.artifact_id,
        from,
        to: ArtifactState::Approved,
      });
    }
  }

  let approved: Vec<&RecapArtifact> = siblings
    .iter()
    .filter(|a| a.state == ArtifactState::Approved)
    .collect();
  if approved.len() > 1 {
    return Err(Error::InconsistentState(format!(
      "{} approved versions for {} season {} week {}",
      approved.len(),
      target.league_id,
      target.season,
      target.week_index
    )));
  }

  let mut transitions = Vec::with_capacity(2);
  if let Some(prior) = approved.first() {
    if prior.version > target.version {
      return Err(Error::InconsistentState(format!(
        "version {} is approved but newer than draft version {}",
        prior.version, target.version
      )));
    }
    transitions.push(Transition::supersede(prior, at)?);
  }
  transitions.push(Transition::approve(target, approved_by, at)?);
  Ok(transitions)
}

// ─── Withholding ─────────────────────────────────────────────────────────────

/// Withhold a draft with a reason code. Repeating the call with the same
/// reason is a no-op; a different reason is refused.
pub fn withhold<S: ArtifactStore>(
  store: &mut S,
  artifact_id: Uuid,
  reason: &str,
  actor: &Actor,
  note: Option<&str>,
) -> Result<RecapArtifact, S::Error> {
  let reason = ReasonCode::parse(reason)?;
  let mut artifact = load(store, artifact_id)?;

  if artifact.state == ArtifactState::Withheld {
    if artifact.withheld_reason.as_deref() == Some(reason.as_str()) {
      tracing::debug!(%artifact_id, %reason, "artifact already withheld");
      return Ok(artifact);
    }
    return Err(
      Error::WithheldReasonConflict {
        artifact_id,
        existing: artifact.withheld_reason,
        requested: reason.to_string(),
      }
      .into(),
    );
  }

  let now = Utc::now();
  let transition = Transition::withhold(&artifact, &reason, now)?;
  let record = action_record(artifact_id, ApprovalAction::Withheld, actor, note, now);
  store.transition(std::slice::from_ref(&transition), &[record])?;
  log_transitions(std::slice::from_ref(&transition));

  transition.apply_to(&mut artifact);
  Ok(artifact)
}

// ─── Bulk actions ────────────────────────────────────────────────────────────

/// A bulk editorial request as it arrives from an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkActionRequest {
  pub actor:        String,
  pub actor_role:   String,
  pub artifact_ids: Vec<Uuid>,
  pub action:       String,
  #[serde(default)]
  pub note:         Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
  pub artifact_id: Uuid,
  pub before:      ArtifactState,
  pub after:       ArtifactState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
  pub approval: BulkApproval,
  pub items:    Vec<BulkItem>,
}

/// Gate, precheck, and apply a bulk request.
///
/// Nothing is written unless every target exists and accepts the action.
/// All state changes and audit rows land in one transaction. Repeated ids
/// are applied once.
pub fn apply_bulk_action<S: ArtifactStore>(
  store: &mut S,
  request: &BulkActionRequest,
) -> Result<BulkOutcome, S::Error> {
  let ids: Vec<String> = request.artifact_ids.iter().map(Uuid::to_string).collect();
  let approval =
    validate_bulk_approval_request(&request.actor_role, ids.as_slice(), &request.action)
      .map_err(Error::from)?;
  let actor = Actor {
    name: request.actor.clone(),
    role: approval.role,
  };

  let mut seen = BTreeSet::new();
  let mut targets = Vec::new();
  for &artifact_id in &request.artifact_ids {
    if seen.insert(artifact_id) {
      targets.push(load(store, artifact_id)?);
    }
  }

  let now = Utc::now();
  let note = request.note.as_deref();
  let mut transitions = Vec::new();
  let mut actions = Vec::new();
  let mut items = Vec::new();

  for target in &targets {
    let mut after = target.state;
    if approval.action == ApprovalAction::Approved {
      let siblings = store.list_versions(&target.key())?;
      let planned = plan_approval(target, &siblings, &actor.name, now)?;
      if !planned.is_empty() {
        after = ArtifactState::Approved;
        actions.push(action_record(target.artifact_id, approval.action, &actor, note, now));
      }
      transitions.extend(planned);
    } else {
      actions.push(action_record(target.artifact_id, approval.action, &actor, note, now));
    }
    items.push(BulkItem {
      artifact_id: target.artifact_id,
      before: target.state,
      after,
    });
  }

  store.transition(&transitions, &actions)?;
  log_transitions(&transitions);
  tracing::info!(
    action = %approval.action,
    actor = %actor.name,
    role = %actor.role,
    targets = targets.len(),
    transitions = transitions.len(),
    "bulk action applied"
  );

  // A target superseded by a later approval in the same batch ends there.
  for item in &mut items {
    if let Some(last) = transitions.iter().rev().find(|t| t.artifact_id == item.artifact_id) {
      item.after = last.to;
    }
  }
  Ok(BulkOutcome { approval, items })
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// The approved version of `key`, if any.
pub fn current_approved<S: ArtifactStore>(
  store: &S,
  key: &ArtifactKey,
) -> Result<Option<RecapArtifact>, S::Error> {
  let mut approved: Vec<RecapArtifact> = store
    .list_versions(key)?
    .into_iter()
    .filter(|a| a.state == ArtifactState::Approved)
    .collect();
  if approved.len() > 1 {
    return Err(
      Error::InconsistentState(format!(
        "{} approved versions for {} season {} week {}",
        approved.len(),
        key.league_id,
        key.season,
        key.week_index
      ))
      .into(),
    );
  }
  Ok(approved.pop())
}

// ─── Run trace & staleness ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Staleness {
  Fresh,
  Stale { stored: String, fresh: String },
  /// No run trace exists for the league week.
  Missing,
}

/// Compare the stored run fingerprint against a freshly built selection.
/// Never writes.
pub fn check_staleness<S: ArtifactStore>(
  store: &S,
  selection: &SelectionSet,
) -> Result<Staleness, S::Error> {
  let run = store.get_run_trace(&selection.league_id, selection.season, selection.week_index)?;
  Ok(match run {
    None => Staleness::Missing,
    Some(run) if run.selection_fingerprint == selection.selection_fingerprint => {
      Staleness::Fresh
    }
    Some(run) => Staleness::Stale {
      stored: run.selection_fingerprint,
      fresh:  selection.selection_fingerprint.clone(),
    },
  })
}

/// Record the run trace for a built selection and store its attunement
/// directive.
pub fn record_run<S: ArtifactStore>(
  store: &mut S,
  window: &ResolvedWindow,
  selection: &SelectionSet,
) -> Result<RecapRun, S::Error> {
  let mut run = RecapRun {
    league_id:               selection.league_id.clone(),
    season:                  selection.season,
    week_index:              selection.week_index,
    selection_fingerprint:   selection.selection_fingerprint.clone(),
    window_start:            window.start,
    window_end:              window.end,
    editorial_attunement_v1: None,
  };
  store.upsert_run_trace(&run)?;

  let directive: EditorialDirective =
    evaluate_editorial_attunement(&EalMeta::from_selection(selection));
  store.write_attunement(&run.league_id, run.season, run.week_index, directive)?;
  run.editorial_attunement_v1 = Some(directive.to_string());

  tracing::info!(
    league_id = %run.league_id,
    season = run.season,
    week_index = run.week_index,
    %directive,
    "run trace recorded"
  );
  Ok(run)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn load<S: ArtifactStore>(store: &S, artifact_id: Uuid) -> Result<RecapArtifact, S::Error> {
  store
    .get_artifact(artifact_id)?
    .ok_or_else(|| Error::ArtifactNotFound(artifact_id).into())
}

fn action_record(
  artifact_id: Uuid,
  action: ApprovalAction,
  actor: &Actor,
  note: Option<&str>,
  at: DateTime<Utc>,
) -> ApprovalActionRecord {
  ApprovalActionRecord {
    action_id: Uuid::new_v4(),
    artifact_id,
    action,
    actor: actor.name.clone(),
    actor_role: actor.role,
    note: note.map(str::to_owned),
    recorded_at: at,
  }
}

fn log_transitions(transitions: &[Transition]) {
  for t in transitions {
    tracing::info!(
      artifact_id = %t.artifact_id,
      from = %t.from,
      to = %t.to,
      "artifact transitioned"
    );
  }
}
