//! Approval authority gate for bulk editorial actions.
//!
//! A pure precondition check run before any bulk state change. Every failure
//! aborts the whole request; nothing is partially accepted. Unknown roles
//! and actions are denied.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Largest number of artifacts one bulk request may touch.
pub const MAX_BULK_ARTIFACTS: usize = 20;

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApproverRole {
  Primary,
  CoCommissioner,
  Delegate,
}

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalAction {
  Approved,
  Withheld,
  RegenerateRequested,
  Annotated,
}

/// The human performing an editorial action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub name: String,
  pub role: ApproverRole,
}

impl Actor {
  /// Build an actor from an untrusted role string.
  pub fn parse(name: impl Into<String>, role: &str) -> Result<Self, ApprovalError> {
    let role = role
      .parse()
      .map_err(|_| ApprovalError::ForbiddenActorRole(role.to_owned()))?;
    Ok(Self { name: name.into(), role })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
  #[error("Forbidden actor_role: {0:?}")]
  ForbiddenActorRole(String),

  #[error("artifact_ids must not be empty")]
  EmptyBatch,

  #[error("artifact_ids exceeds max of {max} (got {count})")]
  BatchTooLarge { count: usize, max: usize },

  #[error("Delegated approvers may not perform bulk operations")]
  DelegateBulk,

  #[error("Forbidden action: {0:?}")]
  ForbiddenAction(String),

  #[error("Bulk rejection/withholding is forbidden")]
  BulkWithhold,
}

/// A request that passed the gate, with its role and action parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkApproval {
  pub role:   ApproverRole,
  pub action: ApprovalAction,
  pub count:  usize,
}

/// Validate a bulk request. Checks run in a fixed order: role, empty batch,
/// batch size, delegate restriction, action, bulk-withhold ban.
pub fn validate_bulk_approval_request<S: AsRef<str>>(
  actor_role: &str,
  artifact_ids: &[S],
  action: &str,
) -> Result<BulkApproval, ApprovalError> {
  let role: ApproverRole = actor_role
    .parse()
    .map_err(|_| ApprovalError::ForbiddenActorRole(actor_role.to_owned()))?;

  if artifact_ids.is_empty() {
    return Err(ApprovalError::EmptyBatch);
  }
  if artifact_ids.len() > MAX_BULK_ARTIFACTS {
    return Err(ApprovalError::BatchTooLarge {
      count: artifact_ids.len(),
      max:   MAX_BULK_ARTIFACTS,
    });
  }
  if role == ApproverRole::Delegate {
    return Err(ApprovalError::DelegateBulk);
  }

  let action: ApprovalAction = action
    .parse()
    .map_err(|_| ApprovalError::ForbiddenAction(action.to_owned()))?;
  if action == ApprovalAction::Withheld {
    return Err(ApprovalError::BulkWithhold);
  }

  Ok(BulkApproval {
    role,
    action,
    count: artifact_ids.len(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(n: usize) -> Vec<String> { (0..n).map(|i| format!("a{i}")).collect() }

  fn message(result: Result<BulkApproval, ApprovalError>) -> String {
    result.unwrap_err().to_string()
  }

  #[test]
  fn primary_bulk_approval_passes() {
    let ok = validate_bulk_approval_request("primary", &["a1", "a2", "a3"], "approved").unwrap();
    assert_eq!(ok.role, ApproverRole::Primary);
    assert_eq!(ok.action, ApprovalAction::Approved);
    assert_eq!(ok.count, 3);
  }

  #[test]
  fn co_commissioner_may_annotate_in_bulk() {
    let ok = validate_bulk_approval_request("co_commissioner", &ids(20), "annotated").unwrap();
    assert_eq!(ok.action, ApprovalAction::Annotated);
  }

  #[test]
  fn unknown_role_is_forbidden() {
    assert!(
      message(validate_bulk_approval_request("ai_system", &ids(2), "approved"))
        .contains("Forbidden actor_role")
    );
  }

  #[test]
  fn delegate_is_refused_at_any_size() {
    for n in [1, 2, 20] {
      assert!(
        message(validate_bulk_approval_request("delegate", &ids(n), "approved"))
          .contains("Delegated approvers may not perform bulk operations")
      );
    }
  }

  #[test]
  fn over_limit_reports_max_first() {
    for role in ["primary", "delegate"] {
      let err = validate_bulk_approval_request(role, &ids(21), "approved").unwrap_err();
      assert_eq!(err, ApprovalError::BatchTooLarge { count: 21, max: 20 });
      assert!(err.to_string().contains("exceeds max"));
    }
  }

  #[test]
  fn bulk_withhold_is_forbidden() {
    assert!(
      message(validate_bulk_approval_request("primary", &ids(2), "withheld"))
        .contains("Bulk rejection/withholding is forbidden")
    );
  }

  #[test]
  fn unknown_action_is_forbidden() {
    assert!(
      message(validate_bulk_approval_request("primary", &ids(2), "auto_approve"))
        .contains("Forbidden action")
    );
  }

  #[test]
  fn empty_batch_is_refused() {
    let empty: [&str; 0] = [];
    assert!(
      message(validate_bulk_approval_request("primary", &empty, "approved"))
        .contains("must not be empty")
    );
  }

  #[test]
  fn role_strings_are_case_sensitive() {
    assert!(matches!(
      validate_bulk_approval_request("Primary", &ids(1), "approved"),
      Err(ApprovalError::ForbiddenActorRole(_))
    ));
  }
}
