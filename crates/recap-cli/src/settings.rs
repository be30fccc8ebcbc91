//! Engine configuration, layered from an optional TOML file and `RECAP_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use recap_core::{
  artifact::WEEKLY_RECAP,
  selection::SelectionPolicy,
  taxonomy::TaxonomyAuthority,
  window::{ConfiguredWindows, WindowEntry},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  #[serde(default = "default_db_path")]
  pub db_path:       PathBuf,
  /// Recorded as `created_by` on drafts.
  #[serde(default = "default_created_by")]
  pub created_by:    String,
  #[serde(default = "default_artifact_type")]
  pub artifact_type: String,
  #[serde(default)]
  pub selection:     SelectionPolicy,
  /// Listed as entries so signal types stay values and never pass through
  /// config key handling.
  #[serde(default)]
  pub taxonomy:      Vec<TaxonomyEntry>,
  #[serde(default)]
  pub windows:       Vec<WindowEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyEntry {
  pub signal_type: String,
  pub category:    String,
}

fn default_db_path() -> PathBuf { PathBuf::from("recap.db") }

fn default_created_by() -> String { "recap-pipeline".to_owned() }

fn default_artifact_type() -> String { WEEKLY_RECAP.to_owned() }

impl EngineConfig {
  /// Load from `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("RECAP"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: EngineConfig = settings
      .try_deserialize()
      .context("failed to deserialise EngineConfig")?;
    cfg.db_path = expand_tilde(&cfg.db_path);

    if cfg.taxonomy.is_empty() {
      tracing::warn!("taxonomy is empty; every signal will be rejected");
    }
    Ok(cfg)
  }

  pub fn taxonomy(&self) -> TaxonomyAuthority {
    TaxonomyAuthority::new(
      self
        .taxonomy
        .iter()
        .map(|e| (e.signal_type.clone(), e.category.clone())),
    )
  }

  pub fn windows(&self) -> ConfiguredWindows { ConfiguredWindows::new(self.windows.clone()) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use recap_core::signal::ConfidenceTier;

  use super::*;

  fn from_toml(text: &str) -> EngineConfig {
    config::Config::builder()
      .add_source(config::File::from_str(text, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn defaults_apply_to_an_empty_file() {
    let cfg = from_toml("");
    assert_eq!(cfg.db_path, PathBuf::from("recap.db"));
    assert_eq!(cfg.artifact_type, "WEEKLY_RECAP");
    assert_eq!(cfg.selection, SelectionPolicy::default());
    assert!(cfg.taxonomy().is_empty());
  }

  #[test]
  fn full_file() {
    let cfg = from_toml(
      r#"
        db_path = "/tmp/recap.db"
        created_by = "nightly"

        [selection]
        min_confidence = "A"

        [[taxonomy]]
        signal_type = "TRADE_COMPLETED"
        category = "TRANSACTIONS"

        [[windows]]
        season = 2024
        week_index = 1
        start = "2024-09-05T17:00:00Z"
        end = "2024-09-12T17:00:00Z"
      "#,
    );
    assert_eq!(cfg.created_by, "nightly");
    assert_eq!(cfg.selection.min_confidence, ConfidenceTier::A);
    assert!(cfg.selection.require_complete_lineage);
    assert_eq!(cfg.taxonomy().category_for("TRADE_COMPLETED"), Some("TRANSACTIONS"));
    assert_eq!(cfg.windows.len(), 1);
    assert_eq!(cfg.windows[0].league_id, None);
  }

  #[test]
  fn tilde_expands_to_home() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(
        expand_tilde(Path::new("~/recap.db")),
        PathBuf::from(home).join("recap.db")
      );
    }
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}
