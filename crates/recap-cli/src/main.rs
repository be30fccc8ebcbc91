//! `recap`: batch driver for the weekly recap engine.
//!
//! # Usage
//!
//! ```text
//! recap --config recap.toml select --league L1 --season 2024 --week 3 --signals signals.json
//! recap draft --league L1 --season 2024 --week 3 --signals signals.json
//! recap approve 6f1c… --actor alice --role primary
//! recap bulk --action approved --actor alice --role co_commissioner 6f1c… 9a2e…
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use recap_core::{
  approval::Actor,
  artifact::ArtifactKey,
  attunement::{EalMeta, evaluate_editorial_attunement},
  lifecycle::{self, BulkActionRequest},
  selection::{SelectionOutcome, SelectionSetBuilder},
  store::ArtifactStore,
  taxonomy::SignalTaxonomyEnforcer,
  window::{ResolvedWindow, WindowResolver},
};
use recap_store_sqlite::SqliteStore;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::EngineConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "recap", version, about = "Weekly recap selection and approval")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "recap.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Build the selection for a week and record its run trace.
  Select {
    #[command(flatten)]
    week:    WeekArgs,
    /// JSON file holding an array of signal objects.
    #[arg(long, value_name = "FILE")]
    signals: PathBuf,
  },
  /// Select, then draft a new artifact version if the selection changed.
  Draft {
    #[command(flatten)]
    week:    WeekArgs,
    #[arg(long, value_name = "FILE")]
    signals: PathBuf,
  },
  /// Approve a draft.
  Approve {
    artifact_id: Uuid,
    #[command(flatten)]
    actor:       ActorArgs,
  },
  /// Withhold a draft with a reason code.
  Withhold {
    artifact_id: Uuid,
    /// SCREAMING_SNAKE_CASE reason code, e.g. DATA_GAP.
    #[arg(long)]
    reason:      String,
    #[command(flatten)]
    actor:       ActorArgs,
  },
  /// Apply one action to several artifacts at once.
  Bulk {
    /// approved | regenerate_requested | annotated
    #[arg(long)]
    action:       String,
    #[command(flatten)]
    actor:        ActorArgs,
    #[arg(required = true)]
    artifact_ids: Vec<Uuid>,
  },
  /// Show every version of a week's recap, and staleness if signals are
  /// given.
  Status {
    #[command(flatten)]
    week:    WeekArgs,
    #[arg(long, value_name = "FILE")]
    signals: Option<PathBuf>,
  },
  /// Print the stored run trace of a week.
  Trace {
    #[command(flatten)]
    week: WeekArgs,
  },
}

#[derive(Args, Debug)]
struct WeekArgs {
  #[arg(long)]
  league: String,
  #[arg(long)]
  season: i64,
  #[arg(long)]
  week:   i64,
}

#[derive(Args, Debug)]
struct ActorArgs {
  #[arg(long)]
  actor: String,
  /// primary | co_commissioner | delegate
  #[arg(long, default_value = "primary")]
  role:  String,
  #[arg(long)]
  note:  Option<String>,
}

impl ActorArgs {
  fn actor(&self) -> Result<Actor> { Ok(Actor::parse(self.actor.clone(), &self.role)?) }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = EngineConfig::load(&cli.config)?;
  let mut store = SqliteStore::open(&cfg.db_path)
    .with_context(|| format!("failed to open store at {:?}", cfg.db_path))?;

  let output = run(cli.command, &cfg, &mut store)?;
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

fn run(command: Command, cfg: &EngineConfig, store: &mut SqliteStore) -> Result<Value> {
  match command {
    Command::Select { week, signals } => {
      let (window, outcome) = select(cfg, &week, &signals)?;
      let run = lifecycle::record_run(store, &window, &outcome.selection_set)?;
      Ok(json!({ "selection": outcome, "run": run }))
    }

    Command::Draft { week, signals } => {
      let (window, outcome) = select(cfg, &week, &signals)?;
      let selection = &outcome.selection_set;
      let run = lifecycle::record_run(store, &window, selection)?;
      let key = ArtifactKey::new(
        selection.league_id.clone(),
        selection.season,
        selection.week_index,
        cfg.artifact_type.clone(),
      );
      let draft = lifecycle::create_draft(store, &key, selection, &cfg.created_by)?;
      Ok(json!({
        "created":  draft.is_created(),
        "artifact": draft.artifact(),
        "run":      run,
      }))
    }

    Command::Approve { artifact_id, actor } => {
      let artifact =
        lifecycle::approve(store, artifact_id, &actor.actor()?, actor.note.as_deref())?;
      to_json(&artifact)
    }

    Command::Withhold { artifact_id, reason, actor } => {
      let artifact = lifecycle::withhold(
        store,
        artifact_id,
        &reason,
        &actor.actor()?,
        actor.note.as_deref(),
      )?;
      to_json(&artifact)
    }

    Command::Bulk { action, actor, artifact_ids } => {
      let request = BulkActionRequest {
        actor: actor.actor,
        actor_role: actor.role,
        artifact_ids,
        action,
        note: actor.note,
      };
      let outcome = lifecycle::apply_bulk_action(store, &request)?;
      Ok(json!({
        "action": outcome.approval.action,
        "role":   outcome.approval.role,
        "items":  outcome.items,
      }))
    }

    Command::Status { week, signals } => {
      let key = ArtifactKey::new(week.league.clone(), week.season, week.week, cfg.artifact_type.clone());
      let versions = store.list_versions(&key)?;
      let approved = lifecycle::current_approved(&*store, &key)?;
      let staleness = match signals {
        Some(path) => {
          let (_, outcome) = select(cfg, &week, &path)?;
          Some(lifecycle::check_staleness(&*store, &outcome.selection_set)?)
        }
        None => None,
      };
      Ok(json!({
        "versions":  versions,
        "approved":  approved.map(|a| a.artifact_id),
        "staleness": staleness,
      }))
    }

    Command::Trace { week } => {
      match store.get_run_trace(&week.league, week.season, week.week)? {
        Some(run) => Ok(json!({ "run": run, "directive": run.directive() })),
        None => bail!(
          "no run trace for league {} season {} week {}",
          week.league,
          week.season,
          week.week
        ),
      }
    }
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Resolve the window and build the selection for a week.
fn select(
  cfg: &EngineConfig,
  week: &WeekArgs,
  signals: &Path,
) -> Result<(ResolvedWindow, SelectionOutcome)> {
  let resolver = WindowResolver::new(cfg.windows());
  let window = match resolver.require(&week.league, week.season, week.week) {
    Ok(window) => window,
    Err(e) => {
      let directive = evaluate_editorial_attunement(&EalMeta::without_window());
      tracing::warn!(%directive, "no window; nothing will be selected");
      return Err(e.into());
    }
  };

  let signals = read_signals(signals)?;
  let builder =
    SelectionSetBuilder::new(SignalTaxonomyEnforcer::new(cfg.taxonomy()), cfg.selection);
  let outcome = builder.build(&window, &signals)?;
  Ok((window, outcome))
}

fn read_signals(path: &Path) -> Result<Vec<Value>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading signals file {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing signals file {}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> { Ok(serde_json::to_value(value)?) }
