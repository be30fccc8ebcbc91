//! Weekly window resolution.
//!
//! The lock-to-lock boundaries of a league week come from an external
//! authority, modelled as [`WeeklyWindowAuthority`]. The resolver wraps it,
//! rejects degenerate spans, and derives a content-addressed window id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  identity::{compute_sha256_hex_from_payload, window_id_payload},
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum WindowMode {
  #[default]
  LockToLock,
}

/// A raw window as reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
  pub mode:  WindowMode,
}

/// The black-box source of weekly windows.
pub trait WeeklyWindowAuthority {
  fn weekly_window(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Option<WeeklyWindow>;
}

/// A validated window for one league week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
  pub league_id:  String,
  pub season:     i64,
  pub week_index: i64,
  pub window_id:  String,
  pub start:      DateTime<Utc>,
  pub end:        DateTime<Utc>,
  pub mode:       WindowMode,
}

impl ResolvedWindow {
  /// Half-open: `start <= at < end`.
  pub fn contains(&self, at: DateTime<Utc>) -> bool { self.start <= at && at < self.end }
}

pub struct WindowResolver<A> {
  authority: A,
}

impl<A: WeeklyWindowAuthority> WindowResolver<A> {
  pub fn new(authority: A) -> Self { Self { authority } }

  /// Resolve the window for a league week. `Ok(None)` when the authority has
  /// no window or reports one that does not move forward in time.
  pub fn resolve(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Result<Option<ResolvedWindow>> {
    let Some(window) = self.authority.weekly_window(league_id, season, week_index)
    else {
      return Ok(None);
    };

    if window.end <= window.start {
      tracing::warn!(
        league_id,
        season,
        week_index,
        start = %window.start,
        end = %window.end,
        "weekly window is empty or inverted; treating as unresolved"
      );
      return Ok(None);
    }

    let window_id = compute_sha256_hex_from_payload(&window_id_payload(
      league_id,
      season,
      week_index,
      window.mode.as_ref(),
      window.start,
      window.end,
    ))?;

    Ok(Some(ResolvedWindow {
      league_id: league_id.to_owned(),
      season,
      week_index,
      window_id,
      start: window.start,
      end: window.end,
      mode: window.mode,
    }))
  }

  /// Like [`WindowResolver::resolve`], but an unresolved week is an error.
  pub fn require(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Result<ResolvedWindow> {
    self
      .resolve(league_id, season, week_index)?
      .ok_or_else(|| Error::WindowUnresolved {
        league_id: league_id.to_owned(),
        season,
        week_index,
      })
  }
}

// ─── Configured authority ────────────────────────────────────────────────────

/// One configured week. Entries without a `league_id` apply to every league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
  #[serde(default)]
  pub league_id:  Option<String>,
  pub season:     i64,
  pub week_index: i64,
  pub start:      DateTime<Utc>,
  pub end:        DateTime<Utc>,
  #[serde(default)]
  pub mode:       WindowMode,
}

/// A [`WeeklyWindowAuthority`] backed by a static list, usually loaded from
/// configuration. A league-specific entry wins over a shared one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfiguredWindows {
  entries: Vec<WindowEntry>,
}

impl ConfiguredWindows {
  pub fn new(entries: Vec<WindowEntry>) -> Self { Self { entries } }
}

impl WeeklyWindowAuthority for ConfiguredWindows {
  fn weekly_window(
    &self,
    league_id: &str,
    season: i64,
    week_index: i64,
  ) -> Option<WeeklyWindow> {
    let matching = |e: &&WindowEntry| e.season == season && e.week_index == week_index;
    let specific = self
      .entries
      .iter()
      .filter(matching)
      .find(|e| e.league_id.as_deref() == Some(league_id));
    let shared = || {
      self
        .entries
        .iter()
        .filter(matching)
        .find(|e| e.league_id.is_none())
    };
    specific.or_else(shared).map(|e| WeeklyWindow {
      start: e.start,
      end:   e.end,
      mode:  e.mode,
    })
  }
}
