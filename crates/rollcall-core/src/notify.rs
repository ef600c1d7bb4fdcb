//! Broadcast messages and per-user notification preferences.
//!
//! Only the bookkeeping lives here. Actually pushing a message to devices is
//! handled by whatever delivery service is wired up downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, member::RoleCategory};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Normal,
  High,
  Urgent,
}

impl Priority {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownPriority(s.to_owned()))
  }
}

/// A message sent by an admin to every member, or to selected roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
  pub broadcast_id:    Uuid,
  pub sender_email:    String,
  pub title:           String,
  pub body:            String,
  pub priority:        Priority,
  /// Empty means everyone.
  pub target_roles:    Vec<RoleCategory>,
  /// Members matching `target_roles` at the time of sending.
  pub recipient_count: u64,
  pub sent_at:         DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::record_broadcast`].
#[derive(Debug, Clone)]
pub struct NewBroadcast {
  pub sender_email: String,
  pub title:        String,
  pub body:         String,
  pub priority:     Priority,
  pub target_roles: Vec<RoleCategory>,
}

/// Whether a user wants a given kind of notification, and over which channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
  pub preference_id:     Uuid,
  pub owner_email:       String,
  pub notification_type: String,
  pub enabled:           bool,
  pub push_enabled:      bool,
  pub email_enabled:     bool,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::upsert_preference`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPreference {
  pub notification_type: String,
  #[serde(default = "default_true")]
  pub enabled:           bool,
  #[serde(default = "default_true")]
  pub push_enabled:      bool,
  #[serde(default)]
  pub email_enabled:     bool,
}

fn default_true() -> bool { true }
