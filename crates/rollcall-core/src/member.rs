//! Members, the people who hold badges.
//!
//! A scan refers to a member only weakly, through the badge id. A badge that
//! no member holds is still a valid badge; it just resolves to "Unknown".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Coarse classification used only for aggregate reporting.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RoleCategory {
  Admin,
  Lead,
  #[default]
  Member,
}

impl RoleCategory {
  /// Interpret free-form role text. Anything unrecognised, including a
  /// missing value, counts as a plain member.
  pub fn from_text_lossy(s: Option<&str>) -> Self {
    s.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
  }
}

/// A person record in the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:    Uuid,
  pub name:         String,
  pub email:        String,
  pub reg_number:   Option<String>,
  pub phone_number: Option<String>,
  pub role:         RoleCategory,
  /// The RFID tag assigned to this member, if any. Unique across members.
  pub badge_id:     Option<String>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_member`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
  pub name:         String,
  pub email:        String,
  pub reg_number:   Option<String>,
  pub phone_number: Option<String>,
  #[serde(default)]
  pub role:         RoleCategory,
  pub badge_id:     Option<String>,
}

impl NewMember {
  /// Convenience constructor with all optional fields unset.
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name:         name.into(),
      email:        email.into(),
      reg_number:   None,
      phone_number: None,
      role:         RoleCategory::default(),
      badge_id:     None,
    }
  }

  pub fn with_badge(mut self, badge_id: impl Into<String>) -> Self {
    self.badge_id = Some(badge_id.into());
    self
  }

  pub fn with_role(mut self, role: RoleCategory) -> Self {
    self.role = role;
    self
  }
}

/// A partial update. `None` and empty strings leave the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub reg_number:   Option<String>,
  pub phone_number: Option<String>,
  pub role:         Option<RoleCategory>,
  pub badge_id:     Option<String>,
}

impl MemberPatch {
  /// Apply the patch in place. Returns `true` if anything changed.
  pub fn apply(self, member: &mut Member) -> bool {
    fn present(v: Option<String>) -> Option<String> {
      v.filter(|s| !s.trim().is_empty())
    }

    let mut changed = false;
    if let Some(name) = present(self.name) {
      member.name = name;
      changed = true;
    }
    if let Some(email) = present(self.email) {
      member.email = email;
      changed = true;
    }
    if let Some(reg) = present(self.reg_number) {
      member.reg_number = Some(reg);
      changed = true;
    }
    if let Some(phone) = present(self.phone_number) {
      member.phone_number = Some(phone);
      changed = true;
    }
    if let Some(role) = self.role {
      member.role = role;
      changed = true;
    }
    if let Some(badge) = present(self.badge_id) {
      member.badge_id = Some(badge);
      changed = true;
    }
    changed
  }
}
