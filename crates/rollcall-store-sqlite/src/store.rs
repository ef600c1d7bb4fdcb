//! [`SqliteStore`], the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rollcall_core::{
  member::{Member, MemberPatch, NewMember, RoleCategory},
  notify::{Broadcast, NewBroadcast, NewPreference, NotificationPreference},
  occupancy::{OccupancyState, index_by_badge, resolve_occupancy},
  scan::{AttendancePage, NewScan, ScanEvent},
  store::{AttendanceQuery, AttendanceStore, DEFAULT_PAGE_SIZE, MemberQuery},
};

use crate::{
  Error, Result,
  encode::{
    MEMBER_COLUMNS, PREFERENCE_COLUMNS, RawAttendance, RawBroadcast, RawMember,
    RawPreference, RawScan, decode_scans, encode_dt, encode_role, encode_roles,
    encode_uuid, normalize_email, timestamp_guard,
  },
  schema::SCHEMA,
};

/// The current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the connection. Tests use this to simulate rows
  /// written by the reader middleware.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a scan with an explicit timestamp. Used by seeding and tests;
  /// [`AttendanceStore::record_scan`] always stamps with the current time.
  pub async fn record_scan_at(
    &self,
    input: NewScan,
    recorded_at: DateTime<Utc>,
  ) -> Result<ScanEvent> {
    let badge_id      = input.badge_id.clone();
    let direction_str = input.direction.as_ref().to_owned();
    let at_str        = encode_dt(recorded_at);

    let seq = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO scans (badge_id, direction, recorded_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![badge_id, direction_str, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(seq, badge_id = %input.badge_id, direction = %input.direction, "recorded scan");

    Ok(ScanEvent {
      seq,
      badge_id: input.badge_id,
      direction: input.direction,
      recorded_at,
    })
  }

  /// Write every column of `member`, inserting or updating.
  ///
  /// Returns [`Error::BadgeTaken`] if another member already holds the badge.
  async fn write_member(&self, member: &Member, insert: bool) -> Result<()> {
    let id_str       = encode_uuid(member.member_id);
    let name         = member.name.clone();
    let email        = member.email.clone();
    let reg_number   = member.reg_number.clone();
    let phone_number = member.phone_number.clone();
    let role_str     = encode_role(member.role).to_owned();
    let badge_id     = member.badge_id.clone();
    let at_str       = encode_dt(member.created_at);

    let conflict: Option<String> = self
      .conn
      .call(move |conn| {
        if let Some(badge) = &badge_id {
          let taken = conn
            .query_row(
              "SELECT 1 FROM members WHERE badge_id = ?1 AND member_id != ?2",
              rusqlite::params![badge, id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if taken {
            return Ok(Some(badge.clone()));
          }
        }

        if insert {
          conn.execute(
            "INSERT INTO members (
               member_id, name, email, reg_number, phone_number, role, badge_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
              id_str, name, email, reg_number, phone_number, role_str, badge_id, at_str,
            ],
          )?;
        } else {
          conn.execute(
            "UPDATE members
             SET name = ?2, email = ?3, reg_number = ?4, phone_number = ?5,
                 role = ?6, badge_id = ?7
             WHERE member_id = ?1",
            rusqlite::params![
              id_str, name, email, reg_number, phone_number, role_str, badge_id,
            ],
          )?;
        }
        Ok(None)
      })
      .await?;

    match conflict {
      Some(badge) => Err(Error::BadgeTaken(badge)),
      None => Ok(()),
    }
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Members ───────────────────────────────────────────────────────────────

  async fn add_member(&self, input: NewMember) -> Result<Member> {
    let member = Member {
      member_id:    Uuid::new_v4(),
      name:         input.name,
      email:        input.email,
      reg_number:   input.reg_number,
      phone_number: input.phone_number,
      role:         input.role,
      badge_id:     input.badge_id.filter(|b| !b.trim().is_empty()),
      created_at:   now(),
    };

    self.write_member(&member, true).await?;
    tracing::info!(member_id = %member.member_id, "added member");
    Ok(member)
  }

  async fn get_member(&self, id: Uuid) -> Result<Option<Member>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = ?1"),
            rusqlite::params![id_str],
            RawMember::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn list_members(&self, query: &MemberQuery) -> Result<Vec<Member>> {
    let pattern = query
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| format!("%{}%", s.to_lowercase()));

    let raws: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMBER_COLUMNS} FROM members
           WHERE ?1 IS NULL
              OR LOWER(name) LIKE ?1
              OR LOWER(email) LIKE ?1
              OR LOWER(COALESCE(reg_number, '')) LIKE ?1
              OR LOWER(COALESCE(badge_id, '')) LIKE ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], RawMember::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut members: Vec<Member> = raws
      .into_iter()
      .map(RawMember::into_member)
      .collect::<Result<_>>()?;

    // Role text is interpreted leniently, so filter after decoding.
    if let Some(role) = query.role {
      members.retain(|m| m.role == role);
    }

    Ok(members)
  }

  async fn update_member(&self, id: Uuid, patch: MemberPatch) -> Result<Option<Member>> {
    let mut member = match self.get_member(id).await? {
      Some(m) => m,
      None    => return Ok(None),
    };

    if patch.apply(&mut member) {
      self.write_member(&member, false).await?;
      tracing::info!(member_id = %id, "updated member");
    }

    Ok(Some(member))
  }

  async fn delete_member(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM members WHERE member_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if removed > 0 {
      tracing::info!(member_id = %id, "deleted member");
    }
    Ok(removed > 0)
  }

  async fn unassigned_badges(&self) -> Result<Vec<String>> {
    let badges = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT s.badge_id
           FROM scans s
           LEFT JOIN members m ON m.badge_id = s.badge_id
           WHERE m.member_id IS NULL
             AND TRIM(s.badge_id) != ''
           GROUP BY s.badge_id
           ORDER BY MAX(s.seq) DESC",
        )?;
        let rows = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(badges)
  }

  // ── Scans ─────────────────────────────────────────────────────────────────

  async fn record_scan(&self, input: NewScan) -> Result<ScanEvent> {
    self.record_scan_at(input, now()).await
  }

  async fn list_scans(
    &self,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
  ) -> Result<Vec<ScanEvent>> {
    let since_str = since.map(encode_dt);
    let until_str = until.map(encode_dt);

    let raws: Vec<RawScan> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT seq, badge_id, direction, recorded_at
           FROM scans
           WHERE (?1 IS NULL OR julianday(recorded_at) >= julianday(?1))
             AND (?2 IS NULL OR julianday(recorded_at) <= julianday(?2))
           ORDER BY julianday(recorded_at) ASC, seq ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since_str, until_str], RawScan::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut scans = decode_scans(raws);
    // julianday() keeps milliseconds only; trim to the exact window.
    scans.retain(|s| {
      since.is_none_or(|t| s.recorded_at >= t) && until.is_none_or(|t| s.recorded_at <= t)
    });
    Ok(scans)
  }

  async fn search_attendance(&self, query: &AttendanceQuery) -> Result<AttendancePage> {
    let since_str  = query.since.map(encode_dt);
    let until_str  = query.until.map(encode_dt);
    let badge_id   = query.badge_id.clone();
    let direction  = query.direction.map(|d| d.as_ref().to_owned());
    let name_like  = query
      .name
      .as_deref()
      .map(|n| format!("%{}%", n.trim().to_lowercase()));
    let reg_number = query.reg_number.clone();
    let limit      = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset     = query.offset.unwrap_or(0);
    // Offsets past the end of the table select nothing either way.
    let limit_val  = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(offset).unwrap_or(i64::MAX);

    let (raws, total): (Vec<RawAttendance>, i64) = self
      .conn
      .call(move |conn| {
        let filter = format!(
          "FROM scans s
           LEFT JOIN members m ON m.badge_id = s.badge_id
           WHERE {timestamp_ok}
             AND UPPER(TRIM(s.direction)) IN ('IN', 'OUT')
             AND (?1 IS NULL OR julianday(s.recorded_at) >= julianday(?1))
             AND (?2 IS NULL OR julianday(s.recorded_at) <= julianday(?2))
             AND (?3 IS NULL OR s.badge_id = ?3)
             AND (?4 IS NULL OR UPPER(TRIM(s.direction)) = ?4)
             AND (?5 IS NULL OR LOWER(m.name) LIKE ?5)
             AND (?6 IS NULL OR m.reg_number = ?6)",
          timestamp_ok = timestamp_guard("s.recorded_at"),
        );

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) {filter}"),
          rusqlite::params![since_str, until_str, badge_id, direction, name_like, reg_number],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT s.seq, s.badge_id, s.direction, s.recorded_at,
                  m.name, m.email, m.reg_number, m.phone_number, m.role
           {filter}
           ORDER BY julianday(s.recorded_at) DESC, s.seq DESC
           LIMIT ?7 OFFSET ?8"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              since_str, until_str, badge_id, direction, name_like, reg_number,
              limit_val, offset_val,
            ],
            RawAttendance::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    let entries = raws
      .into_iter()
      .filter_map(|raw| match raw.into_entry() {
        Ok(entry) => Some(entry),
        Err(e) => {
          tracing::warn!(error = %e, "skipping malformed attendance row");
          None
        }
      })
      .collect();

    Ok(AttendancePage {
      entries,
      total: u64::try_from(total).unwrap_or(0),
      limit,
      offset,
    })
  }

  async fn materialize_occupancy(
    &self,
    window_start: DateTime<Utc>,
    as_of: DateTime<Utc>,
  ) -> Result<OccupancyState> {
    let scans = self.list_scans(Some(window_start), Some(as_of)).await?;
    let members = self.list_members(&MemberQuery::default()).await?;
    let directory = index_by_badge(members);

    let state = resolve_occupancy(&scans, as_of, &directory);
    tracing::debug!(
      scans = scans.len(),
      inside = state.stats.current_occupancy,
      "materialised occupancy"
    );
    Ok(state)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn record_broadcast(&self, input: NewBroadcast) -> Result<Broadcast> {
    let roles_str = encode_roles(&input.target_roles)?;
    let targets   = input.target_roles.clone();

    let recipient_count: u64 = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT role FROM members")?;
        let roles = stmt
          .query_map([], |row| row.get::<_, Option<String>>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(roles)
      })
      .await?
      .iter()
      .map(|r| RoleCategory::from_text_lossy(r.as_deref()))
      .filter(|r| targets.is_empty() || targets.contains(r))
      .count() as u64;

    let broadcast = Broadcast {
      broadcast_id: Uuid::new_v4(),
      sender_email: input.sender_email,
      title:        input.title,
      body:         input.body,
      priority:     input.priority,
      target_roles: input.target_roles,
      recipient_count,
      sent_at:      now(),
    };

    let id_str       = encode_uuid(broadcast.broadcast_id);
    let sender       = broadcast.sender_email.clone();
    let title        = broadcast.title.clone();
    let body         = broadcast.body.clone();
    let priority_str = broadcast.priority.as_ref().to_owned();
    let count_val    = recipient_count as i64;
    let at_str       = encode_dt(broadcast.sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO broadcasts (
             broadcast_id, sender_email, title, body, priority,
             target_roles, recipient_count, sent_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, sender, title, body, priority_str, roles_str, count_val, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::info!(
      broadcast_id = %broadcast.broadcast_id,
      recipients = recipient_count,
      "recorded broadcast"
    );
    Ok(broadcast)
  }

  async fn list_broadcasts(&self, limit: usize) -> Result<Vec<Broadcast>> {
    let limit_val = limit as i64;

    let raws: Vec<RawBroadcast> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT broadcast_id, sender_email, title, body, priority,
                  target_roles, recipient_count, sent_at
           FROM broadcasts
           ORDER BY sent_at DESC, rowid DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |row| {
            Ok(RawBroadcast {
              broadcast_id:    row.get(0)?,
              sender_email:    row.get(1)?,
              title:           row.get(2)?,
              body:            row.get(3)?,
              priority:        row.get(4)?,
              target_roles:    row.get(5)?,
              recipient_count: row.get(6)?,
              sent_at:         row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBroadcast::into_broadcast).collect()
  }

  async fn upsert_preference(
    &self,
    owner_email: String,
    input: NewPreference,
  ) -> Result<NotificationPreference> {
    let new_id_str = encode_uuid(Uuid::new_v4());
    let owner      = normalize_email(&owner_email);
    let at_str     = encode_dt(now());

    let raw: RawPreference = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_preferences (
             preference_id, owner_email, notification_type,
             enabled, push_enabled, email_enabled, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (owner_email, notification_type) DO UPDATE SET
             enabled       = excluded.enabled,
             push_enabled  = excluded.push_enabled,
             email_enabled = excluded.email_enabled,
             updated_at    = excluded.updated_at",
          rusqlite::params![
            new_id_str,
            owner,
            input.notification_type,
            input.enabled,
            input.push_enabled,
            input.email_enabled,
            at_str,
          ],
        )?;
        Ok(conn.query_row(
          &format!(
            "SELECT {PREFERENCE_COLUMNS} FROM notification_preferences
             WHERE owner_email = ?1 AND notification_type = ?2"
          ),
          rusqlite::params![owner, input.notification_type],
          RawPreference::from_row,
        )?)
      })
      .await?;

    raw.into_preference()
  }

  async fn list_preferences(&self, owner_email: String) -> Result<Vec<NotificationPreference>> {
    let owner = normalize_email(&owner_email);

    let raws: Vec<RawPreference> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PREFERENCE_COLUMNS} FROM notification_preferences
           WHERE owner_email = ?1
           ORDER BY notification_type"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner], RawPreference::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPreference::into_preference).collect()
  }

  // ── Admins ────────────────────────────────────────────────────────────────

  async fn add_admin(&self, email: String) -> Result<bool> {
    let email = normalize_email(&email);
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO admins (email) VALUES (?1)",
          rusqlite::params![email],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  async fn remove_admin(&self, email: String) -> Result<bool> {
    let email = normalize_email(&email);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM admins WHERE email = ?1", rusqlite::params![email])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn list_admins(&self) -> Result<Vec<String>> {
    let emails = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT email FROM admins ORDER BY email")?;
        let rows = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(emails)
  }

  async fn is_admin(&self, email: String) -> Result<bool> {
    let email = normalize_email(&email);
    let found = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM admins WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;
    Ok(found)
  }
}
