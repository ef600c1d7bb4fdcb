//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rollcall_core::{
  member::{MemberPatch, NewMember, RoleCategory},
  notify::{NewBroadcast, NewPreference, Priority},
  occupancy::UNKNOWN_NAME,
  scan::{Direction, NewScan},
  store::{AttendanceQuery, AttendanceStore, MemberQuery, StoreError},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

async fn scan(s: &SqliteStore, badge: &str, direction: Direction, ts: DateTime<Utc>) {
  s.record_scan_at(NewScan { badge_id: badge.into(), direction }, ts)
    .await
    .unwrap();
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_member() {
  let s = store().await;

  let member = s
    .add_member(NewMember::new("Alice", "alice@lab.example").with_badge("04A1"))
    .await
    .unwrap();
  assert_eq!(member.role, RoleCategory::Member);

  let fetched = s.get_member(member.member_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Alice");
  assert_eq!(fetched.badge_id.as_deref(), Some("04A1"));
}

#[tokio::test]
async fn get_member_missing_returns_none() {
  let s = store().await;
  assert!(s.get_member(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_badge_is_a_conflict() {
  let s = store().await;
  s.add_member(NewMember::new("Alice", "a@lab.example").with_badge("04A1"))
    .await
    .unwrap();

  let err = s
    .add_member(NewMember::new("Bob", "b@lab.example").with_badge("04A1"))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::BadgeTaken(ref b) if b == "04A1"));
  assert!(err.is_conflict());
}

#[tokio::test]
async fn blank_badge_is_stored_as_unassigned() {
  let s = store().await;
  let a = s
    .add_member(NewMember::new("Alice", "a@lab.example").with_badge(""))
    .await
    .unwrap();
  let b = s
    .add_member(NewMember::new("Bob", "b@lab.example").with_badge("  "))
    .await
    .unwrap();
  assert!(a.badge_id.is_none());
  assert!(b.badge_id.is_none());
}

#[tokio::test]
async fn list_members_search_and_role() {
  let s = store().await;
  s.add_member(
    NewMember::new("Alice Lee", "alice@lab.example").with_role(RoleCategory::Lead),
  )
  .await
  .unwrap();
  s.add_member(NewMember::new("Bob", "bob@lab.example").with_badge("CAFE01"))
    .await
    .unwrap();
  s.add_member(NewMember::new("Carol", "carol@lab.example").with_role(RoleCategory::Admin))
    .await
    .unwrap();

  let all = s.list_members(&MemberQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);

  let by_name = s
    .list_members(&MemberQuery { search: Some("ALICE".into()), role: None })
    .await
    .unwrap();
  assert_eq!(by_name.len(), 1);
  assert_eq!(by_name[0].name, "Alice Lee");

  let by_badge = s
    .list_members(&MemberQuery { search: Some("cafe".into()), role: None })
    .await
    .unwrap();
  assert_eq!(by_badge.len(), 1);
  assert_eq!(by_badge[0].name, "Bob");

  let admins = s
    .list_members(&MemberQuery { search: None, role: Some(RoleCategory::Admin) })
    .await
    .unwrap();
  assert_eq!(admins.len(), 1);
  assert_eq!(admins[0].name, "Carol");
}

#[tokio::test]
async fn update_member_applies_patch() {
  let s = store().await;
  let m = s
    .add_member(NewMember::new("Alice", "alice@lab.example"))
    .await
    .unwrap();

  let patch = MemberPatch {
    name: Some("".into()),
    role: Some(RoleCategory::Lead),
    badge_id: Some("04A1".into()),
    ..Default::default()
  };
  let updated = s.update_member(m.member_id, patch).await.unwrap().unwrap();
  assert_eq!(updated.name, "Alice");
  assert_eq!(updated.role, RoleCategory::Lead);

  let fetched = s.get_member(m.member_id).await.unwrap().unwrap();
  assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_member_to_taken_badge_conflicts() {
  let s = store().await;
  s.add_member(NewMember::new("Alice", "a@lab.example").with_badge("04A1"))
    .await
    .unwrap();
  let bob = s
    .add_member(NewMember::new("Bob", "b@lab.example"))
    .await
    .unwrap();

  let patch = MemberPatch { badge_id: Some("04A1".into()), ..Default::default() };
  let err = s.update_member(bob.member_id, patch).await.unwrap_err();
  assert!(err.is_conflict());
}

#[tokio::test]
async fn update_missing_member_returns_none() {
  let s = store().await;
  let res = s
    .update_member(Uuid::new_v4(), MemberPatch::default())
    .await
    .unwrap();
  assert!(res.is_none());
}

#[tokio::test]
async fn delete_member_reports_removal() {
  let s = store().await;
  let m = s
    .add_member(NewMember::new("Alice", "a@lab.example"))
    .await
    .unwrap();

  assert!(s.delete_member(m.member_id).await.unwrap());
  assert!(!s.delete_member(m.member_id).await.unwrap());
  assert!(s.get_member(m.member_id).await.unwrap().is_none());
}

#[tokio::test]
async fn unassigned_badges_lists_unknown_tags_once() {
  let s = store().await;
  s.add_member(NewMember::new("Alice", "a@lab.example").with_badge("KNOWN"))
    .await
    .unwrap();

  scan(&s, "STRAY1", Direction::In, at(8, 0)).await;
  scan(&s, "KNOWN", Direction::In, at(8, 5)).await;
  scan(&s, "STRAY2", Direction::In, at(8, 10)).await;
  scan(&s, "STRAY1", Direction::Out, at(8, 20)).await;

  let badges = s.unassigned_badges().await.unwrap();
  assert_eq!(badges, ["STRAY1", "STRAY2"]);
}

// ─── Scans ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_scan_assigns_increasing_seq() {
  let s = store().await;
  let a = s
    .record_scan(NewScan { badge_id: "B1".into(), direction: Direction::In })
    .await
    .unwrap();
  let b = s
    .record_scan(NewScan { badge_id: "B1".into(), direction: Direction::Out })
    .await
    .unwrap();
  assert!(b.seq > a.seq);
  assert!(b.recorded_at >= a.recorded_at);
}

#[tokio::test]
async fn list_scans_respects_window() {
  let s = store().await;
  scan(&s, "B1", Direction::In, at(8, 0)).await;
  scan(&s, "B1", Direction::Out, at(9, 0)).await;
  scan(&s, "B2", Direction::In, at(10, 0)).await;

  let all = s.list_scans(None, None).await.unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));

  let window = s.list_scans(Some(at(8, 30)), Some(at(9, 0))).await.unwrap();
  assert_eq!(window.len(), 1);
  assert_eq!(window[0].direction, Direction::Out);
}

#[tokio::test]
async fn malformed_rows_are_skipped() {
  let s = store().await;
  scan(&s, "B1", Direction::In, at(8, 0)).await;
  s.execute_raw(
    "INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B2', NULL, '2025-03-10T08:10:00.000000Z');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B3', 'IN', NULL);
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B4', 'WAVE', '2025-03-10T08:20:00.000000Z');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B5', 'in', '2025-03-10T08:30:00.000000Z');",
  )
  .await
  .unwrap();

  let scans = s.list_scans(None, None).await.unwrap();
  let badges: Vec<_> = scans.iter().map(|s| s.badge_id.as_str()).collect();
  assert_eq!(badges, ["B1", "B5"]);

  let state = s.materialize_occupancy(at(0, 0), at(12, 0)).await.unwrap();
  assert_eq!(state.stats.current_occupancy, 2);
}

#[tokio::test]
async fn rows_written_with_other_timestamp_shapes_compare_by_instant() {
  let s = store().await;
  scan(&s, "B1", Direction::In, at(8, 0)).await;
  // 09:00Z written with a +05:30 offset, and 10:00Z in SQLite's own shape.
  s.execute_raw(
    "INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B9', 'IN', '2025-03-10T14:30:00+05:30');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B8', 'IN', '2025-03-10 10:00:00');",
  )
  .await
  .unwrap();

  let all = s.list_scans(None, None).await.unwrap();
  let badges: Vec<_> = all.iter().map(|s| s.badge_id.as_str()).collect();
  assert_eq!(badges, ["B1", "B9", "B8"]);

  let window = s.list_scans(Some(at(8, 30)), Some(at(9, 30))).await.unwrap();
  assert_eq!(window.len(), 1);
  assert_eq!(window[0].badge_id, "B9");
  assert_eq!(window[0].recorded_at, at(9, 0));

  let state = s.materialize_occupancy(at(0, 0), at(12, 0)).await.unwrap();
  assert_eq!(state.stats.current_occupancy, 3);

  let page = s
    .search_attendance(&AttendanceQuery {
      since: Some(at(8, 30)),
      until: Some(at(12, 0)),
      ..Default::default()
    })
    .await
    .unwrap();
  let badges: Vec<_> = page.entries.iter().map(|e| e.badge_id.as_str()).collect();
  assert_eq!(badges, ["B8", "B9"]);
  assert_eq!(page.total, 2);
}

// ─── Attendance log ──────────────────────────────────────────────────────────

#[tokio::test]
async fn attendance_log_joins_member_details() {
  let s = store().await;
  s.add_member(
    NewMember::new("Alice", "alice@lab.example")
      .with_badge("B1")
      .with_role(RoleCategory::Admin),
  )
  .await
  .unwrap();
  scan(&s, "B1", Direction::In, at(8, 0)).await;
  scan(&s, "B9", Direction::In, at(8, 30)).await;

  let page = s
    .search_attendance(&AttendanceQuery::default())
    .await
    .unwrap();
  assert_eq!(page.total, 2);
  assert_eq!(page.limit, 100);

  // Newest first.
  assert_eq!(page.entries[0].badge_id, "B9");
  assert_eq!(page.entries[0].display_name, UNKNOWN_NAME);
  assert_eq!(page.entries[0].role, RoleCategory::Member);
  assert_eq!(page.entries[1].display_name, "Alice");
  assert_eq!(page.entries[1].role, RoleCategory::Admin);
}

#[tokio::test]
async fn attendance_log_filters_and_paginates() {
  let s = store().await;
  s.add_member(NewMember {
    reg_number: Some("R-7".into()),
    ..NewMember::new("Alice Lee", "alice@lab.example").with_badge("B1")
  })
  .await
  .unwrap();

  for i in 0..5 {
    scan(&s, "B1", Direction::In, at(8, i * 10)).await;
    scan(&s, "B1", Direction::Out, at(8, i * 10 + 5)).await;
  }
  scan(&s, "B2", Direction::In, at(9, 0)).await;

  let ins = s
    .search_attendance(&AttendanceQuery {
      direction: Some(Direction::In),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(ins.total, 6);

  let by_name = s
    .search_attendance(&AttendanceQuery {
      name: Some("lee".into()),
      limit: Some(3),
      offset: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_name.total, 10);
  assert_eq!(by_name.entries.len(), 3);
  assert_eq!(by_name.entries[0].recorded_at, at(8, 35));

  let by_reg = s
    .search_attendance(&AttendanceQuery {
      reg_number: Some("R-7".into()),
      since: Some(at(8, 40)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_reg.total, 2);

  let by_badge = s
    .search_attendance(&AttendanceQuery {
      badge_id: Some("B2".into()),
      until: Some(at(8, 59)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_badge.total, 0);
}

#[tokio::test]
async fn attendance_total_counts_only_readable_rows() {
  let s = store().await;
  scan(&s, "B1", Direction::In, at(8, 0)).await;
  s.execute_raw(
    "INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B2', 'IN', 'yesterday');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B3', 'OUT', '09:00');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B4', 'IN', '2460744.875');
     INSERT INTO scans (badge_id, direction, recorded_at)
       VALUES ('B5', 'in', '2025-03-10 08:30');",
  )
  .await
  .unwrap();

  let page = s.search_attendance(&AttendanceQuery::default()).await.unwrap();
  let badges: Vec<_> = page.entries.iter().map(|e| e.badge_id.as_str()).collect();
  assert_eq!(badges, ["B5", "B1"]);
  assert_eq!(page.total, 2);

  let scans = s.list_scans(None, None).await.unwrap();
  assert_eq!(scans.len(), 2);
}

#[tokio::test]
async fn attendance_offset_past_the_end_is_an_empty_page() {
  let s = store().await;
  scan(&s, "B1", Direction::In, at(8, 0)).await;

  let page = s
    .search_attendance(&AttendanceQuery {
      limit: Some(usize::MAX),
      offset: Some(usize::MAX),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(page.entries.is_empty());
  assert_eq!(page.total, 1);
  assert_eq!(page.offset, usize::MAX);
}

// ─── Occupancy ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn materialize_occupancy_uses_window_and_directory() {
  let s = store().await;
  s.add_member(
    NewMember::new("Alice", "alice@lab.example")
      .with_badge("B1")
      .with_role(RoleCategory::Lead),
  )
  .await
  .unwrap();

  // Yesterday's forgotten check-in falls outside today's window.
  scan(&s, "B0", Direction::In, at(8, 0) - Duration::days(1)).await;
  scan(&s, "B1", Direction::In, at(9, 0)).await;
  scan(&s, "B2", Direction::In, at(9, 10)).await;
  scan(&s, "B2", Direction::Out, at(10, 0)).await;
  scan(&s, "B3", Direction::In, at(13, 0)).await;

  let state = s.materialize_occupancy(at(0, 0), at(11, 30)).await.unwrap();

  assert_eq!(state.stats.current_occupancy, 1);
  assert_eq!(state.stats.by_role.lead, 1);
  let alice = &state.currently_inside[0];
  assert_eq!(alice.display_name, "Alice");
  assert_eq!(alice.duration.to_string(), "2h 30m");
  assert!(!state.per_badge.contains_key("B0"));
  assert!(!state.per_badge.contains_key("B3"));
}

#[tokio::test]
async fn materialize_occupancy_empty_store() {
  let s = store().await;
  let state = s.materialize_occupancy(at(0, 0), at(12, 0)).await.unwrap();
  assert!(state.currently_inside.is_empty());
  assert_eq!(state.stats.current_occupancy, 0);
}

// ─── Notifications ───────────────────────────────────────────────────────────

fn broadcast(targets: Vec<RoleCategory>) -> NewBroadcast {
  NewBroadcast {
    sender_email: "ops@lab.example".into(),
    title:        "Lab closed".into(),
    body:         "Closed Friday for maintenance.".into(),
    priority:     Priority::High,
    target_roles: targets,
  }
}

#[tokio::test]
async fn broadcast_counts_targeted_members() {
  let s = store().await;
  s.add_member(NewMember::new("A", "a@lab.example").with_role(RoleCategory::Admin))
    .await
    .unwrap();
  s.add_member(NewMember::new("B", "b@lab.example").with_role(RoleCategory::Lead))
    .await
    .unwrap();
  s.add_member(NewMember::new("C", "c@lab.example"))
    .await
    .unwrap();

  let everyone = s.record_broadcast(broadcast(vec![])).await.unwrap();
  assert_eq!(everyone.recipient_count, 3);

  let leads = s
    .record_broadcast(broadcast(vec![RoleCategory::Lead, RoleCategory::Admin]))
    .await
    .unwrap();
  assert_eq!(leads.recipient_count, 2);

  let history = s.list_broadcasts(50).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history.iter().all(|b| b.priority == Priority::High));
  assert_eq!(history[0].broadcast_id, leads.broadcast_id);
  assert_eq!(history[0].target_roles, [RoleCategory::Lead, RoleCategory::Admin]);

  assert_eq!(s.list_broadcasts(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn preferences_upsert_per_type() {
  let s = store().await;
  let first = s
    .upsert_preference("Alice@Lab.example".into(), NewPreference {
      notification_type: "lab_open".into(),
      enabled:           true,
      push_enabled:      true,
      email_enabled:     false,
    })
    .await
    .unwrap();
  assert_eq!(first.owner_email, "alice@lab.example");

  let second = s
    .upsert_preference("alice@lab.example".into(), NewPreference {
      notification_type: "lab_open".into(),
      enabled:           false,
      push_enabled:      false,
      email_enabled:     true,
    })
    .await
    .unwrap();
  assert_eq!(second.preference_id, first.preference_id);
  assert!(!second.enabled);
  assert!(second.email_enabled);

  let prefs = s.list_preferences("ALICE@lab.example".into()).await.unwrap();
  assert_eq!(prefs.len(), 1);
  assert!(s.list_preferences("bob@lab.example".into()).await.unwrap().is_empty());
}

// ─── Admins ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_lookup_is_case_insensitive() {
  let s = store().await;
  s.add_admin("Ops@Lab.Example".into()).await.unwrap();
  s.add_admin("ops@lab.example".into()).await.unwrap();

  assert!(s.is_admin("OPS@lab.example".into()).await.unwrap());
  assert!(!s.is_admin("someone@lab.example".into()).await.unwrap());
}

#[tokio::test]
async fn admins_can_be_listed_and_removed() {
  let s = store().await;
  assert!(s.add_admin("zed@lab.example".into()).await.unwrap());
  assert!(s.add_admin("Amy@Lab.example".into()).await.unwrap());
  assert!(!s.add_admin("AMY@lab.example".into()).await.unwrap());

  assert_eq!(s.list_admins().await.unwrap(), ["amy@lab.example", "zed@lab.example"]);

  assert!(s.remove_admin("ZED@lab.example".into()).await.unwrap());
  assert!(!s.remove_admin("zed@lab.example".into()).await.unwrap());
  assert!(!s.is_admin("zed@lab.example".into()).await.unwrap());
  assert_eq!(s.list_admins().await.unwrap(), ["amy@lab.example"]);
}
