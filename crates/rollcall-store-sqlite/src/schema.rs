//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS members (
    member_id     TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL,
    reg_number    TEXT,
    phone_number  TEXT,
    role          TEXT NOT NULL DEFAULT 'member',  -- 'admin' | 'lead' | 'member'
    badge_id      TEXT UNIQUE,
    created_at    TEXT NOT NULL
);

-- Scans are strictly append-only and may also be written by the reader
-- middleware directly, so direction and recorded_at are not trusted.
CREATE TABLE IF NOT EXISTS scans (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    badge_id     TEXT NOT NULL,
    direction    TEXT,             -- 'IN' | 'OUT'
    recorded_at  TEXT              -- fixed-width RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS broadcasts (
    broadcast_id     TEXT PRIMARY KEY,
    sender_email     TEXT NOT NULL,
    title            TEXT NOT NULL,
    body             TEXT NOT NULL,
    priority         TEXT NOT NULL DEFAULT 'normal',
    target_roles     TEXT NOT NULL DEFAULT '[]',
    recipient_count  INTEGER NOT NULL,
    sent_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_preferences (
    preference_id      TEXT PRIMARY KEY,
    owner_email        TEXT NOT NULL,
    notification_type  TEXT NOT NULL,
    enabled            INTEGER NOT NULL,
    push_enabled       INTEGER NOT NULL,
    email_enabled      INTEGER NOT NULL,
    updated_at         TEXT NOT NULL,
    UNIQUE (owner_email, notification_type)
);

-- Lower-cased email addresses allowed to send broadcasts.
CREATE TABLE IF NOT EXISTS admins (
    email  TEXT PRIMARY KEY
);

CREATE INDEX IF NOT EXISTS scans_badge_idx     ON scans(badge_id);
CREATE INDEX IF NOT EXISTS scans_recorded_idx  ON scans(recorded_at);
CREATE INDEX IF NOT EXISTS broadcasts_sent_idx ON broadcasts(sent_at);

PRAGMA user_version = 1;
";
