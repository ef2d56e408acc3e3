//! SQL schema for the Tether SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Display data mirrored from the identity provider.
CREATE TABLE IF NOT EXISTS profiles (
    user_id      TEXT PRIMARY KEY,
    email        TEXT,
    display_name TEXT
);

-- Directed trust edges; the pair is the upsert conflict key.
CREATE TABLE IF NOT EXISTS trusted_contacts (
    id                TEXT PRIMARY KEY,
    requester_user_id TEXT NOT NULL,
    requested_user_id TEXT NOT NULL,
    status            TEXT NOT NULL,   -- 'pending' | 'accepted' | 'denied'
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (requester_user_id, requested_user_id),
    CHECK  (requester_user_id != requested_user_id)
);

CREATE TABLE IF NOT EXISTS live_visibility (
    owner_user_id  TEXT NOT NULL,
    viewer_user_id TEXT NOT NULL,
    can_view       INTEGER NOT NULL,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (owner_user_id, viewer_user_id),
    CHECK (owner_user_id != viewer_user_id)
);

-- One row per user, overwritten on every ping. Rows past expires_at are
-- logically absent but are not eagerly deleted.
CREATE TABLE IF NOT EXISTS live_presence (
    user_id    TEXT PRIMARY KEY,
    lat        REAL NOT NULL,
    lng        REAL NOT NULL,
    accuracy_m REAL,
    mode       TEXT NOT NULL,          -- 'active' | 'emergency'
    updated_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS share_sessions (
    token      TEXT PRIMARY KEY,
    status     TEXT NOT NULL,          -- 'live' | 'ended'
    blocked    INTEGER NOT NULL DEFAULT 0,
    reason     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ended_at   TEXT
);

-- Last accepted guest ping per rate-limit key, in Unix milliseconds.
CREATE TABLE IF NOT EXISTS ping_marks (
    rate_key         TEXT PRIMARY KEY,
    last_accepted_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_email_idx       ON profiles(email);
CREATE INDEX IF NOT EXISTS trust_requested_idx      ON trusted_contacts(requested_user_id, status);
CREATE INDEX IF NOT EXISTS visibility_viewer_idx    ON live_visibility(viewer_user_id);
CREATE INDEX IF NOT EXISTS presence_expires_idx     ON live_presence(expires_at);

PRAGMA user_version = 1;
";
