//! [`ShareRegistry`] on SQLite, for deployments where share state must
//! survive restarts or be shared between server processes.

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tether_core::share::{RateDecision, ShareRegistry, ShareSession, rate_decision};

use crate::{
  Result, SqliteStore,
  encode::{RawShare, SHARE_COLUMNS, encode_dt},
};

impl ShareRegistry for SqliteStore {
  type Error = crate::Error;

  async fn get_share(&self, token: String) -> Result<Option<ShareSession>> {
    let raw: Option<RawShare> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SHARE_COLUMNS} FROM share_sessions WHERE token = ?1"),
            rusqlite::params![token],
            RawShare::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawShare::into_session).transpose()
  }

  async fn put_share(&self, session: ShareSession) -> Result<ShareSession> {
    let token      = session.token.clone();
    let status     = session.status.as_ref().to_owned();
    let blocked    = session.blocked;
    let reason     = session.reason.clone();
    let created_at = encode_dt(session.created_at);
    let ended_at   = session.ended_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO share_sessions (token, status, blocked, reason, created_at, ended_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (token) DO UPDATE SET
             status = excluded.status,
             blocked = excluded.blocked,
             reason = excluded.reason,
             ended_at = excluded.ended_at",
          rusqlite::params![token, status, blocked, reason, created_at, ended_at],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn check_and_record(
    &self,
    key: String,
    min_interval: TimeDelta,
    now: DateTime<Utc>,
  ) -> Result<RateDecision> {
    let now_ms = now.timestamp_millis();

    let decision = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so two processes cannot
        // both read the same stale mark.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last_ms: Option<i64> = tx
          .query_row(
            "SELECT last_accepted_ms FROM ping_marks WHERE rate_key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
          )
          .optional()?;
        let last = last_ms.and_then(DateTime::<Utc>::from_timestamp_millis);

        let decision = rate_decision(last, min_interval, now);
        if decision == RateDecision::Allowed {
          tx.execute(
            "INSERT INTO ping_marks (rate_key, last_accepted_ms) VALUES (?1, ?2)
             ON CONFLICT (rate_key) DO UPDATE SET
               last_accepted_ms = excluded.last_accepted_ms",
            rusqlite::params![key, now_ms],
          )?;
        }
        tx.commit()?;
        Ok(decision)
      })
      .await?;

    Ok(decision)
  }

  async fn clear_marks(&self, keys: Vec<String>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; keys.len()].join(", ");
        conn.execute(
          &format!("DELETE FROM ping_marks WHERE rate_key IN ({placeholders})"),
          rusqlite::params_from_iter(keys.iter()),
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
