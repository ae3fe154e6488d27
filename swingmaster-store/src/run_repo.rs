//! Run bookkeeping: one `rc_run` row per engine invocation.

use rusqlite::{params, Connection};

use crate::error::StoreError;

pub struct RcRunRepo<'a> {
    conn: &'a Connection,
}

impl<'a> RcRunRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_run(
        &self,
        run_id: &str,
        created_at: &str,
        engine_version: &str,
        policy_id: &str,
        policy_version: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO rc_run (run_id, created_at, engine_version, policy_id, policy_version)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, created_at, engine_version, policy_id, policy_version],
        )?;
        Ok(())
    }
}
