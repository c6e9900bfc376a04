// ==========================================
// 轨道测量任务管理 - 范围行仓储
// ==========================================
// 一致性区段 / 目标点 / 站台, 均归属任务并随任务级联删除
// ==========================================

use crate::domain::scope::{ConsistencyLine, PlatformLine, TargetLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};

pub struct ScopeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ScopeRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ===== 一致性区段 =====

    pub fn delete_consistency(&self, mission_id: i64) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM scope_consistency WHERE mission_id = ?1",
            params![mission_id],
        )?)
    }

    pub fn insert_consistency(&self, mission_id: i64, line: &ConsistencyLine) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO scope_consistency (mission_id, track, pk_start, pk_end, description)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![mission_id, line.track, line.pk_start, line.pk_end, line.description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_consistency(&self, mission_id: i64) -> RepositoryResult<Vec<ConsistencyLine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, mission_id, track, pk_start, pk_end, description
            FROM scope_consistency WHERE mission_id = ?1 ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![mission_id], |row| {
                Ok(ConsistencyLine {
                    id: row.get(0)?,
                    mission_id: row.get(1)?,
                    track: row.get(2)?,
                    pk_start: row.get(3)?,
                    pk_end: row.get(4)?,
                    description: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ===== 站台 =====

    pub fn delete_platforms(&self, mission_id: i64) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM scope_platform WHERE mission_id = ?1",
            params![mission_id],
        )?)
    }

    pub fn insert_platform(&self, mission_id: i64, line: &PlatformLine) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO scope_platform (mission_id, station, platform, track, pk_start, pk_end, length_m)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                mission_id,
                line.station,
                line.platform,
                line.track,
                line.pk_start,
                line.pk_end,
                line.length_m,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_platforms(&self, mission_id: i64) -> RepositoryResult<Vec<PlatformLine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, mission_id, station, platform, track, pk_start, pk_end, length_m
            FROM scope_platform WHERE mission_id = ?1 ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![mission_id], |row| {
                Ok(PlatformLine {
                    id: row.get(0)?,
                    mission_id: row.get(1)?,
                    station: row.get(2)?,
                    platform: row.get(3)?,
                    track: row.get(4)?,
                    pk_start: row.get(5)?,
                    pk_end: row.get(6)?,
                    length_m: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ===== 目标点 =====

    pub fn insert_target(&self, mission_id: i64, target: &TargetLine) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO scope_target (mission_id, label, pk, kind) VALUES (?1, ?2, ?3, ?4)",
            params![mission_id, target.label, target.pk, target.kind],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_target(&self, target: &TargetLine) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE scope_target SET label = ?1, pk = ?2, kind = ?3 WHERE id = ?4",
            params![target.label, target.pk, target.kind, target.id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("TargetLine", target.id));
        }
        Ok(())
    }

    pub fn delete_target(&self, target_id: i64) -> RepositoryResult<()> {
        let rows = self
            .conn
            .execute("DELETE FROM scope_target WHERE id = ?1", params![target_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("TargetLine", target_id));
        }
        Ok(())
    }

    pub fn list_targets(&self, mission_id: i64) -> RepositoryResult<Vec<TargetLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mission_id, label, pk, kind FROM scope_target WHERE mission_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![mission_id], |row| {
                Ok(TargetLine {
                    id: row.get(0)?,
                    mission_id: row.get(1)?,
                    label: row.get(2)?,
                    pk: row.get(3)?,
                    kind: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}
