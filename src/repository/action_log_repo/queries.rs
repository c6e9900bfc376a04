use super::core::{ActionLogRepository, TS_FMT};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, mission_id, action_type, action_ts, actor, payload_json, detail";

impl<'a> ActionLogRepository<'a> {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", LOG_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![action_id], |row| self.map_row(row))
            .optional()?)
    }

    /// 查询指定任务的所有操作日志 (最新在前)
    pub fn find_by_mission(&self, mission_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let sql = format!(
            "SELECT {} FROM action_log WHERE mission_id = ?1 ORDER BY action_ts DESC, rowid DESC",
            LOG_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![mission_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询指定任务、指定类型的日志
    pub fn find_by_mission_and_type(
        &self,
        mission_id: i64,
        action_type: &str,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let sql = format!(
            "SELECT {} FROM action_log WHERE mission_id = ?1 AND action_type = ?2 ORDER BY action_ts DESC, rowid DESC",
            LOG_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![mission_id, action_type], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            LOG_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 映射数据库行到 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let ts_raw: String = row.get(3)?;
        let action_ts = NaiveDateTime::parse_from_str(&ts_raw, TS_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            mission_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts,
            actor: row.get(4)?,
            payload_json: row
                .get::<_, Option<String>>(5)?
                .and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(6)?,
        })
    }
}
