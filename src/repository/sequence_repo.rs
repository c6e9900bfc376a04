// ==========================================
// 轨道测量任务管理 - 序列号仓储
// ==========================================
// 任务 reference 由此发放, 单调递增, 与业务编码无关
// ==========================================

use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SequenceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SequenceRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 取出下一个值并推进序列 (首次调用返回 1)
    pub fn next_value(&self, code: &str) -> RepositoryResult<i64> {
        let current: Option<i64> = self
            .conn
            .query_row(
                "SELECT next_value FROM sequence WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;

        let value = current.unwrap_or(1);
        self.conn.execute(
            r#"
            INSERT INTO sequence (code, next_value) VALUES (?1, ?2)
            ON CONFLICT(code) DO UPDATE SET next_value = excluded.next_value
            "#,
            params![code, value + 1],
        )?;
        Ok(value)
    }
}
