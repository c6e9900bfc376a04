use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};

pub(super) const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> ActionLogRepository<'a> {
    /// 创建新的操作日志仓储 (借用当前事务连接)
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        self.conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, mission_id, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                log.action_id,
                log.mission_id,
                log.action_type,
                log.action_ts.format(TS_FMT).to_string(),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }
}
