// ==========================================
// 轨道测量任务管理 - 请求执行器
// ==========================================
// 每次请求: 读取配置快照 → 获取连接锁 → 开启事务 → 构造 ExecContext
//          → 执行闭包 → 提交; 任何错误时事务随 drop 回滚
// 红线: 配置快照必须在获取连接锁之前读取 (ConfigManager 共享同一连接)
// ==========================================

use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::config::{ConfigManager, MissionConfig};
use crate::engine::context::{ContextFlags, ExecContext};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    config: Arc<ConfigManager>,
    today: Option<NaiveDate>,
}

impl Store {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self {
            conn,
            config,
            today: None,
        }
    }

    /// 固定"今日"日期 (测试与回放使用)
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn config_manager(&self) -> Arc<ConfigManager> {
        Arc::clone(&self.config)
    }

    fn load_config(&self) -> ApiResult<MissionConfig> {
        MissionConfig::load(self.config.as_ref())
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {}", e)))
    }

    /// 在单个事务内执行写操作, 返回结果与提示
    pub fn write<T>(
        &self,
        actor: &str,
        flags: ContextFlags,
        f: impl FnOnce(&mut ExecContext<'_>) -> ApiResult<T>,
    ) -> ApiResult<WriteOutcome<T>> {
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let config = self.load_config()?;
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let conn = self
            .conn
            .lock()
            .map_err(|e| ApiError::DatabaseConnectionError(format!("锁获取失败: {}", e)))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

        let (value, notices) = {
            let mut ctx = ExecContext::new(&tx, actor, today, config).with_flags(flags);
            let value = f(&mut ctx)?;
            (value, ctx.take_notices())
        };

        tx.commit()
            .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
        debug!(actor, notices = notices.len(), "事务已提交");
        Ok(WriteOutcome { value, notices })
    }

    /// 只读请求 (同样在事务内执行, 结束时回滚)
    pub fn read<T>(&self, f: impl FnOnce(&ExecContext<'_>) -> ApiResult<T>) -> ApiResult<T> {
        let config = self.load_config()?;
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let conn = self
            .conn
            .lock()
            .map_err(|e| ApiError::DatabaseConnectionError(format!("锁获取失败: {}", e)))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
        let ctx = ExecContext::new(&tx, "system", today, config);
        f(&ctx)
    }
}
