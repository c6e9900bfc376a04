// ==========================================
// 轨道测量任务管理 - 显式执行上下文
// ==========================================
// 每个引擎调用显式接收: 当前事务连接 / 操作人 / 今日日期 / 配置快照 / 标志位
// 红线: 不使用线程局部或全局的"当前用户/当前事务"
// ==========================================

use crate::config::MissionConfig;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::i18n::t_in;
use crate::repository::{
    ActionLogRepository, CartRepository, CatalogRepository, MissionRepository, PlanningRepository,
    QuotationRepository, RequirementRepository, RepositoryResult, ScopeRepository,
    SequenceRepository, TeamRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ContextFlags - 级联写入时的抑制标志
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    /// 不回写报价行 (报价行自身触发的写入)
    pub skip_sales_sync: bool,
    /// 不根据报价单重算状态 (状态由人工动作显式设置)
    pub skip_quotation_sync: bool,
}

// ==========================================
// Notice - 非阻断提示 (随成功写入一起返回)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub key: String,
    pub message: String,
}

// ==========================================
// ExecContext
// ==========================================
pub struct ExecContext<'a> {
    conn: &'a Connection,
    pub actor: String,
    pub today: NaiveDate,
    pub config: MissionConfig,
    pub flags: ContextFlags,
    notices: Vec<Notice>,
}

impl<'a> ExecContext<'a> {
    /// conn 通常是一次请求的事务 (Transaction 解引用为 Connection)
    pub fn new(conn: &'a Connection, actor: &str, today: NaiveDate, config: MissionConfig) -> Self {
        Self {
            conn,
            actor: actor.to_string(),
            today,
            config,
            flags: ContextFlags::default(),
            notices: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: ContextFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    // ===== 仓储访问 (借用同一事务) =====

    pub fn missions(&self) -> MissionRepository<'a> {
        MissionRepository::new(self.conn)
    }

    pub fn requirements(&self) -> RequirementRepository<'a> {
        RequirementRepository::new(self.conn)
    }

    pub fn carts(&self) -> CartRepository<'a> {
        CartRepository::new(self.conn)
    }

    pub fn teams(&self) -> TeamRepository<'a> {
        TeamRepository::new(self.conn)
    }

    pub fn catalog(&self) -> CatalogRepository<'a> {
        CatalogRepository::new(self.conn)
    }

    pub fn planning(&self) -> PlanningRepository<'a> {
        PlanningRepository::new(self.conn)
    }

    pub fn scope(&self) -> ScopeRepository<'a> {
        ScopeRepository::new(self.conn)
    }

    pub fn quotations(&self) -> QuotationRepository<'a> {
        QuotationRepository::new(self.conn)
    }

    pub fn sequences(&self) -> SequenceRepository<'a> {
        SequenceRepository::new(self.conn)
    }

    pub fn action_logs(&self) -> ActionLogRepository<'a> {
        ActionLogRepository::new(self.conn)
    }

    // ===== 审计 =====

    /// 记录操作日志 (与业务写入同一事务)
    pub fn log_action(
        &self,
        mission_id: Option<i64>,
        action_type: ActionType,
        payload: Option<JsonValue>,
        detail: impl Into<String>,
    ) -> RepositoryResult<()> {
        let mut log = ActionLog::new(mission_id, action_type, &self.actor).with_detail(detail);
        if let Some(p) = payload {
            log = log.with_payload(p);
        }
        self.action_logs().insert(&log)?;
        Ok(())
    }

    // ===== 提示 =====

    /// 追加提示, 文本按配置的默认语言渲染
    pub fn notify(&mut self, key: &str, args: &[(&str, &str)]) {
        let message = t_in(&self.config.default_locale, key, args);
        self.notices.push(Notice {
            key: key.to_string(),
            message,
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
