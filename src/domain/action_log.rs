// ==========================================
// 轨道测量任务管理 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录 (紧急放行必须可审计)
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,         // 日志ID (UUID)
    pub mission_id: Option<i64>,   // 关联任务 (目录操作可为 None)
    pub action_type: String,       // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,  // 操作时间戳
    pub actor: String,             // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateMission,      // 创建任务
    UpdateMission,      // 修改任务字段
    UpdateCode,         // 业务编码变更
    UpdateDates,        // 日期变更 (含周计划对齐)
    StateChange,        // 状态迁移
    QuotationSync,      // 报价单驱动的状态同步
    AssignCarts,        // 小车分配
    AssignTeams,        // 班组分配
    UrgencyOverride,    // 紧急放行 (软失败人工确认)
    AttachFile,         // 测量文件归档
    ReplaceScope,       // 范围行批量替换
    DeleteMission,      // 删除任务
    Catalog,            // 目录维护
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateMission => "CreateMission",
            ActionType::UpdateMission => "UpdateMission",
            ActionType::UpdateCode => "UpdateCode",
            ActionType::UpdateDates => "UpdateDates",
            ActionType::StateChange => "StateChange",
            ActionType::QuotationSync => "QuotationSync",
            ActionType::AssignCarts => "AssignCarts",
            ActionType::AssignTeams => "AssignTeams",
            ActionType::UrgencyOverride => "UrgencyOverride",
            ActionType::AttachFile => "AttachFile",
            ActionType::ReplaceScope => "ReplaceScope",
            ActionType::DeleteMission => "DeleteMission",
            ActionType::Catalog => "Catalog",
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `mission_id`: 关联任务ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(mission_id: Option<i64>, action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            mission_id,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
