// ==========================================
// 轨道测量任务管理 - 引擎层错误类型
// ==========================================
// 阻断性校验错误: 中止当前操作, 事务整体回滚
// 软失败不在此处, 见 engine::conflict::SoftFailure
// ==========================================

use crate::domain::mission::ConflictingMission;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 文件匹配命中的候选任务 (多选时返回给调用方)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionCandidate {
    pub mission_id: i64,
    pub reference: String,
    pub code: Option<String>,
}

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 校验错误 =====
    #[error("校验失败: {0}")]
    ValidationFailed(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("任务 {reference} 已离开售前阶段, 分类字段 {field} 不可修改")]
    ClassificationLocked { reference: String, field: String },

    #[error("需求数量不符: 小车类型 {cart_type} 需要 {required} 台, 实际分配 {assigned} 台")]
    QuantityMismatch {
        cart_type: String,
        required: i32,
        assigned: usize,
    },

    #[error("资源冲突: {resource} 已被占用 {}", describe_conflicts(.conflicts))]
    ResourceConflict {
        resource: String,
        conflicts: Vec<ConflictingMission>,
    },

    #[error("日期未对齐整周: {0}")]
    WeekdayMisalignment(String),

    #[error("日期范围无效: 结束日期 {end} 早于开始日期 {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("无法生成业务编码: {0}")]
    CodeGeneration(String),

    // ===== 文件归档 =====
    #[error("没有任务匹配该测量文件: {0}")]
    NoMatchingMission(String),

    #[error("测量文件匹配到多个任务, 需要人工选择: {}", describe_candidates(.0))]
    MultipleMatches(Vec<MissionCandidate>),

    #[error("周计划不存在: {0}")]
    PlanningWeekMissing(String),

    #[error("文件解析失败: {0}")]
    ParseError(String),

    // ===== 数据访问 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn describe_conflicts(conflicts: &[ConflictingMission]) -> String {
    conflicts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_candidates(candidates: &[MissionCandidate]) -> String {
    candidates
        .iter()
        .map(|c| c.code.clone().unwrap_or_else(|| c.reference.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
