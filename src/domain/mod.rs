// ==========================================
// 轨道测量任务管理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod catalog;
pub mod mission;
pub mod planning;
pub mod quotation;
pub mod scope;
pub mod team;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use catalog::{AccountingPeriod, AffairType, Cart, CartType, Employee, RailLine, TrackType};
pub use mission::{CartTypeLine, ConflictingMission, DateWindow, Mission};
pub use planning::{DayFile, WeekKey, WeeklyPlanningLine};
pub use quotation::{Quotation, QuotationLine};
pub use scope::{ConsistencyLine, PlatformLine, ScopeSummary, TargetLine};
pub use team::FieldTeam;
pub use types::{
    CartCondition, DaySlot, MeasureStep, MissionState, Nature, ProductionStep, QuotationState,
    StudyStep, TrackGauge, WeekAlignment,
};
