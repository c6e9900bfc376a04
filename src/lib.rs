// ==========================================
// 轨道测量任务管理 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 测量任务从售前到开票的全流程管理
//          (生命周期 / 资源冲突 / 周计划 / 业务编码)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CartCondition, DaySlot, MeasureStep, MissionState, Nature, ProductionStep, QuotationState,
    StudyStep, WeekAlignment,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Cart, CartTypeLine, FieldTeam, Mission, RailLine, WeeklyPlanningLine,
};

// 引擎
pub use engine::{
    AssignmentOutcome, ConflictDetector, LifecycleEngine, NamingEngine, SalesSync, WeeklyPlanner,
};

// API
pub use api::{ApiError, ApiResult, CatalogApi, ImportApi, MissionApi, PortalApi, WriteOutcome};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "轨道几何测量任务管理";

// 数据库版本
pub const DB_VERSION: &str = "v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(db::CURRENT_SCHEMA_VERSION, 1);
    }
}
