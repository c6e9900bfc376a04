// ==========================================
// 轨道测量任务管理 - API 层
// ==========================================
// 职责: 用例门面; 每次调用一个事务, 构造显式执行上下文, 统一错误转换
// ==========================================

pub mod catalog_api;
pub mod error;
pub mod import_api;
pub mod mission_api;
pub mod portal_api;
pub mod store;

// 重导出核心类型
pub use catalog_api::CatalogApi;
pub use error::{ApiError, ApiResult, WriteOutcome};
pub use import_api::{FileAnalysis, ImportApi};
pub use mission_api::{CartOption, MissionApi, TeamOption};
pub use portal_api::{PortalApi, PortalRequest};
pub use store::Store;
