// ==========================================
// 轨道测量任务管理 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 仓储借用调用方的连接 (通常是一次请求的事务)
// ==========================================

pub mod action_log_repo;
pub mod cart_repo;
pub mod catalog_repo;
pub mod convert;
pub mod error;
pub mod mission_repo;
pub mod planning_repo;
pub mod quotation_repo;
pub mod requirement_repo;
pub mod scope_repo;
pub mod sequence_repo;
pub mod team_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use cart_repo::CartRepository;
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use mission_repo::{FileMatchQuery, MissionRepository};
pub use planning_repo::PlanningRepository;
pub use quotation_repo::QuotationRepository;
pub use requirement_repo::RequirementRepository;
pub use scope_repo::ScopeRepository;
pub use sequence_repo::SequenceRepository;
pub use team_repo::TeamRepository;
