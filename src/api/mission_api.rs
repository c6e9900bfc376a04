// ==========================================
// 轨道测量任务管理 - 任务 API
// ==========================================
// 职责: 任务聚合根的全部用例 (字段写入/资源分配/生命周期/报价联动/查询)
// 约束: 每次调用一个事务, 引擎只接收显式 ExecContext
// ==========================================

mod core;
mod lifecycle_ops;
mod queries;
mod records;
mod resources;

pub use self::core::MissionApi;
pub use resources::{CartOption, TeamOption};
