// ==========================================
// 轨道测量任务管理 - 操作日志数据仓储
// ==========================================
// 红线: 所有任务写入必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
