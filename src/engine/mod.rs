// ==========================================
// 轨道测量任务管理 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎 (状态机/冲突检测/周计划/编码/派生值/销售同步/文件归档)
// 红线: Engine 不拼 SQL, 所有失败必须输出原因
// ==========================================

pub mod conflict;
pub mod context;
pub mod derived;
pub mod error;
pub mod file_attach;
pub mod lifecycle;
pub mod naming;
pub mod progress_graph;
pub mod sales_sync;
pub mod scope_import;
pub mod weekly_planning;

// 重导出核心引擎
pub use conflict::{AssignmentReport, ConflictDetector, HardFailure, SoftFailure};
pub use context::{ContextFlags, ExecContext, Notice};
pub use derived::MissionFigures;
pub use error::{EngineError, EngineResult, MissionCandidate};
pub use file_attach::{AttachReceipt, FileAttacher, MeasurementFileHeader, MeasurementFileParser};
pub use lifecycle::{derive_from_quotation, AssignmentOutcome, LifecycleEngine};
pub use naming::{NamingEngine, ParsedCode};
pub use progress_graph::{NodeStatus, ProgressNode};
pub use sales_sync::SalesSync;
pub use scope_import::{ScopeSheet, ScopeSheetReader, ScopeWriter};
pub use weekly_planning::{IsoWeekSpan, PlanDelta, WeeklyPlanner};
