use crate::api::store::Store;
use crate::config::ConfigManager;
use crate::engine::{ConflictDetector, LifecycleEngine, NamingEngine, SalesSync, WeeklyPlanner};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

// ==========================================
// MissionApi - 任务 API
// ==========================================

/// 任务API
///
/// 职责：
/// 1. 任务创建/修改/删除 (编码同步、周计划对齐、报价行回写)
/// 2. 需求行、小车、班组分配 (写入时冲突约束)
/// 3. 生命周期推进、分配校验、紧急放行
/// 4. 报价单联动 (关联/解除/状态变化)
/// 5. 派生值、进度图、可用性标签查询
pub struct MissionApi {
    pub(super) store: Store,
    pub(super) naming: NamingEngine,
    pub(super) lifecycle: LifecycleEngine,
    pub(super) planner: WeeklyPlanner,
    pub(super) detector: ConflictDetector,
    pub(super) sales: SalesSync,
}

impl MissionApi {
    /// 创建新的MissionApi实例
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self::with_store(Store::new(conn, config))
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            naming: NamingEngine::new(),
            lifecycle: LifecycleEngine::new(),
            planner: WeeklyPlanner::new(),
            detector: ConflictDetector::new(),
            sales: SalesSync::new(),
        }
    }

    /// 固定"今日"日期
    pub fn with_today(self, today: NaiveDate) -> Self {
        let store = self.store.clone().with_today(today);
        Self { store, ..self }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
