// ==========================================
// 轨道测量任务管理 - 测量范围行
// ==========================================
// 职责: 线路构成 (consistance)、标靶 (cible)、站台 (quai)
// 来源: 表格导入协作方批量写入, 开票同步消费
// ==========================================

use serde::{Deserialize, Serialize};

/// 线路构成行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyLine {
    pub id: i64,
    pub mission_id: i64,
    pub track: Option<String>,
    pub pk_start: f64,
    pub pk_end: f64,
    pub description: Option<String>,
}

impl ConsistencyLine {
    pub fn length_km(&self) -> f64 {
        (self.pk_end - self.pk_start).abs()
    }
}

/// 标靶/标记行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLine {
    pub id: i64,
    pub mission_id: i64,
    pub label: String,
    pub pk: Option<f64>,
    pub kind: Option<String>,
}

/// 站台行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformLine {
    pub id: i64,
    pub mission_id: i64,
    pub station: String,
    pub platform: Option<String>,
    pub track: Option<String>,
    pub pk_start: Option<f64>,
    pub pk_end: Option<f64>,
    pub length_m: Option<f64>,
}

/// 范围汇总 (开票同步使用)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub consistency_count: usize,
    pub consistency_km: f64,
    pub target_count: usize,
    pub platform_count: usize,
    pub platform_m: f64,
}
