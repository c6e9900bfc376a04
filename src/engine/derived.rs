// ==========================================
// 轨道测量任务管理 - 派生值计算
// ==========================================
// 职责: 距离、总班次、进度百分比、总价、工期
// 调用方式: 由改变输入的写操作显式调用, 不存在隐式触发器
// ==========================================

use crate::domain::mission::Mission;
use crate::domain::planning::WeeklyPlanningLine;
use serde::{Deserialize, Serialize};

/// 公里标精度 (3 位小数, 即米)
fn round_km(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// 测量距离 (km) = |pk_final − pk_initial|
pub fn distance(mission: &Mission) -> f64 {
    round_km((mission.pk_final - mission.pk_initial).abs())
}

/// 总班次数 = 各周计划行非空选择数之和
pub fn total_periods(rows: &[WeeklyPlanningLine]) -> u32 {
    rows.iter().map(|r| r.slot_count()).sum()
}

/// 实测进度百分比 (0..=100)
///
/// 未写入实测起止或计划距离为 0 时返回 None
pub fn progress_pct(mission: &Mission) -> Option<f64> {
    let planned = distance(mission);
    if planned <= 0.0 {
        return None;
    }
    let (start, end) = (mission.progress_start?, mission.progress_end?);
    let covered = (end - start).abs();
    Some(((covered / planned) * 100.0).clamp(0.0, 100.0))
}

/// 总价 = 距离 × 每公里单价 + 总班次 × 每班次单价
pub fn price_total(mission: &Mission, total_periods: u32) -> f64 {
    let amount = distance(mission) * mission.price_unit + total_periods as f64 * mission.daily_rate;
    (amount * 100.0).round() / 100.0
}

/// 工期 (天, 含首尾)
pub fn duration_days(mission: &Mission) -> Option<i64> {
    match (mission.date_start, mission.date_end) {
        (Some(start), Some(end)) if end >= start => Some((end - start).num_days() + 1),
        _ => None,
    }
}

// ==========================================
// MissionFigures - 派生值汇总 (只读视图)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionFigures {
    pub distance_km: f64,
    pub total_periods: u32,
    pub progress_pct: Option<f64>,
    pub price_total: f64,
    pub duration_days: Option<i64>,
}

impl MissionFigures {
    pub fn compute(mission: &Mission, planning: &[WeeklyPlanningLine]) -> Self {
        let periods = total_periods(planning);
        Self {
            distance_km: distance(mission),
            total_periods: periods,
            progress_pct: progress_pct(mission),
            price_total: price_total(mission, periods),
            duration_days: duration_days(mission),
        }
    }
}
