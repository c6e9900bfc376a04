// ==========================================
// 轨道测量任务管理 - 周计划生成引擎
// ==========================================
// 职责: 保持任务的周计划行与 [date_start, date_end] 同步
// 算法: 跨度扩展到 周一..周日 → 枚举 ISO (年, 周) → 与已有行做差集
//       只删除离开范围的周、只新建进入范围的周, 未变化的周不触碰
// 红线: 未变化的周其日班/夜班选择必须保持原样
// ==========================================

use crate::domain::mission::Mission;
use crate::domain::planning::{WeekKey, WeeklyPlanningLine};
use crate::domain::types::{DaySlot, WeekAlignment};
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// 一个 ISO 周 (键 + 周一/周日)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoWeekSpan {
    pub key: WeekKey,
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
}

/// 差集结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDelta {
    pub to_delete: Vec<WeekKey>,
    pub to_create: Vec<IsoWeekSpan>,
}

impl PlanDelta {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

// ==========================================
// 纯函数
// ==========================================

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn sunday_of(date: NaiveDate) -> NaiveDate {
    monday_of(date) + Duration::days(6)
}

/// 跨度向外扩展到整周 (只扩不缩)
pub fn normalize_span(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    (monday_of(start), sunday_of(end))
}

/// 枚举覆盖跨度的全部 ISO 周 (按时间顺序)
pub fn iso_weeks(start: NaiveDate, end: NaiveDate) -> Vec<IsoWeekSpan> {
    let (first, last) = normalize_span(start, end);
    let mut weeks = Vec::new();
    let mut monday = first;
    while monday <= last {
        let iso = monday.iso_week();
        weeks.push(IsoWeekSpan {
            key: (iso.year(), iso.week()),
            monday,
            sunday: monday + Duration::days(6),
        });
        monday += Duration::days(7);
    }
    weeks
}

/// 已有周键与目标周集合的差集
pub fn plan_delta(existing: &[WeekKey], target: &[IsoWeekSpan]) -> PlanDelta {
    let existing_set: BTreeSet<WeekKey> = existing.iter().copied().collect();
    let target_set: BTreeSet<WeekKey> = target.iter().map(|w| w.key).collect();

    PlanDelta {
        to_delete: existing
            .iter()
            .filter(|k| !target_set.contains(k))
            .copied()
            .collect(),
        to_create: target
            .iter()
            .filter(|w| !existing_set.contains(&w.key))
            .copied()
            .collect(),
    }
}

/// 按对齐策略处理写入的日期
///
/// 返回 (开始, 结束, 是否发生了扩展)
pub fn align_dates(
    start: NaiveDate,
    end: NaiveDate,
    alignment: WeekAlignment,
) -> EngineResult<(NaiveDate, NaiveDate, bool)> {
    if end < start {
        return Err(EngineError::InvalidDateRange { start, end });
    }
    let aligned = start.weekday() == Weekday::Mon && end.weekday() == Weekday::Sun;
    if aligned {
        return Ok((start, end, false));
    }
    match alignment {
        WeekAlignment::Snap => {
            let (s, e) = normalize_span(start, end);
            Ok((s, e, true))
        }
        WeekAlignment::Strict => Err(EngineError::WeekdayMisalignment(format!(
            "开始日期 {} 必须是周一 ({}), 结束日期 {} 必须是周日 ({})",
            start,
            start.weekday(),
            end,
            end.weekday()
        ))),
    }
}

/// 非空选择数 (日班或夜班)
pub fn slot_count(row: &WeeklyPlanningLine) -> u32 {
    row.slot_count()
}

// ==========================================
// WeeklyPlanner - 周计划引擎
// ==========================================
#[derive(Debug, Default)]
pub struct WeeklyPlanner;

impl WeeklyPlanner {
    pub fn new() -> Self {
        Self
    }

    /// 在当前事务内应用差集 (任务日期每次写入后调用)
    ///
    /// 日期不全时删除全部周计划行
    pub fn reconcile(&self, ctx: &mut ExecContext<'_>, mission: &Mission) -> EngineResult<PlanDelta> {
        let repo = ctx.planning();
        let existing: Vec<WeekKey> = repo
            .list_by_mission(mission.id)?
            .iter()
            .map(|r| r.key())
            .collect();

        let target = match (mission.date_start, mission.date_end) {
            (Some(start), Some(end)) if end >= start => iso_weeks(start, end),
            (Some(start), Some(end)) => return Err(EngineError::InvalidDateRange { start, end }),
            _ => Vec::new(),
        };

        let delta = plan_delta(&existing, &target);
        if delta.is_noop() {
            debug!(mission_id = mission.id, "周计划无变化");
            return Ok(delta);
        }

        for key in &delta.to_delete {
            repo.delete_week(mission.id, *key)?;
        }
        for week in &delta.to_create {
            repo.insert_week(mission.id, week.key, week.monday, week.sunday)?;
        }

        info!(
            mission_id = mission.id,
            deleted = delta.to_delete.len(),
            created = delta.to_create.len(),
            "周计划已同步"
        );
        if !delta.to_delete.is_empty() {
            let count = delta.to_delete.len().to_string();
            ctx.notify("planning.weeks_removed", &[("count", &count)]);
        }
        Ok(delta)
    }

    /// 更新某周七天的日班/夜班选择
    pub fn set_day_slots(
        &self,
        ctx: &ExecContext<'_>,
        planning_id: i64,
        slots: [DaySlot; 7],
    ) -> EngineResult<WeeklyPlanningLine> {
        let repo = ctx.planning();
        repo.get(planning_id)?;
        repo.update_slots(planning_id, &slots)?;
        Ok(repo.get(planning_id)?)
    }

    /// 任务总班次数 (全部周计划行 slot_count 之和)
    pub fn total_periods(&self, ctx: &ExecContext<'_>, mission_id: i64) -> EngineResult<u32> {
        Ok(ctx
            .planning()
            .list_by_mission(mission_id)?
            .iter()
            .map(slot_count)
            .sum())
    }
}
