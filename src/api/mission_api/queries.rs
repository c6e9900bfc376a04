// ==========================================
// 只读查询: 派生值 / 进度图 / 子记录 / 审计日志
// ==========================================

use super::core::MissionApi;
use crate::api::error::ApiResult;
use crate::domain::action_log::ActionLog;
use crate::domain::mission::CartTypeLine;
use crate::domain::planning::{DayFile, WeeklyPlanningLine};
use crate::engine::conflict::AssignmentReport;
use crate::engine::derived::MissionFigures;
use crate::engine::progress_graph::{progress_nodes, render_mermaid, ProgressNode};

impl MissionApi {
    /// 派生值: 距离、总班次、进度、总价、工期
    pub fn figures(&self, mission_id: i64) -> ApiResult<MissionFigures> {
        self.store.read(|ctx| {
            let mission = ctx.missions().get(mission_id)?;
            let planning = ctx.planning().list_by_mission(mission_id)?;
            Ok(MissionFigures::compute(&mission, &planning))
        })
    }

    pub fn progress_nodes(&self, mission_id: i64) -> ApiResult<Vec<ProgressNode>> {
        self.store
            .read(|ctx| Ok(progress_nodes(ctx.missions().get(mission_id)?.state)))
    }

    /// Mermaid 流程图文本
    pub fn progress_mermaid(&self, mission_id: i64) -> ApiResult<String> {
        self.store
            .read(|ctx| Ok(render_mermaid(ctx.missions().get(mission_id)?.state)))
    }

    /// 分配校验预览 (不改变状态)
    pub fn check_assignment(&self, mission_id: i64) -> ApiResult<AssignmentReport> {
        self.store.read(|ctx| {
            let mission = ctx.missions().get(mission_id)?;
            Ok(self.detector.check_assignment(ctx, &mission)?)
        })
    }

    pub fn list_requirements(&self, mission_id: i64) -> ApiResult<Vec<CartTypeLine>> {
        self.store
            .read(|ctx| Ok(ctx.requirements().list_by_mission(mission_id)?))
    }

    /// 周计划行 (按周排序)
    pub fn list_planning(&self, mission_id: i64) -> ApiResult<Vec<WeeklyPlanningLine>> {
        self.store
            .read(|ctx| Ok(ctx.planning().list_by_mission(mission_id)?))
    }

    pub fn list_day_files(&self, planning_id: i64) -> ApiResult<Vec<DayFile>> {
        self.store
            .read(|ctx| Ok(ctx.planning().list_day_files(planning_id)?))
    }

    pub fn action_logs(&self, mission_id: i64) -> ApiResult<Vec<ActionLog>> {
        self.store
            .read(|ctx| Ok(ctx.action_logs().find_by_mission(mission_id)?))
    }
}
