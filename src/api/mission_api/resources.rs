// ==========================================
// 资源分配: 需求行 / 小车 / 班组 / 周计划班次
// ==========================================
// 红线: 直接写入小车或班组时, 日历冲突即阻断 (紧急子状态除外)
// ==========================================

use super::core::MissionApi;
use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::domain::action_log::ActionType;
use crate::domain::catalog::Cart;
use crate::domain::mission::{CartTypeLine, Mission};
use crate::domain::planning::WeeklyPlanningLine;
use crate::domain::types::DaySlot;
use crate::engine::context::{ContextFlags, ExecContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// 小车下拉选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartOption {
    pub cart_id: i64,
    pub label: String,
}

/// 班组下拉选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOption {
    pub team_id: i64,
    pub label: String,
}

fn check_quantity(quantity: i32) -> ApiResult<()> {
    if quantity < 1 {
        return Err(ApiError::ValidationError(format!(
            "需求数量必须 >= 1 (实际 {})",
            quantity
        )));
    }
    Ok(())
}

fn ensure_resources_editable(mission: &Mission) -> ApiResult<()> {
    if !mission.state.accepts_resource_edits() {
        return Err(ApiError::BusinessRuleViolation(format!(
            "任务 {} 处于 {} 状态, 不能再修改需求行或小车分配",
            mission.reference, mission.state
        )));
    }
    Ok(())
}

impl MissionApi {
    // ==========================================
    // 小车类型需求行
    // ==========================================

    /// 新增需求行 (同一任务同一类型只能有一行)
    pub fn add_requirement(
        &self,
        actor: &str,
        mission_id: i64,
        cart_type_id: i64,
        quantity: i32,
    ) -> ApiResult<WriteOutcome<CartTypeLine>> {
        check_quantity(quantity)?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mission = ctx.missions().get(mission_id)?;
            ensure_resources_editable(&mission)?;
            let cart_type = ctx
                .catalog()
                .find_cart_type(cart_type_id)?
                .ok_or_else(|| ApiError::NotFound(format!("小车类型(id={})不存在", cart_type_id)))?;

            let existing = ctx.requirements().list_by_mission(mission_id)?;
            if existing.iter().any(|l| l.cart_type_id == cart_type_id) {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "任务 {} 已有小车类型 {} 的需求行",
                    mission.reference, cart_type.name
                )));
            }

            let mut line = CartTypeLine {
                id: 0,
                mission_id,
                cart_type_id,
                quantity,
                assigned_cart_ids: Vec::new(),
            };
            line.id = ctx.requirements().insert(&line)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::UpdateMission,
                Some(json!({ "cart_type": cart_type.name, "quantity": quantity })),
                format!("新增需求行 {}x {}", quantity, cart_type.name),
            )?;
            self.sales.sync_quotation_line(ctx, &mission)?;
            Ok(line)
        })
    }

    pub fn update_requirement_quantity(
        &self,
        actor: &str,
        line_id: i64,
        quantity: i32,
    ) -> ApiResult<WriteOutcome<CartTypeLine>> {
        check_quantity(quantity)?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let line = ctx.requirements().get(line_id)?;
            let mission = ctx.missions().get(line.mission_id)?;
            ensure_resources_editable(&mission)?;
            ctx.requirements().update_quantity(line_id, quantity)?;
            ctx.log_action(
                Some(line.mission_id),
                ActionType::UpdateMission,
                Some(json!({ "line_id": line_id, "from": line.quantity, "to": quantity })),
                "修改需求数量",
            )?;
            self.sales.sync_quotation_line(ctx, &mission)?;
            Ok(ctx.requirements().get(line_id)?)
        })
    }

    pub fn remove_requirement(&self, actor: &str, line_id: i64) -> ApiResult<WriteOutcome<()>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let line = ctx.requirements().get(line_id)?;
            let mission = ctx.missions().get(line.mission_id)?;
            ensure_resources_editable(&mission)?;
            ctx.requirements().delete(line_id)?;
            ctx.log_action(
                Some(line.mission_id),
                ActionType::UpdateMission,
                Some(json!({ "line_id": line_id, "cart_type_id": line.cart_type_id })),
                "删除需求行",
            )?;
            self.sales.sync_quotation_line(ctx, &mission)?;
            Ok(())
        })
    }

    /// 覆盖需求行的已分配小车
    ///
    /// # 校验
    /// - 任务须处于售前或生产阶段
    /// - 小车类型必须与需求行一致
    /// - 分配数量不得超过需求数量
    /// - 日历冲突阻断 (紧急子状态仅记录警告)
    pub fn set_assigned_carts(
        &self,
        actor: &str,
        line_id: i64,
        cart_ids: Vec<i64>,
    ) -> ApiResult<WriteOutcome<CartTypeLine>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let line = ctx.requirements().get(line_id)?;
            let mission = ctx.missions().get(line.mission_id)?;
            ensure_resources_editable(&mission)?;

            let mut unique: Vec<i64> = Vec::with_capacity(cart_ids.len());
            for id in cart_ids {
                if !unique.contains(&id) {
                    unique.push(id);
                }
            }
            if unique.len() > line.quantity.max(0) as usize {
                return Err(ApiError::ValidationError(format!(
                    "需求行只需要 {} 台小车, 实际提交 {} 台",
                    line.quantity,
                    unique.len()
                )));
            }

            let mut names = Vec::with_capacity(unique.len());
            for cart_id in &unique {
                let cart = ctx.carts().get(*cart_id)?;
                if cart.cart_type_id != line.cart_type_id {
                    return Err(ApiError::ValidationError(format!(
                        "小车 {} 的类型与需求行不一致",
                        cart.name
                    )));
                }
                names.push(cart.name);
            }

            self.detector.guard_cart_links(ctx, &mission, &unique)?;
            ctx.requirements().replace_assigned(line_id, &unique)?;
            ctx.log_action(
                Some(mission.id),
                ActionType::AssignCarts,
                Some(json!({ "line_id": line_id, "cart_ids": unique })),
                format!("分配小车: {}", names.join(", ")),
            )?;
            info!(mission = %mission.reference, carts = ?names, "小车已分配");
            Ok(ctx.requirements().get(line_id)?)
        })
    }

    /// 设置两个班组槽位
    pub fn set_teams(
        &self,
        actor: &str,
        mission_id: i64,
        team_1_id: Option<i64>,
        team_2_id: Option<i64>,
    ) -> ApiResult<WriteOutcome<Mission>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            mission.team_1_id = team_1_id;
            mission.team_2_id = team_2_id;
            for team_id in mission.teams() {
                ctx.teams().get(team_id)?;
            }

            self.detector.guard_team_links(ctx, &mission)?;
            ctx.missions().update(&mission)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::AssignTeams,
                Some(json!({ "team_1": team_1_id, "team_2": team_2_id })),
                "分配班组",
            )?;
            self.sales.sync_quotation_line(ctx, &mission)?;
            Ok(mission)
        })
    }

    // ==========================================
    // 周计划班次
    // ==========================================

    pub fn set_day_slots(
        &self,
        actor: &str,
        planning_id: i64,
        slots: [DaySlot; 7],
    ) -> ApiResult<WriteOutcome<WeeklyPlanningLine>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let row = self.planner.set_day_slots(ctx, planning_id, slots)?;
            ctx.log_action(
                Some(row.mission_id),
                ActionType::UpdateMission,
                Some(json!({ "week": row.week_label(), "slots": row.slots })),
                format!("修改 {} 班次", row.week_label()),
            )?;
            Ok(row)
        })
    }

    // ==========================================
    // 可用性展示
    // ==========================================

    /// 某类型全部小车的下拉标签 (相对任务窗口, 排除任务自身)
    pub fn cart_options(&self, mission_id: i64, cart_type_id: i64) -> ApiResult<Vec<CartOption>> {
        self.store.read(|ctx| {
            let mission = ctx.missions().get(mission_id)?;
            let window = mission.window();
            let mut options = Vec::new();
            for cart in ctx.carts().list_by_type(cart_type_id)? {
                let label = self
                    .detector
                    .cart_label(ctx, &cart, window.as_ref(), Some(mission.id))?;
                options.push(CartOption {
                    cart_id: cart.id,
                    label,
                });
            }
            Ok(options)
        })
    }

    /// 全部启用班组的下拉标签
    pub fn team_options(&self, mission_id: i64) -> ApiResult<Vec<TeamOption>> {
        self.store.read(|ctx| {
            let mission = ctx.missions().get(mission_id)?;
            let window = mission.window();
            let mut options = Vec::new();
            for team_id in ctx.teams().list_active_ids()? {
                let team = ctx.teams().get(team_id)?;
                let label = self
                    .detector
                    .team_label(ctx, &team, window.as_ref(), Some(mission.id))?;
                options.push(TeamOption { team_id, label });
            }
            debug!(mission_id, count = options.len(), "班组选项");
            Ok(options)
        })
    }

    /// 任务窗口内物理可用且空闲的小车
    pub fn available_carts(&self, mission_id: i64, cart_type_id: i64) -> ApiResult<Vec<Cart>> {
        self.store.read(|ctx| self.available_carts_in(ctx, mission_id, cart_type_id))
    }

    fn available_carts_in(
        &self,
        ctx: &ExecContext<'_>,
        mission_id: i64,
        cart_type_id: i64,
    ) -> ApiResult<Vec<Cart>> {
        let mission = ctx.missions().get(mission_id)?;
        let window = mission.window().ok_or_else(|| {
            ApiError::ValidationError(format!("任务 {} 尚未设置起止日期", mission.reference))
        })?;
        Ok(self
            .detector
            .available_carts(ctx, cart_type_id, &window, Some(mission.id))?)
    }
}
