// ==========================================
// 生命周期操作 + 报价单联动
// ==========================================
// 报价单是外部协作方: 状态变化时被动同步关联任务的主状态;
// 同步期间抑制报价行回写, 避免级联写回报价单自身
// ==========================================

use super::core::MissionApi;
use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::domain::action_log::ActionType;
use crate::domain::mission::Mission;
use crate::domain::quotation::{Quotation, QuotationLine};
use crate::domain::types::{MissionState, QuotationState};
use crate::engine::context::ContextFlags;
use crate::engine::lifecycle::AssignmentOutcome;
use serde_json::json;
use tracing::info;

impl MissionApi {
    // ==========================================
    // 状态推进
    // ==========================================

    /// 单步推进 (物资检查之后须经 validate_assignment)
    pub fn advance(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<MissionState>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            Ok(self.lifecycle.advance(ctx, &mut mission)?)
        })
    }

    /// 小车分配校验
    ///
    /// # 参数
    /// - confirm_urgency: 用户已确认软失败 (转入紧急子状态)
    ///
    /// # 返回
    /// - Ok(Assigned): 进入已分配 (或直接进入测量/等待)
    /// - Ok(ConfirmationRequired): 存在软失败, 状态未改变
    /// - Ok(Urgency): 已确认放行
    /// - Err: 硬失败 (缺日期/缺需求行/数量不符/类型错误)
    pub fn validate_assignment(
        &self,
        actor: &str,
        mission_id: i64,
        confirm_urgency: bool,
    ) -> ApiResult<WriteOutcome<AssignmentOutcome>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            Ok(self
                .lifecycle
                .validate_assignment(ctx, &mut mission, confirm_urgency)?)
        })
    }

    pub fn cancel(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<MissionState>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            self.lifecycle.cancel(ctx, &mut mission)?;
            Ok(mission.state)
        })
    }

    pub fn reset_to_presale(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<MissionState>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            self.lifecycle.reset_to_presale(ctx, &mut mission)?;
            Ok(mission.state)
        })
    }

    /// 按报价单当前状态重新推导主状态
    pub fn refresh_state(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<MissionState>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            self.lifecycle.sync_with_quotation(ctx, &mut mission)?;
            Ok(mission.state)
        })
    }

    // ==========================================
    // 业务编码
    // ==========================================

    /// 显式生成业务编码 (仅售前)
    pub fn generate_code(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<String>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            if !mission.state.is_presale() {
                return Err(ApiError::ClassificationLocked(format!(
                    "任务 {} 已离开售前阶段, 不能重新生成编码",
                    mission.reference
                )));
            }
            let previous = mission.code.clone();
            let code = self.naming.generate_code(ctx, &mut mission)?;
            ctx.missions().update(&mission)?;
            ctx.log_action(
                Some(mission.id),
                ActionType::UpdateCode,
                Some(json!({ "from": previous, "to": code })),
                format!("生成业务编码 {}", code),
            )?;
            self.sales.sync_quotation_line(ctx, &mission)?;
            Ok(code)
        })
    }

    // ==========================================
    // 报价单联动
    // ==========================================

    /// 关联已有报价行, 随后按报价单状态同步主状态
    pub fn link_quotation_line(
        &self,
        actor: &str,
        mission_id: i64,
        line_id: i64,
    ) -> ApiResult<WriteOutcome<Mission>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            self.sales.link(ctx, &mut mission, line_id)?;
            ctx.log_action(
                Some(mission.id),
                ActionType::UpdateMission,
                Some(json!({ "quotation_line_id": line_id })),
                "关联报价行",
            )?;
            self.lifecycle.sync_with_quotation(ctx, &mut mission)?;
            Ok(mission)
        })
    }

    /// 解除报价行关联, 随后同步主状态 (无报价单规则)
    pub fn unlink_quotation(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<Mission>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            let previous = mission.quotation_line_id;
            self.sales.unlink(ctx, &mut mission)?;
            ctx.log_action(
                Some(mission.id),
                ActionType::UpdateMission,
                Some(json!({ "quotation_line_id": previous })),
                "解除报价行关联",
            )?;
            self.lifecycle.sync_with_quotation(ctx, &mut mission)?;
            Ok(mission)
        })
    }

    /// 报价单状态变化 (销售协作方回调), 返回状态发生变化的任务
    pub fn set_quotation_state(
        &self,
        actor: &str,
        quotation_id: i64,
        state: QuotationState,
    ) -> ApiResult<WriteOutcome<Vec<Mission>>> {
        let flags = ContextFlags {
            skip_sales_sync: true,
            ..ContextFlags::default()
        };
        self.store.write(actor, flags, |ctx| {
            let quotation = ctx.quotations().get(quotation_id)?;
            ctx.quotations().update_state(quotation_id, state)?;
            info!(quotation = %quotation.name, from = %quotation.state, to = %state, "报价单状态变更");

            let mut changed = Vec::new();
            for line in ctx.quotations().list_linked_lines(quotation_id)? {
                let Some(mission_id) = line.mission_id else {
                    continue;
                };
                let mut mission = ctx.missions().get(mission_id)?;
                if self.lifecycle.sync_with_quotation(ctx, &mut mission)? {
                    changed.push(mission);
                }
            }
            Ok(changed)
        })
    }

    // ==========================================
    // 报价单录入 (销售协作方的最小接口)
    // ==========================================

    pub fn create_quotation(
        &self,
        actor: &str,
        partner_id: i64,
        name: &str,
    ) -> ApiResult<WriteOutcome<Quotation>> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("报价单名称不能为空".to_string()));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut quotation = Quotation {
                id: 0,
                name: name.trim().to_string(),
                partner_id,
                state: QuotationState::Draft,
            };
            quotation.id = ctx.quotations().insert(&quotation)?;
            ctx.log_action(
                None,
                ActionType::QuotationSync,
                Some(json!({ "quotation": quotation.name, "partner_id": partner_id })),
                "新建报价单",
            )?;
            Ok(quotation)
        })
    }

    pub fn add_quotation_line(
        &self,
        actor: &str,
        quotation_id: i64,
        product_name: &str,
        price_unit: f64,
    ) -> ApiResult<WriteOutcome<QuotationLine>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            ctx.quotations().get(quotation_id)?;
            let mut line = QuotationLine {
                id: 0,
                quotation_id,
                product_name: product_name.to_string(),
                description: product_name.to_string(),
                quantity: 0.0,
                price_unit,
                mission_id: None,
            };
            line.id = ctx.quotations().insert_line(&line)?;
            Ok(line)
        })
    }

    pub fn get_quotation_line(&self, line_id: i64) -> ApiResult<QuotationLine> {
        self.store.read(|ctx| Ok(ctx.quotations().get_line(line_id)?))
    }
}
