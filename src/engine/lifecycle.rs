// ==========================================
// 轨道测量任务管理 - 任务生命周期状态机
// ==========================================
// 主状态: presale → production → measure → study → invoicing → done
// 报价单驱动: 报价单状态变化时被动同步主状态 (derive_from_quotation)
// 人工推进: advance 单步推进子状态; 物资检查之后只能经 validate_assignment
// 紧急放行: 软失败经人工确认后转入 Production(Urgency), 并记录审计日志
// 红线: 每次状态变化都写 ActionLog; done 为终态, 不可重开
// ==========================================

use crate::domain::action_log::ActionType;
use crate::domain::mission::Mission;
use crate::domain::types::{MeasureStep, MissionState, ProductionStep, QuotationState, StudyStep};
use crate::engine::conflict::{checked_window, ConflictDetector, SoftFailure};
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

// ==========================================
// AssignmentOutcome - 分配校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignmentOutcome {
    /// 校验通过, 携带最终状态 (CartsAssigned 或自动进入 Measure(Waiting))
    Assigned(MissionState),
    /// 软失败已被确认, 任务转入紧急子状态
    Urgency(Vec<SoftFailure>),
    /// 存在软失败, 需要人工确认 (状态未改变)
    ConfirmationRequired(Vec<SoftFailure>),
}

// ==========================================
// 纯函数
// ==========================================

/// 由报价单状态推导任务主状态
///
/// - 已完成 (Done) 为终态, 任何报价单状态都不改变
/// - 报价单已取消 → Cancelled
/// - 草稿/已发送 → Presale (强制回退 production/cancelled)
/// - 已确认/已锁定 → 当前为 Presale/Cancelled 时进入 Production(MissionReceived), 否则保持
/// - 未关联报价单 → 仍处于 Presale/Cancelled/Production 时回到 Presale, 更靠后的状态保持
pub fn derive_from_quotation(current: MissionState, quotation: Option<QuotationState>) -> MissionState {
    if current == MissionState::Done {
        return current;
    }
    match quotation {
        Some(QuotationState::Cancelled) => MissionState::Cancelled,
        Some(QuotationState::Draft) | Some(QuotationState::Sent) => MissionState::Presale,
        Some(QuotationState::Confirmed) | Some(QuotationState::Locked) => match current {
            MissionState::Presale | MissionState::Cancelled => {
                MissionState::Production(ProductionStep::MissionReceived)
            }
            other => other,
        },
        None => match current {
            MissionState::Presale | MissionState::Cancelled | MissionState::Production(_) => {
                MissionState::Presale
            }
            other => other,
        },
    }
}

/// 无业务门槛的下一状态 (测量/研究/开票阶段)
pub fn next_plain_state(current: MissionState) -> Option<MissionState> {
    match current {
        MissionState::Measure(MeasureStep::Done) => Some(MissionState::Study(StudyStep::Reception)),
        MissionState::Measure(step) => step.next().map(MissionState::Measure),
        MissionState::Study(step) => Some(
            step.next()
                .map(MissionState::Study)
                .unwrap_or(MissionState::Invoicing),
        ),
        MissionState::Invoicing => Some(MissionState::Done),
        _ => None,
    }
}

fn invalid_transition(from: MissionState, to: &str) -> EngineError {
    EngineError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

// ==========================================
// LifecycleEngine - 生命周期引擎
// ==========================================
#[derive(Debug, Default)]
pub struct LifecycleEngine {
    detector: ConflictDetector,
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self {
            detector: ConflictDetector::new(),
        }
    }

    /// 持久化状态变化 + 审计 + 提示
    fn transition(
        &self,
        ctx: &mut ExecContext<'_>,
        mission: &mut Mission,
        to: MissionState,
        action: ActionType,
    ) -> EngineResult<()> {
        let from = mission.state;
        if from == to {
            return Ok(());
        }
        ctx.missions().update_state(mission.id, to)?;
        mission.state = to;

        ctx.log_action(
            Some(mission.id),
            action,
            Some(json!({ "from": from.to_string(), "to": to.to_string() })),
            format!("{} → {}", from, to),
        )?;
        info!(mission = %mission.reference, from = %from, to = %to, "任务状态变更");

        let (from_s, to_s) = (from.to_string(), to.to_string());
        ctx.notify(
            "lifecycle.state_changed",
            &[("reference", &mission.reference), ("from", &from_s), ("to", &to_s)],
        );
        Ok(())
    }

    /// 关联报价行所属报价单的状态
    pub fn quotation_state(&self, ctx: &ExecContext<'_>, mission: &Mission) -> EngineResult<Option<QuotationState>> {
        match mission.quotation_line_id {
            Some(line_id) => Ok(ctx.quotations().state_of_line(line_id)?),
            None => Ok(None),
        }
    }

    /// 按报价单状态同步主状态, 返回是否发生变化
    #[instrument(skip(self, ctx, mission), fields(mission = %mission.reference))]
    pub fn sync_with_quotation(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<bool> {
        if ctx.flags.skip_quotation_sync {
            return Ok(false);
        }
        let quotation = self.quotation_state(ctx, mission)?;
        let target = derive_from_quotation(mission.state, quotation);
        if target == mission.state {
            return Ok(false);
        }
        self.transition(ctx, mission, target, ActionType::QuotationSync)?;
        Ok(true)
    }

    /// 物资检查门槛: 日期齐全且有序, 至少一条需求行
    fn check_material_gate(&self, ctx: &ExecContext<'_>, mission: &Mission) -> EngineResult<()> {
        checked_window(mission).map_err(|h| EngineError::ValidationFailed(h.to_string()))?;
        if ctx.requirements().list_by_mission(mission.id)?.is_empty() {
            return Err(EngineError::ValidationFailed(
                "至少需要一条小车需求行才能进入物资检查".to_string(),
            ));
        }
        Ok(())
    }

    /// 仅重跑硬校验 (离开分配阶段前的数量门槛)
    fn check_hard_only(&self, ctx: &ExecContext<'_>, mission: &Mission) -> EngineResult<()> {
        let report = self.detector.check_assignment(ctx, mission)?;
        match report.hard_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 单步推进
    #[instrument(skip(self, ctx, mission), fields(mission = %mission.reference, state = %mission.state))]
    pub fn advance(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<MissionState> {
        let current = mission.state;
        let target = match current {
            MissionState::Production(ProductionStep::MissionReceived) => {
                self.check_material_gate(ctx, mission)?;
                MissionState::Production(ProductionStep::MaterialCheck)
            }
            MissionState::Production(ProductionStep::MaterialCheck) => {
                return Err(EngineError::ValidationFailed(
                    "物资检查之后需通过小车分配校验才能继续".to_string(),
                ));
            }
            MissionState::Production(ProductionStep::Urgency) => {
                self.check_hard_only(ctx, mission)?;
                MissionState::Production(ProductionStep::CartsAssigned)
            }
            MissionState::Production(ProductionStep::CartsAssigned) => {
                self.check_hard_only(ctx, mission)?;
                MissionState::Measure(MeasureStep::Waiting)
            }
            MissionState::Presale => return Err(invalid_transition(current, "PRODUCTION")),
            MissionState::Done | MissionState::Cancelled => return Err(invalid_transition(current, "-")),
            other => next_plain_state(other).ok_or_else(|| invalid_transition(other, "-"))?,
        };
        self.transition(ctx, mission, target, ActionType::StateChange)?;
        Ok(target)
    }

    /// 小车分配校验 (物资检查 / 紧急子状态下调用)
    ///
    /// - 硬失败: 返回阻断错误
    /// - 软失败且未确认: 返回 ConfirmationRequired, 状态不变
    /// - 软失败且已确认: 转入 Urgency, 记录 UrgencyOverride
    /// - 无失败: 转入 CartsAssigned, 配置允许时直接进入 Measure(Waiting)
    #[instrument(skip(self, ctx, mission), fields(mission = %mission.reference))]
    pub fn validate_assignment(
        &self,
        ctx: &mut ExecContext<'_>,
        mission: &mut Mission,
        confirm_urgency: bool,
    ) -> EngineResult<AssignmentOutcome> {
        match mission.state {
            MissionState::Production(ProductionStep::MaterialCheck)
            | MissionState::Production(ProductionStep::Urgency) => {}
            other => return Err(invalid_transition(other, "PRODUCTION/CARTS_ASSIGNED")),
        }

        let report = self.detector.check_assignment(ctx, mission)?;
        if let Some(err) = report.hard_error() {
            return Err(err);
        }

        if !report.soft.is_empty() {
            if !confirm_urgency {
                return Ok(AssignmentOutcome::ConfirmationRequired(report.soft));
            }
            let reasons: Vec<String> = report.soft.iter().map(|s| s.to_string()).collect();
            warn!(mission = %mission.reference, reasons = ?reasons, "软失败已被人工确认, 转入紧急状态");
            ctx.log_action(
                Some(mission.id),
                ActionType::UrgencyOverride,
                Some(json!({ "soft_failures": reasons })),
                "人工确认紧急放行",
            )?;
            self.transition(
                ctx,
                mission,
                MissionState::Production(ProductionStep::Urgency),
                ActionType::StateChange,
            )?;
            ctx.notify("lifecycle.urgency_confirmed", &[("reference", &mission.reference)]);
            return Ok(AssignmentOutcome::Urgency(report.soft));
        }

        self.transition(
            ctx,
            mission,
            MissionState::Production(ProductionStep::CartsAssigned),
            ActionType::StateChange,
        )?;
        if ctx.config.auto_start_measure {
            self.transition(
                ctx,
                mission,
                MissionState::Measure(MeasureStep::Waiting),
                ActionType::StateChange,
            )?;
        }
        Ok(AssignmentOutcome::Assigned(mission.state))
    }

    /// 人工取消 (任意非终态)
    pub fn cancel(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        if mission.state.is_terminal() {
            return Err(invalid_transition(mission.state, "CANCELLED"));
        }
        self.transition(ctx, mission, MissionState::Cancelled, ActionType::StateChange)
    }

    /// 回到售前: 仅限 Cancelled / Production, 且报价单缺失或仍为草稿/已发送
    pub fn reset_to_presale(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        match mission.state {
            MissionState::Cancelled | MissionState::Production(_) => {}
            other => return Err(invalid_transition(other, "PRESALE")),
        }
        match self.quotation_state(ctx, mission)? {
            None | Some(QuotationState::Draft) | Some(QuotationState::Sent) => {}
            Some(state) => {
                return Err(EngineError::ValidationFailed(format!(
                    "报价单状态为 {}, 不能回到售前",
                    state
                )))
            }
        }
        self.transition(ctx, mission, MissionState::Presale, ActionType::StateChange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVED: MissionState = MissionState::Production(ProductionStep::MissionReceived);

    #[test]
    fn test_confirmed_quotation_starts_production_from_presale_or_cancelled() {
        assert_eq!(
            derive_from_quotation(MissionState::Presale, Some(QuotationState::Confirmed)),
            RECEIVED
        );
        assert_eq!(
            derive_from_quotation(MissionState::Cancelled, Some(QuotationState::Locked)),
            RECEIVED
        );
    }

    #[test]
    fn test_confirmed_quotation_keeps_advanced_state() {
        let measuring = MissionState::Measure(MeasureStep::Geometry);
        assert_eq!(derive_from_quotation(measuring, Some(QuotationState::Confirmed)), measuring);
        let urgency = MissionState::Production(ProductionStep::Urgency);
        assert_eq!(derive_from_quotation(urgency, Some(QuotationState::Locked)), urgency);
    }

    #[test]
    fn test_draft_or_sent_forces_presale() {
        let prod = MissionState::Production(ProductionStep::CartsAssigned);
        assert_eq!(derive_from_quotation(prod, Some(QuotationState::Sent)), MissionState::Presale);
        assert_eq!(
            derive_from_quotation(MissionState::Cancelled, Some(QuotationState::Draft)),
            MissionState::Presale
        );
    }

    #[test]
    fn test_done_is_never_rederived() {
        for quotation in [
            None,
            Some(QuotationState::Draft),
            Some(QuotationState::Sent),
            Some(QuotationState::Confirmed),
            Some(QuotationState::Locked),
            Some(QuotationState::Cancelled),
        ] {
            assert_eq!(derive_from_quotation(MissionState::Done, quotation), MissionState::Done);
        }
    }

    #[test]
    fn test_cancelled_quotation_cancels_mission() {
        assert_eq!(
            derive_from_quotation(MissionState::Invoicing, Some(QuotationState::Cancelled)),
            MissionState::Cancelled
        );
    }

    #[test]
    fn test_no_quotation_only_rewinds_early_states() {
        assert_eq!(derive_from_quotation(RECEIVED, None), MissionState::Presale);
        let study = MissionState::Study(StudyStep::Analysis);
        assert_eq!(derive_from_quotation(study, None), study);
    }

    #[test]
    fn test_plain_step_order() {
        let mut state = MissionState::Measure(MeasureStep::Waiting);
        let mut visited = vec![state];
        while let Some(next) = next_plain_state(state) {
            visited.push(next);
            state = next;
        }
        assert_eq!(visited.len(), 6 + 3 + 2);
        assert_eq!(visited[5], MissionState::Measure(MeasureStep::Done));
        assert_eq!(visited[6], MissionState::Study(StudyStep::Reception));
        assert_eq!(visited[9], MissionState::Invoicing);
        assert_eq!(state, MissionState::Done);
        assert_eq!(next_plain_state(MissionState::Presale), None);
    }
}
