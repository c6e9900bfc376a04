// ==========================================
// 任务记录写入: 创建 / 修改 / 删除 / 读取
// ==========================================
// 写入管道: 锁定检查 → 日期对齐 → 班组/公里标校验 → 编码同步
//          → 资源约束 → 持久化 → 周计划同步 → 报价行回写 → 审计
// ==========================================

use super::core::MissionApi;
use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::domain::action_log::ActionType;
use crate::domain::mission::Mission;
use crate::domain::types::MissionState;
use crate::engine::conflict::ensure_distinct_teams;
use crate::engine::context::{ContextFlags, ExecContext};
use crate::engine::weekly_planning::align_dates;
use serde_json::json;
use tracing::{info, instrument};

/// 任务序列号键
const REFERENCE_SEQUENCE: &str = "mission.reference";

/// 离开售前后公里标必须有效: 非负且起止不同
fn check_pk(mission: &Mission) -> ApiResult<()> {
    if mission.state.is_presale() {
        return Ok(());
    }
    if mission.pk_initial < 0.0 || mission.pk_final < 0.0 {
        return Err(ApiError::ValidationError(format!(
            "任务 {} 的公里标不能为负 ({} → {})",
            mission.reference, mission.pk_initial, mission.pk_final
        )));
    }
    if mission.pk_initial == mission.pk_final {
        return Err(ApiError::ValidationError(format!(
            "任务 {} 的起止公里标相同 ({})",
            mission.reference, mission.pk_initial
        )));
    }
    Ok(())
}

impl MissionApi {
    // ==========================================
    // 写入接口
    // ==========================================

    /// 创建任务 (售前状态)
    ///
    /// # 参数
    /// - actor: 操作人
    /// - draft: 任务字段; id / reference / state 由系统分配,
    ///   quotation_line_id 有值时创建后立即关联该报价行
    ///
    /// # 返回
    /// - Ok(WriteOutcome<Mission>): 已保存的任务 + 提示 (编码顺延、日期对齐等)
    pub fn create_mission(&self, actor: &str, draft: Mission) -> ApiResult<WriteOutcome<Mission>> {
        if draft.partner_id <= 0 {
            return Err(ApiError::InvalidInput("任务必须指定客户".to_string()));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut draft = draft;
            let line_id = draft.quotation_line_id.take();
            draft.state = MissionState::Presale;
            draft.progress_start = None;
            draft.progress_end = None;

            let mut mission = self.save_mission(ctx, None, draft)?;
            if let Some(line_id) = line_id {
                self.sales.link(ctx, &mut mission, line_id)?;
                self.lifecycle.sync_with_quotation(ctx, &mut mission)?;
            }
            Ok(mission)
        })
    }

    /// 修改任务字段
    ///
    /// 状态、reference、报价关联与实测进度不经此接口修改 (以存储值为准)
    pub fn update_mission(&self, actor: &str, mission: Mission) -> ApiResult<WriteOutcome<Mission>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let stored = ctx.missions().get(mission.id)?;
            self.save_mission(ctx, Some(&stored), mission)
        })
    }

    /// 删除任务 (仅售前/已取消; 子记录级联删除, 报价行回指置空)
    pub fn delete_mission(&self, actor: &str, mission_id: i64) -> ApiResult<WriteOutcome<()>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mission = ctx.missions().get(mission_id)?;
            if !matches!(mission.state, MissionState::Presale | MissionState::Cancelled) {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "任务 {} 处于 {} 状态, 只能删除售前或已取消的任务",
                    mission.reference, mission.state
                )));
            }
            ctx.missions().delete(mission_id)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::DeleteMission,
                Some(json!({ "reference": mission.reference, "code": mission.code })),
                format!("删除任务 {}", mission.label()),
            )?;
            info!(reference = %mission.reference, "任务已删除");
            Ok(())
        })
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_mission(&self, mission_id: i64) -> ApiResult<Mission> {
        self.store.read(|ctx| Ok(ctx.missions().get(mission_id)?))
    }

    pub fn find_by_reference(&self, reference: &str) -> ApiResult<Mission> {
        self.store.read(|ctx| {
            ctx.missions()
                .find_by_reference(reference)?
                .ok_or_else(|| ApiError::NotFound(format!("任务 {} 不存在", reference)))
        })
    }

    /// 任务列表 (可按客户过滤)
    pub fn list_missions(&self, partner_id: Option<i64>) -> ApiResult<Vec<Mission>> {
        self.store.read(|ctx| {
            let missions = match partner_id {
                Some(partner_id) => ctx.missions().list_by_partner(partner_id)?,
                None => ctx.missions().list_all()?,
            };
            Ok(missions)
        })
    }

    // ==========================================
    // 写入管道
    // ==========================================

    /// 保存任务 (新建时 stored 为 None)
    #[instrument(skip_all, fields(mission_id = incoming.id))]
    pub(super) fn save_mission(
        &self,
        ctx: &mut ExecContext<'_>,
        stored: Option<&Mission>,
        incoming: Mission,
    ) -> ApiResult<Mission> {
        let mut mission = incoming;
        if let Some(stored) = stored {
            mission.id = stored.id;
            mission.reference = stored.reference.clone();
            mission.state = stored.state;
            mission.last_synced_code = stored.last_synced_code.clone();
            mission.quotation_line_id = stored.quotation_line_id;
            mission.partner_id = stored.partner_id;
            mission.progress_start = stored.progress_start;
            mission.progress_end = stored.progress_end;
            self.naming.check_classification_lock(stored, &mission)?;
        }

        if mission.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("任务名称不能为空".to_string()));
        }

        let dates_changed = stored
            .map(|s| s.date_start != mission.date_start || s.date_end != mission.date_end)
            .unwrap_or(true);
        if dates_changed {
            self.align_mission_dates(ctx, &mut mission)?;
        }

        ensure_distinct_teams(mission.team_1_id, mission.team_2_id)?;
        check_pk(&mission)?;

        if mission.state.is_presale() {
            self.naming.sync_code(ctx, &mut mission)?;
        }

        // 班组: 新建、换班组或改日期时校验日历占用
        let teams_changed = stored
            .map(|s| s.team_1_id != mission.team_1_id || s.team_2_id != mission.team_2_id)
            .unwrap_or(true);
        if teams_changed || dates_changed {
            self.detector.guard_team_links(ctx, &mission)?;
        }
        // 已分配小车: 窗口移动后重新校验
        if dates_changed && stored.is_some() {
            let cart_ids: Vec<i64> = ctx
                .requirements()
                .list_by_mission(mission.id)?
                .into_iter()
                .flat_map(|line| line.assigned_cart_ids)
                .collect();
            self.detector.guard_cart_links(ctx, &mission, &cart_ids)?;
        }

        match stored {
            None => {
                let seq = ctx.sequences().next_value(REFERENCE_SEQUENCE)?;
                mission.reference = format!("{}{:05}", ctx.config.reference_prefix, seq);
                mission.id = ctx.missions().insert(&mission)?;
                ctx.log_action(
                    Some(mission.id),
                    ActionType::CreateMission,
                    Some(json!({ "reference": mission.reference, "code": mission.code })),
                    format!("创建任务 {}", mission.reference),
                )?;
                info!(reference = %mission.reference, code = ?mission.code, "任务已创建");
            }
            Some(stored) => {
                ctx.missions().update(&mission)?;
                ctx.log_action(
                    Some(mission.id),
                    ActionType::UpdateMission,
                    None,
                    format!("修改任务 {}", mission.reference),
                )?;
                if stored.code != mission.code {
                    ctx.log_action(
                        Some(mission.id),
                        ActionType::UpdateCode,
                        Some(json!({ "from": stored.code, "to": mission.code })),
                        format!("业务编码 {} → {}", stored.label(), mission.label()),
                    )?;
                }
                if dates_changed {
                    ctx.log_action(
                        Some(mission.id),
                        ActionType::UpdateDates,
                        Some(json!({
                            "from": [stored.date_start, stored.date_end],
                            "to": [mission.date_start, mission.date_end],
                        })),
                        "日期变更",
                    )?;
                }
            }
        }

        if dates_changed {
            self.planner.reconcile(ctx, &mission)?;
        }
        self.sales.sync_quotation_line(ctx, &mission)?;
        Ok(mission)
    }

    /// 两端日期齐全时按配置的周对齐策略处理
    fn align_mission_dates(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> ApiResult<()> {
        let (Some(start), Some(end)) = (mission.date_start, mission.date_end) else {
            return Ok(());
        };
        let (start, end, snapped) = align_dates(start, end, ctx.config.week_alignment)?;
        if snapped {
            let (s, e) = (start.to_string(), end.to_string());
            ctx.notify("planning.dates_snapped", &[("start", &s), ("end", &e)]);
        }
        mission.date_start = Some(start);
        mission.date_end = Some(end);
        Ok(())
    }
}
