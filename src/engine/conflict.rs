// ==========================================
// 轨道测量任务管理 - 资源冲突检测引擎
// ==========================================
// 职责: 小车/班组日历冲突检测 + 分配校验 (硬失败/软失败) + 可用性标签
// 窗口: 半开区间 [start, end), 重叠判定 other.start < end && other.end > start
// 占用来源: 需求行已分配小车 + 任务 team_1 / team_2
// 占用状态: 除售前、已取消之外的全部状态
// 红线: Engine 不拼 SQL, 所有失败必须输出原因
// ==========================================

use crate::domain::catalog::Cart;
use crate::domain::mission::{ConflictingMission, DateWindow, Mission};
use crate::domain::team::FieldTeam;
use crate::domain::types::{CartCondition, MissionState, ProductionStep};
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};

// ==========================================
// 硬失败: 始终阻断
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HardFailure {
    MissingDates,
    InvalidDateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    NoRequirementLines,
    QuantityMismatch {
        line_id: i64,
        cart_type: String,
        required: i32,
        assigned: usize,
    },
    WrongCartType {
        cart_id: i64,
        cart_name: String,
        expected_type: String,
    },
}

impl fmt::Display for HardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardFailure::MissingDates => write!(f, "未设置开始/结束日期"),
            HardFailure::InvalidDateRange { start, end } => {
                write!(f, "结束日期 {} 早于开始日期 {}", end, start)
            }
            HardFailure::NoRequirementLines => write!(f, "没有任何小车需求行"),
            HardFailure::QuantityMismatch {
                cart_type,
                required,
                assigned,
                ..
            } => write!(
                f,
                "小车类型 {} 需要 {} 台, 实际分配 {} 台",
                cart_type, required, assigned
            ),
            HardFailure::WrongCartType {
                cart_name,
                expected_type,
                ..
            } => write!(f, "小车 {} 不属于类型 {}", cart_name, expected_type),
        }
    }
}

// ==========================================
// 软失败: 可经人工确认转入紧急子状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SoftFailure {
    CartNotOperable {
        cart_id: i64,
        cart_name: String,
        condition: CartCondition,
    },
    CartCalendarConflict {
        cart_id: i64,
        cart_name: String,
        conflicts: Vec<ConflictingMission>,
    },
    TeamCalendarConflict {
        team_id: i64,
        team_name: String,
        conflicts: Vec<ConflictingMission>,
    },
}

fn join_conflicts(conflicts: &[ConflictingMission]) -> String {
    conflicts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftFailure::CartNotOperable {
                cart_name,
                condition,
                ..
            } => write!(f, "小车 {} 当前状态为 {}", cart_name, condition),
            SoftFailure::CartCalendarConflict {
                cart_name,
                conflicts,
                ..
            } => write!(f, "小车 {} 已被占用: {}", cart_name, join_conflicts(conflicts)),
            SoftFailure::TeamCalendarConflict {
                team_name,
                conflicts,
                ..
            } => write!(f, "班组 {} 已被占用: {}", team_name, join_conflicts(conflicts)),
        }
    }
}

/// 分配校验报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub hard: Vec<HardFailure>,
    pub soft: Vec<SoftFailure>,
}

impl AssignmentReport {
    pub fn is_clean(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }

    pub fn has_hard(&self) -> bool {
        !self.hard.is_empty()
    }

    /// 硬失败转为阻断错误 (数量不符单独映射)
    pub fn hard_error(&self) -> Option<EngineError> {
        let first = self.hard.first()?;
        if let HardFailure::QuantityMismatch {
            cart_type,
            required,
            assigned,
            ..
        } = first
        {
            return Some(EngineError::QuantityMismatch {
                cart_type: cart_type.clone(),
                required: *required,
                assigned: *assigned,
            });
        }
        let reasons = self
            .hard
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Some(EngineError::ValidationFailed(reasons))
    }
}

/// 任务当前是否为"紧急放行"状态 (允许直接写入冲突资源)
pub fn is_urgency_override(state: &MissionState) -> bool {
    matches!(state, MissionState::Production(ProductionStep::Urgency))
}

/// 两个班组槽位不得相同
pub fn ensure_distinct_teams(team_1: Option<i64>, team_2: Option<i64>) -> EngineResult<()> {
    match (team_1, team_2) {
        (Some(a), Some(b)) if a == b => Err(EngineError::ValidationFailed(
            "班组1 与 班组2 不能是同一个班组".to_string(),
        )),
        _ => Ok(()),
    }
}

/// 日期齐全且顺序正确时返回窗口
pub fn checked_window(mission: &Mission) -> Result<DateWindow, HardFailure> {
    match (mission.date_start, mission.date_end) {
        (Some(start), Some(end)) if end < start => Err(HardFailure::InvalidDateRange { start, end }),
        (Some(start), Some(end)) => Ok(DateWindow::from_inclusive(start, end)),
        _ => Err(HardFailure::MissingDates),
    }
}

// ==========================================
// ConflictDetector - 资源冲突检测引擎
// ==========================================
#[derive(Debug, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    // ==========================================
    // 冲突查询
    // ==========================================

    /// 查询与窗口重叠、占用该小车的其他任务 (不含自身)
    pub fn find_cart_conflicts(
        &self,
        ctx: &ExecContext<'_>,
        cart_id: i64,
        window: &DateWindow,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<Vec<ConflictingMission>> {
        Ok(ctx
            .missions()
            .find_cart_occupancy(cart_id, window, exclude_mission_id)?)
    }

    /// 查询与窗口重叠、占用该班组的其他任务 (不含自身)
    pub fn find_team_conflicts(
        &self,
        ctx: &ExecContext<'_>,
        team_id: i64,
        window: &DateWindow,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<Vec<ConflictingMission>> {
        Ok(ctx
            .missions()
            .find_team_occupancy(team_id, window, exclude_mission_id)?)
    }

    // ==========================================
    // 分配校验
    // ==========================================

    /// 完整分配校验: 硬失败 (日期/需求行/数量/类型) + 软失败 (物理状态/日历冲突)
    #[instrument(skip(self, ctx, mission), fields(mission_id = mission.id))]
    pub fn check_assignment(
        &self,
        ctx: &ExecContext<'_>,
        mission: &Mission,
    ) -> EngineResult<AssignmentReport> {
        let mut report = AssignmentReport::default();

        let window = match checked_window(mission) {
            Ok(w) => Some(w),
            Err(h) => {
                report.hard.push(h);
                None
            }
        };

        let lines = ctx.requirements().list_by_mission(mission.id)?;
        if lines.is_empty() {
            report.hard.push(HardFailure::NoRequirementLines);
        }

        for line in &lines {
            let type_name = ctx
                .catalog()
                .find_cart_type(line.cart_type_id)?
                .map(|t| t.name)
                .unwrap_or_else(|| format!("#{}", line.cart_type_id));

            if !line.is_fulfilled() {
                report.hard.push(HardFailure::QuantityMismatch {
                    line_id: line.id,
                    cart_type: type_name.clone(),
                    required: line.quantity,
                    assigned: line.assigned_count(),
                });
            }

            for cart_id in &line.assigned_cart_ids {
                let cart = ctx.carts().get(*cart_id)?;
                if cart.cart_type_id != line.cart_type_id {
                    report.hard.push(HardFailure::WrongCartType {
                        cart_id: cart.id,
                        cart_name: cart.name.clone(),
                        expected_type: type_name.clone(),
                    });
                }
                if !cart.condition.is_operable() {
                    report.soft.push(SoftFailure::CartNotOperable {
                        cart_id: cart.id,
                        cart_name: cart.name.clone(),
                        condition: cart.condition,
                    });
                }
                if let Some(w) = &window {
                    let conflicts = self.find_cart_conflicts(ctx, cart.id, w, Some(mission.id))?;
                    if !conflicts.is_empty() {
                        report.soft.push(SoftFailure::CartCalendarConflict {
                            cart_id: cart.id,
                            cart_name: cart.name.clone(),
                            conflicts,
                        });
                    }
                }
            }
        }

        if let Some(w) = &window {
            for team_id in mission.teams() {
                let conflicts = self.find_team_conflicts(ctx, team_id, w, Some(mission.id))?;
                if !conflicts.is_empty() {
                    let team = ctx.teams().get(team_id)?;
                    report.soft.push(SoftFailure::TeamCalendarConflict {
                        team_id,
                        team_name: team.name,
                        conflicts,
                    });
                }
            }
        }

        debug!(
            hard = report.hard.len(),
            soft = report.soft.len(),
            "分配校验完成"
        );
        Ok(report)
    }

    // ==========================================
    // 直接写入时的数据完整性约束
    // ==========================================

    /// 写入已分配小车前校验: 日历冲突阻断 (紧急放行状态除外)
    ///
    /// 售前/已取消任务不占用资源, 不做校验
    pub fn guard_cart_links(
        &self,
        ctx: &ExecContext<'_>,
        mission: &Mission,
        cart_ids: &[i64],
    ) -> EngineResult<()> {
        if !mission.state.claims_resources() {
            return Ok(());
        }
        let Some(window) = mission.window() else {
            return Ok(());
        };

        for cart_id in cart_ids {
            let conflicts = self.find_cart_conflicts(ctx, *cart_id, &window, Some(mission.id))?;
            if conflicts.is_empty() {
                continue;
            }
            let cart = ctx.carts().get(*cart_id)?;
            if is_urgency_override(&mission.state) {
                warn!(
                    mission = %mission.reference,
                    cart = %cart.name,
                    "紧急放行: 写入存在日历冲突的小车"
                );
                continue;
            }
            return Err(EngineError::ResourceConflict {
                resource: cart.name,
                conflicts,
            });
        }
        Ok(())
    }

    /// 写入班组前校验: 两槽位不同 + 日历冲突阻断 (紧急放行状态除外)
    pub fn guard_team_links(
        &self,
        ctx: &ExecContext<'_>,
        mission: &Mission,
    ) -> EngineResult<()> {
        ensure_distinct_teams(mission.team_1_id, mission.team_2_id)?;

        if !mission.state.claims_resources() {
            return Ok(());
        }
        let Some(window) = mission.window() else {
            return Ok(());
        };

        for team_id in mission.teams() {
            let conflicts = self.find_team_conflicts(ctx, team_id, &window, Some(mission.id))?;
            if conflicts.is_empty() {
                continue;
            }
            let team = ctx.teams().get(team_id)?;
            if is_urgency_override(&mission.state) {
                warn!(mission = %mission.reference, team = %team.name, "紧急放行: 写入存在日历冲突的班组");
                continue;
            }
            return Err(EngineError::ResourceConflict {
                resource: team.name,
                conflicts,
            });
        }
        Ok(())
    }

    // ==========================================
    // 可用性展示
    // ==========================================

    /// 小车下拉标签: 物理状态优先, 其次日历占用
    pub fn cart_label(
        &self,
        ctx: &ExecContext<'_>,
        cart: &Cart,
        window: Option<&DateWindow>,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<String> {
        let booked = match window {
            Some(w) => !self
                .find_cart_conflicts(ctx, cart.id, w, exclude_mission_id)?
                .is_empty(),
            None => false,
        };
        Ok(format_cart_label(cart, booked))
    }

    /// 班组下拉标签: 空闲显示负责人, 占用显示占用任务编码
    pub fn team_label(
        &self,
        ctx: &ExecContext<'_>,
        team: &FieldTeam,
        window: Option<&DateWindow>,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<String> {
        let occupied_by = match window {
            Some(w) => self
                .find_team_conflicts(ctx, team.id, w, exclude_mission_id)?
                .first()
                .map(|c| c.label().to_string()),
            None => None,
        };
        let leader = ctx
            .teams()
            .leader_name(team.id)?
            .unwrap_or_default();
        Ok(format_team_label(&team.name, &leader, occupied_by.as_deref()))
    }

    /// 指定类型下物理可用且窗口内空闲的小车
    pub fn available_carts(
        &self,
        ctx: &ExecContext<'_>,
        cart_type_id: i64,
        window: &DateWindow,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<Vec<Cart>> {
        let mut result = Vec::new();
        for cart in ctx.carts().list_by_type(cart_type_id)? {
            if !cart.condition.is_operable() {
                continue;
            }
            if self
                .find_cart_conflicts(ctx, cart.id, window, exclude_mission_id)?
                .is_empty()
            {
                result.push(cart);
            }
        }
        Ok(result)
    }
}

pub fn format_cart_label(cart: &Cart, booked: bool) -> String {
    let (prefix, suffix) = match cart.condition {
        CartCondition::Maintenance => ("🔧", " (Maintenance)"),
        CartCondition::OutOfService => ("🔴", " (Hors service)"),
        CartCondition::Available if booked => ("⚠️", " (Déjà réservé)"),
        CartCondition::Available => ("🟢", ""),
    };
    format!("{} {}{}", prefix, cart.name, suffix)
}

pub fn format_team_label(team_name: &str, leader: &str, occupied_by: Option<&str>) -> String {
    match occupied_by {
        Some(code) => format!("⚠️ {} <Occupée : {}>", team_name, code),
        None => format!("🟢 {} (RCE : {})", team_name, leader),
    }
}
