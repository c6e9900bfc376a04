// ==========================================
// 轨道测量任务管理 - 客户门户 API
// ==========================================
// 职责: 客户自助创建/查看测量任务
// 红线: 客户只能看到自己的任务 (他人任务按不存在处理)
// ==========================================

use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::api::mission_api::MissionApi;
use crate::domain::mission::Mission;
use serde::{Deserialize, Serialize};
use tracing::info;

/// 门户提交的任务申请
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRequest {
    pub name: String,
    pub line_id: Option<i64>,
    pub pk_initial: f64,
    pub pk_final: f64,
    pub notes: Option<String>,
}

pub struct PortalApi {
    missions: MissionApi,
}

impl PortalApi {
    pub fn new(missions: MissionApi) -> Self {
        Self { missions }
    }

    /// 客户创建任务 (线路必填, 任务进入售前)
    pub fn portal_create(
        &self,
        actor: &str,
        partner_id: i64,
        request: PortalRequest,
    ) -> ApiResult<WriteOutcome<Mission>> {
        let line_id = request
            .line_id
            .ok_or_else(|| ApiError::InvalidInput("请选择线路".to_string()))?;

        let mut draft = Mission::new(String::new(), partner_id);
        if !request.name.trim().is_empty() {
            draft.name = request.name.trim().to_string();
        }
        draft.line_id = Some(line_id);
        draft.pk_initial = request.pk_initial;
        draft.pk_final = request.pk_final;
        draft.notes = request.notes;

        let outcome = self.missions.create_mission(actor, draft)?;
        info!(partner_id, reference = %outcome.value.reference, "门户创建任务");
        Ok(outcome)
    }

    pub fn portal_list(&self, partner_id: i64) -> ApiResult<Vec<Mission>> {
        self.missions.list_missions(Some(partner_id))
    }

    /// 查看单个任务 (不属于该客户时返回 NotFound)
    pub fn portal_get(&self, partner_id: i64, mission_id: i64) -> ApiResult<Mission> {
        let mission = self.missions.get_mission(mission_id)?;
        if mission.partner_id != partner_id {
            return Err(ApiError::NotFound(format!("任务(id={})不存在", mission_id)));
        }
        Ok(mission)
    }
}
