// ==========================================
// 轨道测量任务管理 - 范围行批量写入
// ==========================================
// 职责: 一致性行 / 站台行整体替换 (同一事务内先删后插), 目标点增删改
// 表格解析 (固定列映射的工作簿) 属于外部协作方, 通过 ScopeSheetReader 接入
// ==========================================

use crate::domain::scope::{ConsistencyLine, PlatformLine, ScopeSummary, TargetLine};
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 表格读取结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSheet {
    pub consistency: Vec<ConsistencyLine>,
    pub platforms: Vec<PlatformLine>,
}

// ==========================================
// ScopeSheetReader Trait
// ==========================================
// 实现者: 外部表格导入协作方
pub trait ScopeSheetReader: Send + Sync {
    fn read(&self, content: &[u8]) -> EngineResult<ScopeSheet>;
}

fn check_consistency(line: &ConsistencyLine) -> EngineResult<()> {
    if line.pk_start < 0.0 || line.pk_end < 0.0 {
        return Err(EngineError::ValidationFailed(format!(
            "一致性行公里标不能为负: {} → {}",
            line.pk_start, line.pk_end
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct ScopeWriter;

impl ScopeWriter {
    pub fn new() -> Self {
        Self
    }

    /// 整体替换一致性行与站台行
    pub fn replace_lines(&self, ctx: &ExecContext<'_>, mission_id: i64, sheet: &ScopeSheet) -> EngineResult<ScopeSummary> {
        for line in &sheet.consistency {
            check_consistency(line)?;
        }
        for platform in &sheet.platforms {
            if platform.station.trim().is_empty() {
                return Err(EngineError::ValidationFailed("站台行缺少车站名".to_string()));
            }
        }

        let repo = ctx.scope();
        repo.delete_consistency(mission_id)?;
        repo.delete_platforms(mission_id)?;
        for line in &sheet.consistency {
            repo.insert_consistency(mission_id, line)?;
        }
        for platform in &sheet.platforms {
            repo.insert_platform(mission_id, platform)?;
        }

        let summary = self.summary(ctx, mission_id)?;
        info!(
            mission_id,
            consistency = summary.consistency_count,
            platforms = summary.platform_count,
            "范围行已替换"
        );
        Ok(summary)
    }

    pub fn add_target(&self, ctx: &ExecContext<'_>, mission_id: i64, target: &TargetLine) -> EngineResult<i64> {
        if target.label.trim().is_empty() {
            return Err(EngineError::ValidationFailed("目标点名称不能为空".to_string()));
        }
        Ok(ctx.scope().insert_target(mission_id, target)?)
    }

    pub fn update_target(&self, ctx: &ExecContext<'_>, target: &TargetLine) -> EngineResult<()> {
        if target.label.trim().is_empty() {
            return Err(EngineError::ValidationFailed("目标点名称不能为空".to_string()));
        }
        Ok(ctx.scope().update_target(target)?)
    }

    pub fn remove_target(&self, ctx: &ExecContext<'_>, target_id: i64) -> EngineResult<()> {
        Ok(ctx.scope().delete_target(target_id)?)
    }

    /// 范围汇总 (条数 + 总长度)
    pub fn summary(&self, ctx: &ExecContext<'_>, mission_id: i64) -> EngineResult<ScopeSummary> {
        let repo = ctx.scope();
        let consistency = repo.list_consistency(mission_id)?;
        let platforms = repo.list_platforms(mission_id)?;
        let targets = repo.list_targets(mission_id)?;
        Ok(ScopeSummary {
            consistency_count: consistency.len(),
            consistency_km: consistency.iter().map(|c| c.length_km()).sum(),
            target_count: targets.len(),
            platform_count: platforms.len(),
            platform_m: platforms.iter().filter_map(|p| p.length_m).sum(),
        })
    }
}
