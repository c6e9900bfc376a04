// ==========================================
// 轨道测量任务管理 - 导入 API
// ==========================================
// 职责: 测量文件归档 (解析 → 匹配任务 → 挂到周计划某天),
//       范围表格导入 (一致性行/站台行整体替换) 与目标点维护
// 说明: 文件与表格的解析器由调用方注入 (专有格式不在本 crate 实现)
// ==========================================

use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::api::store::Store;
use crate::config::ConfigManager;
use crate::domain::action_log::ActionType;
use crate::domain::mission::Mission;
use crate::domain::scope::{ConsistencyLine, PlatformLine, ScopeSummary, TargetLine};
use crate::engine::context::{ContextFlags, ExecContext};
use crate::engine::error::MissionCandidate;
use crate::engine::file_attach::{AttachReceipt, FileAttacher, MeasurementFileHeader, MeasurementFileParser};
use crate::engine::scope_import::{ScopeSheet, ScopeSheetReader, ScopeWriter};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 文件预分析结果 (不写库)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub header: MeasurementFileHeader,
    pub candidates: Vec<MissionCandidate>,
}

// ==========================================
// ImportApi - 导入 API
// ==========================================
pub struct ImportApi {
    store: Store,
    attacher: FileAttacher,
    scope: ScopeWriter,
    file_parser: Option<Arc<dyn MeasurementFileParser>>,
    sheet_reader: Option<Arc<dyn ScopeSheetReader>>,
}

impl ImportApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self::with_store(Store::new(conn, config))
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            attacher: FileAttacher::new(),
            scope: ScopeWriter::new(),
            file_parser: None,
            sheet_reader: None,
        }
    }

    /// 注入测量文件解析器
    pub fn with_file_parser(mut self, parser: Arc<dyn MeasurementFileParser>) -> Self {
        self.file_parser = Some(parser);
        self
    }

    /// 注入范围表格读取器
    pub fn with_sheet_reader(mut self, reader: Arc<dyn ScopeSheetReader>) -> Self {
        self.sheet_reader = Some(reader);
        self
    }

    fn parse_file(&self, file_name: &str, content: &[u8]) -> ApiResult<MeasurementFileHeader> {
        let parser = self
            .file_parser
            .as_ref()
            .ok_or_else(|| ApiError::InternalError("未配置测量文件解析器".to_string()))?;
        let mut header = parser.parse(file_name, content)?.normalized();
        header.file_name = file_name.to_string();
        header.content = content.to_vec();
        Ok(header)
    }

    // ==========================================
    // 测量文件归档
    // ==========================================

    /// 预分析: 解析文件头并列出匹配任务
    pub fn analyze_file(&self, file_name: &str, content: &[u8]) -> ApiResult<FileAnalysis> {
        let header = self.parse_file(file_name, content)?;
        self.store.read(|ctx| {
            let candidates = self
                .attacher
                .find_matches(ctx, &header)?
                .into_iter()
                .map(|m| MissionCandidate {
                    mission_id: m.id,
                    reference: m.reference,
                    code: m.code,
                })
                .collect();
            Ok(FileAnalysis {
                header: header.clone(),
                candidates,
            })
        })
    }

    /// 解析并归档; 多个匹配时返回 MultipleMatches, 由用户选择后调用 attach_to
    pub fn attach_file(
        &self,
        actor: &str,
        file_name: &str,
        content: &[u8],
    ) -> ApiResult<WriteOutcome<AttachReceipt>> {
        let header = self.parse_file(file_name, content)?;
        self.attach_header(actor, header)
    }

    /// 使用已解析的文件头归档
    pub fn attach_header(
        &self,
        actor: &str,
        header: MeasurementFileHeader,
    ) -> ApiResult<WriteOutcome<AttachReceipt>> {
        let header = header.normalized();
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = match self.attacher.match_file(ctx, &header) {
                Ok(mission) => mission,
                Err(e) => {
                    warn!(file = %header.file_name, error = %e, "测量文件未能唯一匹配");
                    return Err(e.into());
                }
            };
            self.attach_in(ctx, &mut mission, &header)
        })
    }

    /// 归档到用户选定的任务
    pub fn attach_to(
        &self,
        actor: &str,
        mission_id: i64,
        header: MeasurementFileHeader,
    ) -> ApiResult<WriteOutcome<AttachReceipt>> {
        let header = header.normalized();
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut mission = ctx.missions().get(mission_id)?;
            self.attach_in(ctx, &mut mission, &header)
        })
    }

    fn attach_in(
        &self,
        ctx: &mut ExecContext<'_>,
        mission: &mut Mission,
        header: &MeasurementFileHeader,
    ) -> ApiResult<AttachReceipt> {
        let receipt = self.attacher.attach_to(ctx, mission, header)?;
        ctx.log_action(
            Some(mission.id),
            ActionType::AttachFile,
            Some(json!({
                "file": header.file_name,
                "week": receipt.week_label,
                "day": receipt.day,
                "first_pk": header.first_pk,
                "last_pk": header.last_pk,
            })),
            format!("归档测量文件 {}", header.file_name),
        )?;
        Ok(receipt)
    }

    // ==========================================
    // 范围行
    // ==========================================

    /// 读取表格并整体替换范围行
    pub fn import_scope_sheet(
        &self,
        actor: &str,
        mission_id: i64,
        content: &[u8],
    ) -> ApiResult<WriteOutcome<ScopeSummary>> {
        let reader = self
            .sheet_reader
            .as_ref()
            .ok_or_else(|| ApiError::InternalError("未配置范围表格读取器".to_string()))?;
        let sheet = reader.read(content)?;
        self.replace_scope_lines(actor, mission_id, sheet)
    }

    /// 整体替换一致性行与站台行 (同一事务内先删后插)
    pub fn replace_scope_lines(
        &self,
        actor: &str,
        mission_id: i64,
        sheet: ScopeSheet,
    ) -> ApiResult<WriteOutcome<ScopeSummary>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mission = ctx.missions().get(mission_id)?;
            let summary = self.scope.replace_lines(ctx, mission_id, &sheet)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::ReplaceScope,
                Some(json!({
                    "consistency": summary.consistency_count,
                    "platforms": summary.platform_count,
                })),
                format!("替换范围行 {}", mission.reference),
            )?;
            info!(mission = %mission.reference, "范围表格已导入");
            Ok(summary)
        })
    }

    pub fn add_target(&self, actor: &str, mission_id: i64, target: TargetLine) -> ApiResult<WriteOutcome<TargetLine>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            ctx.missions().get(mission_id)?;
            let mut target = target;
            target.mission_id = mission_id;
            target.id = self.scope.add_target(ctx, mission_id, &target)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::ReplaceScope,
                Some(json!({ "target": target.label })),
                "新增目标点",
            )?;
            Ok(target)
        })
    }

    pub fn update_target(&self, actor: &str, target: TargetLine) -> ApiResult<WriteOutcome<TargetLine>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            self.scope.update_target(ctx, &target)?;
            ctx.log_action(
                Some(target.mission_id),
                ActionType::ReplaceScope,
                Some(json!({ "target_id": target.id, "label": target.label })),
                "修改目标点",
            )?;
            Ok(target)
        })
    }

    pub fn remove_target(&self, actor: &str, mission_id: i64, target_id: i64) -> ApiResult<WriteOutcome<()>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            self.scope.remove_target(ctx, target_id)?;
            ctx.log_action(
                Some(mission_id),
                ActionType::ReplaceScope,
                Some(json!({ "target_id": target_id })),
                "删除目标点",
            )?;
            Ok(())
        })
    }

    pub fn scope_summary(&self, mission_id: i64) -> ApiResult<ScopeSummary> {
        self.store.read(|ctx| Ok(self.scope.summary(ctx, mission_id)?))
    }

    pub fn list_consistency(&self, mission_id: i64) -> ApiResult<Vec<ConsistencyLine>> {
        self.store.read(|ctx| Ok(ctx.scope().list_consistency(mission_id)?))
    }

    pub fn list_platforms(&self, mission_id: i64) -> ApiResult<Vec<PlatformLine>> {
        self.store.read(|ctx| Ok(ctx.scope().list_platforms(mission_id)?))
    }

    pub fn list_targets(&self, mission_id: i64) -> ApiResult<Vec<TargetLine>> {
        self.store.read(|ctx| Ok(ctx.scope().list_targets(mission_id)?))
    }
}
