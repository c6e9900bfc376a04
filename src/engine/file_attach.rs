// ==========================================
// 轨道测量任务管理 - 测量文件归档
// ==========================================
// 职责: 由解析协作方给出的文件头定位唯一任务, 并把文件挂到对应周计划的某一天
// 匹配: 线路名 + 日期 ∈ 任务日期 + pk ∈ 任务里程 + 已分配小车序列号 + 股道名
//   0 条 → 描述性错误; 1 条 → 直接归档; 多条 → 返回候选由用户选择后 attach_to
// 红线: 文件解析 (.lx 专有格式) 不在本模块, 只通过 MeasurementFileParser 接入
// ==========================================

use crate::domain::mission::Mission;
use crate::domain::planning::{weekday_key, DayFile};
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult, MissionCandidate};
use crate::repository::FileMatchQuery;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

// ==========================================
// MeasurementFileHeader - 文件头 (解析结果)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFileHeader {
    pub line: String,        // 线路 (可省略 L 前缀)
    pub date: NaiveDate,     // 测量日期
    pub track: String,       // 股道 (可省略 V 前缀)
    pub cart_serial: String, // 小车序列号
    pub pk: f64,             // 文件头公里标
    pub first_pk: f64,       // 数据表首行公里标
    pub last_pk: f64,        // 数据表末行公里标
    pub file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl MeasurementFileHeader {
    /// 补齐前缀: 线路加 L, 股道加 V
    pub fn normalized(mut self) -> Self {
        self.line = with_prefix(&self.line, 'L');
        self.track = with_prefix(&self.track, 'V');
        self.cart_serial = self.cart_serial.trim().to_string();
        self
    }
}

fn with_prefix(raw: &str, prefix: char) -> String {
    let value = raw.trim();
    if value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{}{}", prefix, value)
    }
}

// ==========================================
// MeasurementFileParser Trait
// ==========================================
// 用途: 专有测量文件解析接口 (冒号分隔的文件头 + 制表符分隔的数据表)
// 实现者: 外部导入协作方
pub trait MeasurementFileParser: Send + Sync {
    /// 解析文件内容
    ///
    /// # 返回
    /// - Ok(MeasurementFileHeader): 文件头 + 首末公里标
    /// - Err(EngineError::ParseError): 文件头缺失/编码无法识别/数据表为空
    fn parse(&self, file_name: &str, content: &[u8]) -> EngineResult<MeasurementFileHeader>;
}

/// 归档结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachReceipt {
    pub mission_id: i64,
    pub reference: String,
    pub planning_id: i64,
    pub week_label: String,
    pub day: String,
    pub day_file_id: i64,
}

#[derive(Debug, Default)]
pub struct FileAttacher;

impl FileAttacher {
    pub fn new() -> Self {
        Self
    }

    /// 查找匹配任务
    pub fn find_matches(&self, ctx: &ExecContext<'_>, header: &MeasurementFileHeader) -> EngineResult<Vec<Mission>> {
        let query = FileMatchQuery {
            line_name: &header.line,
            date: header.date,
            pk: header.pk,
            cart_serial: &header.cart_serial,
            track: &header.track,
        };
        Ok(ctx.missions().find_file_matches(&query)?)
    }

    /// 唯一匹配则返回该任务, 否则返回描述性错误或候选列表
    pub fn match_file(&self, ctx: &ExecContext<'_>, header: &MeasurementFileHeader) -> EngineResult<Mission> {
        let mut matches = self.find_matches(ctx, header)?;
        match matches.len() {
            0 => Err(EngineError::NoMatchingMission(format!(
                "线路 {} | 日期 {} | 股道 {} | 小车 {} | PK {:.3}",
                header.line, header.date, header.track, header.cart_serial, header.pk
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(EngineError::MultipleMatches(
                matches
                    .into_iter()
                    .map(|m| MissionCandidate {
                        mission_id: m.id,
                        reference: m.reference,
                        code: m.code,
                    })
                    .collect(),
            )),
        }
    }

    /// 归档到指定任务: 找到包含日期的周计划行, 创建日文件, 写入实测进度
    pub fn attach_to(
        &self,
        ctx: &mut ExecContext<'_>,
        mission: &mut Mission,
        header: &MeasurementFileHeader,
    ) -> EngineResult<AttachReceipt> {
        let week = ctx
            .planning()
            .find_week_containing(mission.id, header.date)?
            .ok_or_else(|| {
                EngineError::PlanningWeekMissing(format!(
                    "任务 {} 在 {} 没有周计划",
                    mission.reference, header.date
                ))
            })?;

        let day = weekday_key(header.date.weekday());
        let file = DayFile {
            id: 0,
            planning_id: week.id,
            day: day.to_string(),
            file_name: header.file_name.clone(),
            content: header.content.clone(),
            first_pk: Some(header.first_pk),
            last_pk: Some(header.last_pk),
        };
        let day_file_id = ctx.planning().insert_day_file(&file)?;

        mission.progress_start = Some(header.first_pk);
        mission.progress_end = Some(header.last_pk);
        ctx.missions().update(mission)?;

        let week_label = week.week_label();
        info!(mission = %mission.reference, week = %week_label, day, "测量文件已归档");
        ctx.notify(
            "import.attached",
            &[("reference", &mission.reference), ("week", &week_label), ("day", day)],
        );

        Ok(AttachReceipt {
            mission_id: mission.id,
            reference: mission.reference.clone(),
            planning_id: week.id,
            week_label,
            day: day.to_string(),
            day_file_id,
        })
    }
}
