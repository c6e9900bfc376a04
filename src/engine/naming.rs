// ==========================================
// 轨道测量任务管理 - 业务编码引擎
// ==========================================
// 编码格式: <期间><线路简称><业务类型>[<性质>]<3位序号>   例: C650P001 / C650INSR002
// 分支选择: 比较 code 与影子字段 last_synced_code
//   A. 手工编辑 (code ≠ last_synced 且非空): 反解析编码填充分类字段, 撞码时自动顺延序号
//   B. 字段驱动 (code 未被手工改动): 按分类字段重建前缀, 前缀不符时分配新序号
// 锁定: 任务离开售前后, 编码及其分类字段不可再修改
// ==========================================

use crate::domain::catalog::{AccountingPeriod, AffairType, RailLine};
use crate::domain::mission::Mission;
use crate::domain::types::Nature;
use crate::engine::context::ExecContext;
use crate::engine::error::{EngineError, EngineResult};
use tracing::{debug, info};

/// 序号位数
pub const SEQUENCE_DIGITS: usize = 3;

/// 编码反解析结果 (未识别的部分为 None)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCode {
    pub code: String,
    pub period_id: Option<i64>,
    pub line_id: Option<i64>,
    pub affair_type_id: Option<i64>,
    pub nature: Option<Nature>,
}

impl ParsedCode {
    /// 去掉序号后的前缀 (按字符切分)
    pub fn prefix(&self) -> &str {
        let cut = self
            .code
            .char_indices()
            .rev()
            .nth(SEQUENCE_DIGITS - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.code[..cut]
    }
}

// ==========================================
// 纯函数
// ==========================================

/// 反解析编码
///
/// - 首字符为期间编码
/// - 中段按线路简称前缀匹配, 较长简称优先
/// - 结尾 R/E 只有在"去掉后能识别业务类型、不去掉则不能"时才视为性质
pub fn parse_code(
    raw: &str,
    periods: &[AccountingPeriod],
    lines: &[RailLine],
    types: &[AffairType],
) -> ParsedCode {
    let code = raw.trim().to_uppercase();
    let mut parsed = ParsedCode {
        code: code.clone(),
        ..Default::default()
    };

    if !code.is_ascii() || code.len() < 5 {
        return parsed;
    }

    let period_code = &code[0..1];
    parsed.period_id = periods
        .iter()
        .filter(|p| p.code.eq_ignore_ascii_case(period_code))
        .max_by_key(|p| p.date_start)
        .map(|p| p.id);

    let middle = &code[1..code.len() - SEQUENCE_DIGITS];

    let mut by_len: Vec<&RailLine> = lines.iter().filter(|l| !l.nickname.is_empty()).collect();
    by_len.sort_by(|a, b| b.nickname.len().cmp(&a.nickname.len()));

    let find_type = |c: &str| {
        types
            .iter()
            .find(|t| t.code.eq_ignore_ascii_case(c))
            .map(|t| t.id)
    };

    for line in by_len {
        let nick = line.nickname.to_uppercase();
        let Some(rest) = middle.strip_prefix(nick.as_str()) else {
            continue;
        };
        parsed.line_id = Some(line.id);

        let trailing = rest.chars().last().and_then(Nature::from_letter);
        match trailing {
            Some(nature) => {
                let stripped = &rest[..rest.len() - 1];
                match (find_type(rest), find_type(stripped)) {
                    (None, Some(type_id)) => {
                        parsed.affair_type_id = Some(type_id);
                        parsed.nature = Some(nature);
                    }
                    (full, _) => parsed.affair_type_id = full,
                }
            }
            None => parsed.affair_type_id = find_type(rest),
        }
        break;
    }

    parsed
}

/// 由分类字段构建期望前缀; 字段不全或缺少必需的性质时返回 None
pub fn expected_prefix(
    period: Option<&AccountingPeriod>,
    line: Option<&RailLine>,
    affair_type: Option<&AffairType>,
    nature: Option<Nature>,
) -> Option<String> {
    let (period, line, affair_type) = (period?, line?, affair_type?);
    let nature_part = if affair_type.requires_nature {
        nature?.to_string()
    } else {
        String::new()
    };
    Some(
        format!("{}{}{}{}", period.code, line.nickname, affair_type.code, nature_part).to_uppercase(),
    )
}

/// 前缀 + 序号 (至少 3 位, 超过 999 时自然变宽)
pub fn format_code(prefix: &str, sequence: u32) -> String {
    format!("{}{:0width$}", prefix, sequence, width = SEQUENCE_DIGITS)
}

// ==========================================
// NamingEngine - 业务编码引擎
// ==========================================
#[derive(Debug, Default)]
pub struct NamingEngine;

impl NamingEngine {
    pub fn new() -> Self {
        Self
    }

    /// 前缀下的下一个可用编码 (排除自身; 分配结果再次查重直到未被占用)
    pub fn next_free_code(
        &self,
        ctx: &ExecContext<'_>,
        prefix: &str,
        exclude_mission_id: Option<i64>,
    ) -> EngineResult<String> {
        let max = ctx.missions().max_sequence_with_prefix(prefix, exclude_mission_id)?;
        let mut sequence = max.map_or(1, |n| n.saturating_add(1));
        let mut code = format_code(prefix, sequence);
        while ctx.missions().code_exists(&code, exclude_mission_id)? {
            sequence = sequence.checked_add(1).ok_or_else(|| {
                EngineError::CodeGeneration(format!("前缀 {} 的序号已用尽", prefix))
            })?;
            code = format_code(prefix, sequence);
        }
        debug!(prefix, max = ?max, next = %code, "分配编码序号");
        Ok(code)
    }

    /// 当前分类字段对应的期望前缀
    pub fn prefix_for(&self, ctx: &ExecContext<'_>, mission: &Mission) -> EngineResult<Option<String>> {
        let catalog = ctx.catalog();
        let period = match mission.period_id {
            Some(id) => catalog.find_period(id)?,
            None => None,
        };
        let line = match mission.line_id {
            Some(id) => catalog.find_line(id)?,
            None => None,
        };
        let affair_type = match mission.affair_type_id {
            Some(id) => catalog.find_affair_type(id)?,
            None => None,
        };
        Ok(expected_prefix(period.as_ref(), line.as_ref(), affair_type.as_ref(), mission.nature))
    }

    /// 业务类型不需要性质时清除 R/E
    fn clear_nature_if_not_required(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        if mission.nature.is_none() {
            return Ok(());
        }
        let affair_type = match mission.affair_type_id {
            Some(id) => ctx.catalog().find_affair_type(id)?,
            None => None,
        };
        let requires = affair_type.as_ref().map(|t| t.requires_nature).unwrap_or(false);
        if !requires {
            mission.nature = None;
            let name = affair_type.map(|t| t.code).unwrap_or_else(|| "-".to_string());
            ctx.notify("naming.nature_cleared", &[("affair_type", &name)]);
        }
        Ok(())
    }

    /// 编码同步 (写入售前任务时调用)
    pub fn sync_code(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        self.clear_nature_if_not_required(ctx, mission)?;

        let typed = mission
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let manual_edit = typed.is_some() && mission.code != mission.last_synced_code;

        match typed {
            Some(typed) if manual_edit => self.apply_manual_code(ctx, mission, &typed),
            Some(_) => self.regenerate_from_fields(ctx, mission),
            None => {
                mission.code = None;
                self.regenerate_from_fields(ctx, mission)
            }
        }
    }

    /// 分支 A: 手工输入编码
    fn apply_manual_code(
        &self,
        ctx: &mut ExecContext<'_>,
        mission: &mut Mission,
        typed: &str,
    ) -> EngineResult<()> {
        let catalog = ctx.catalog();
        let parsed = parse_code(
            typed,
            &catalog.list_periods()?,
            &catalog.list_lines()?,
            &catalog.list_affair_types()?,
        );
        if !parsed.code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EngineError::ValidationFailed(format!(
                "业务编码只能包含字母和数字: '{}'",
                typed
            )));
        }

        if parsed.code.len() >= 5 {
            if let Some(id) = parsed.period_id {
                mission.period_id = Some(id);
            }
            if let Some(id) = parsed.line_id {
                mission.line_id = Some(id);
            }
            if let Some(id) = parsed.affair_type_id {
                mission.affair_type_id = Some(id);
            }
            mission.nature = parsed.nature;
        }

        let exclude = (mission.id > 0).then_some(mission.id);
        if ctx.missions().code_exists(&parsed.code, exclude)? {
            let new_code = self.next_free_code(ctx, parsed.prefix(), exclude)?;
            info!(typed = %parsed.code, assigned = %new_code, "业务编码冲突, 自动顺延");
            ctx.notify(
                "naming.code_renumbered",
                &[("typed", &parsed.code), ("code", &new_code)],
            );
            mission.code = Some(new_code);
        } else {
            mission.code = Some(parsed.code.clone());
        }
        mission.last_synced_code = mission.code.clone();
        Ok(())
    }

    /// 分支 B: 分类字段变更后重建编码
    fn regenerate_from_fields(&self, ctx: &mut ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        let Some(prefix) = self.prefix_for(ctx, mission)? else {
            return Ok(());
        };
        let up_to_date = mission
            .code
            .as_deref()
            .map(|c| c.starts_with(&prefix))
            .unwrap_or(false);
        if up_to_date {
            return Ok(());
        }

        let exclude = (mission.id > 0).then_some(mission.id);
        let new_code = self.next_free_code(ctx, &prefix, exclude)?;
        info!(prefix = %prefix, code = %new_code, "业务编码重新生成");
        ctx.notify("naming.code_regenerated", &[("code", &new_code)]);
        mission.code = Some(new_code);
        mission.last_synced_code = mission.code.clone();
        Ok(())
    }

    /// 显式生成编码 (字段不全时报错)
    pub fn generate_code(&self, ctx: &ExecContext<'_>, mission: &mut Mission) -> EngineResult<String> {
        let catalog = ctx.catalog();
        let (Some(period_id), Some(line_id), Some(type_id)) =
            (mission.period_id, mission.line_id, mission.affair_type_id)
        else {
            return Err(EngineError::CodeGeneration(
                "请先填写会计期间、线路和业务类型".to_string(),
            ));
        };
        let affair_type = catalog
            .find_affair_type(type_id)?
            .ok_or_else(|| EngineError::CodeGeneration(format!("业务类型 #{} 不存在", type_id)))?;
        if affair_type.requires_nature && mission.nature.is_none() {
            return Err(EngineError::CodeGeneration(format!(
                "业务类型 '{}' 需要指定任务性质 (R 或 E)",
                affair_type.name
            )));
        }
        let period = catalog.find_period(period_id)?;
        let line = catalog.find_line(line_id)?;
        let prefix = expected_prefix(period.as_ref(), line.as_ref(), Some(&affair_type), mission.nature)
            .ok_or_else(|| EngineError::CodeGeneration("会计期间或线路不存在".to_string()))?;

        let exclude = (mission.id > 0).then_some(mission.id);
        let code = self.next_free_code(ctx, &prefix, exclude)?;
        mission.code = Some(code.clone());
        mission.last_synced_code = Some(code.clone());
        Ok(code)
    }

    /// 售前之后分类字段锁定: 只要有值发生变化即报错
    pub fn check_classification_lock(&self, stored: &Mission, incoming: &Mission) -> EngineResult<()> {
        if stored.state.is_presale() {
            return Ok(());
        }
        let changed = [
            ("code", stored.code != incoming.code),
            ("period", stored.period_id != incoming.period_id),
            ("line", stored.line_id != incoming.line_id),
            ("affair_type", stored.affair_type_id != incoming.affair_type_id),
            ("nature", stored.nature != incoming.nature),
        ];
        match changed.iter().find(|(_, c)| *c) {
            Some((field, _)) => Err(EngineError::ClassificationLocked {
                reference: stored.reference.clone(),
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }
}
