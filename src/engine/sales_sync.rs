// ==========================================
// 轨道测量任务管理 - 销售协作方同步
// ==========================================
// 职责: 任务 → 报价行 的单向回写 (数量 = 距离, 描述 = 测量明细)
//       创建/关联时写回报价行上的任务指针
// 抑制: ctx.flags.skip_sales_sync 为真时不回写 (报价行自身触发的级联写入)
// ==========================================

use crate::domain::catalog::{AffairType, RailLine};
use crate::domain::mission::Mission;
use crate::domain::quotation::QuotationLine;
use crate::engine::context::ExecContext;
use crate::engine::derived;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use tracing::debug;

const DATE_FMT: &str = "%d/%m/%Y";

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FMT).to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// 测量明细文本 (报价行描述的第二段)
pub fn measurement_details(
    mission: &Mission,
    line: Option<&RailLine>,
    affair_type: Option<&AffairType>,
    cart_needs: &[(String, i32)],
) -> String {
    let mut parts = vec![format!("REF: {}", mission.reference)];

    if let Some(line) = line {
        parts.push(format!("Ligne: {} ({})", line.name, line.nickname));
    }
    if let Some(t) = affair_type {
        parts.push(format!("Mission: {}", t.name));
    }
    parts.push(format!(
        "PK: {:.3} → {:.3} ({:.3} km)",
        mission.pk_initial,
        mission.pk_final,
        derived::distance(mission)
    ));
    if !cart_needs.is_empty() {
        let carts = cart_needs
            .iter()
            .map(|(name, qty)| format!("{}x {}", qty, name))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("Chariots: {}", carts));
    }
    parts.push(format!(
        "Dates: {} - {}",
        fmt_date(mission.date_start),
        fmt_date(mission.date_end)
    ));
    parts.join("\n")
}

#[derive(Debug, Default)]
pub struct SalesSync;

impl SalesSync {
    pub fn new() -> Self {
        Self
    }

    /// 组装报价行描述: 产品名 + 空行 + 测量明细
    pub fn describe(&self, ctx: &ExecContext<'_>, mission: &Mission, product_name: &str) -> EngineResult<String> {
        let catalog = ctx.catalog();
        let line = match mission.line_id {
            Some(id) => catalog.find_line(id)?,
            None => None,
        };
        let affair_type = match mission.affair_type_id {
            Some(id) => catalog.find_affair_type(id)?,
            None => None,
        };
        let mut cart_needs = Vec::new();
        for req in ctx.requirements().list_by_mission(mission.id)? {
            let name = catalog
                .find_cart_type(req.cart_type_id)?
                .map(|t| t.name)
                .unwrap_or_else(|| format!("#{}", req.cart_type_id));
            cart_needs.push((name, req.quantity));
        }
        let details = measurement_details(mission, line.as_ref(), affair_type.as_ref(), &cart_needs);
        Ok(format!("{}\n\n{}", product_name, details))
    }

    /// 回写关联报价行的数量与描述, 返回是否写入
    pub fn sync_quotation_line(&self, ctx: &ExecContext<'_>, mission: &Mission) -> EngineResult<bool> {
        if ctx.flags.skip_sales_sync {
            return Ok(false);
        }
        let Some(line_id) = mission.quotation_line_id else {
            return Ok(false);
        };
        let line = ctx.quotations().get_line(line_id)?;
        let description = self.describe(ctx, mission, &line.product_name)?;
        let quantity = derived::distance(mission);
        ctx.quotations().update_line_content(line_id, quantity, &description)?;
        debug!(mission = %mission.reference, line_id, quantity, "报价行已同步");
        Ok(true)
    }

    /// 校验报价行可被该任务关联: 同一客户, 且尚未关联其他任务
    pub fn check_linkable(&self, ctx: &ExecContext<'_>, mission: &Mission, line: &QuotationLine) -> EngineResult<()> {
        let quotation = ctx.quotations().get(line.quotation_id)?;
        if quotation.partner_id != mission.partner_id {
            return Err(EngineError::ValidationFailed(format!(
                "报价单 {} 不属于任务 {} 的客户",
                quotation.name, mission.reference
            )));
        }
        match line.mission_id {
            Some(other) if other != mission.id => Err(EngineError::ValidationFailed(format!(
                "报价行 #{} 已关联到其他任务 (#{})",
                line.id, other
            ))),
            _ => Ok(()),
        }
    }

    /// 关联已有报价行: 写任务字段 + 报价行回指 + 内容同步
    pub fn link(&self, ctx: &ExecContext<'_>, mission: &mut Mission, line_id: i64) -> EngineResult<()> {
        let line = ctx.quotations().get_line(line_id)?;
        self.check_linkable(ctx, mission, &line)?;

        if let Some(previous) = mission.quotation_line_id.filter(|id| *id != line_id) {
            ctx.quotations().set_line_mission(previous, None)?;
        }
        mission.quotation_line_id = Some(line_id);
        ctx.missions().update(mission)?;
        ctx.quotations().set_line_mission(line_id, Some(mission.id))?;
        self.sync_quotation_line(ctx, mission)?;
        Ok(())
    }

    /// 解除关联 (双向清空)
    pub fn unlink(&self, ctx: &ExecContext<'_>, mission: &mut Mission) -> EngineResult<()> {
        if let Some(line_id) = mission.quotation_line_id.take() {
            ctx.quotations().set_line_mission(line_id, None)?;
            ctx.missions().update(mission)?;
        }
        Ok(())
    }
}
