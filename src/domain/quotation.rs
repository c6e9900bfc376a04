// ==========================================
// 轨道测量任务管理 - 报价单 (外部销售协作方)
// ==========================================
// 说明: 报价单有自己的生命周期, 任务主状态被动观察;
//       报价行持有指回任务的引用 (mission_id)
// ==========================================

use crate::domain::types::QuotationState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: i64,
    pub name: String,
    pub partner_id: i64,
    pub state: QuotationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub id: i64,
    pub quotation_id: i64,
    pub product_name: String,
    pub description: String,
    pub quantity: f64,
    pub price_unit: f64,
    pub mission_id: Option<i64>,
}
