// ==========================================
// 轨道测量任务管理 - 基础目录实体
// ==========================================
// 职责: 线路、会计期间、业务类型、股道类型、小车类型、小车、员工
// 说明: 慢变参考数据, 被任务引用 (不被任务拥有)
// ==========================================

use crate::domain::types::{CartCondition, TrackGauge};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// RailLine - 铁路线路
// ==========================================
// 约束: name 唯一 (如 L650000), nickname 唯一 (如 650, TMB)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailLine {
    pub id: i64,
    pub name: String,                  // 线路名 (如 L650000)
    pub nickname: String,              // 简称, 用于业务编码
    pub gauge: TrackGauge,             // 轨距
    pub station_start: Option<String>, // 起点站
    pub station_end: Option<String>,   // 终点站
    pub length_km: Option<f64>,        // 长度 (km)
    pub active: bool,
}

impl RailLine {
    pub fn new(name: &str, nickname: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            nickname: nickname.to_string(),
            gauge: TrackGauge::Normal,
            station_start: None,
            station_end: None,
            length_km: None,
            active: true,
        }
    }
}

// ==========================================
// AccountingPeriod - 会计期间
// ==========================================
// code 为单字母 (如 X, C), 作为业务编码首字符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    pub id: i64,
    pub code: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub active: bool,
}

impl AccountingPeriod {
    /// 显示名: "[C] 2026"
    pub fn display_name(&self) -> String {
        use chrono::Datelike;
        format!("[{}] {}", self.code, self.date_start.year())
    }
}

// ==========================================
// AffairType - 业务类型
// ==========================================
// requires_nature = true 时, 编码需要附加 R/E 性质字母
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffairType {
    pub id: i64,
    pub name: String,
    pub code: String, // 如 P, C, INS, MOE (唯一)
    pub description: Option<String>,
    pub requires_nature: bool,
    pub sequence: i32,
    pub active: bool,
}

impl AffairType {
    pub fn new(name: &str, code: &str, requires_nature: bool) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            code: code.to_string(),
            description: None,
            requires_nature,
            sequence: 10,
            active: true,
        }
    }
}

// ==========================================
// TrackType - 股道类型 (如 V1, V2)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackType {
    pub id: i64,
    pub name: String,
}

// ==========================================
// CartType - 小车类型 (如 LYNX, LYNX PLUS)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartType {
    pub id: i64,
    pub name: String,
    pub manufacturer: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// Cart - 物理测量小车
// ==========================================
// 红线: condition 只表示物理可用性, 日历占用通过检索任务派生
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub name: String,
    pub serial_number: String, // 唯一
    pub cart_type_id: i64,
    pub condition: CartCondition,
    pub notes: Option<String>,
    pub active: bool,
}

impl Cart {
    pub fn new(name: &str, serial_number: &str, cart_type_id: i64) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            serial_number: serial_number.to_string(),
            cart_type_id,
            condition: CartCondition::Available,
            notes: None,
            active: true,
        }
    }
}

// ==========================================
// Employee - 员工 (人事协作方的最小投影)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub active: bool,
}
