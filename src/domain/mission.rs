// ==========================================
// 轨道测量任务管理 - 任务聚合根
// ==========================================
// 职责: Mission 实体、小车类型需求行、时间窗口
// 所有权: 任务拥有需求行、周计划、日文件、范围行 (级联删除);
//         任务只引用小车、班组、线路、业务类型 (不拥有)
// ==========================================

use crate::domain::types::{MissionState, Nature};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// DateWindow - 半开时间窗口 [start, end)
// ==========================================
// 任务存储的是闭区间 [date_start, date_end] (按天),
// 转换为半开窗口时 end = date_end + 1 天
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate, // 不包含
}

impl DateWindow {
    /// 由闭区间日期构造
    pub fn from_inclusive(date_start: NaiveDate, date_end: NaiveDate) -> Self {
        Self {
            start: date_start,
            end: date_end + Duration::days(1),
        }
    }

    /// 半开区间重叠判定: other.start < end AND other.end > start
    pub fn overlaps(&self, other: &DateWindow) -> bool {
        other.start < self.end && other.end > self.start
    }

    /// 闭区间最后一天
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }
}

// ==========================================
// Mission - 测量任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    // ===== 标识 =====
    pub id: i64,
    pub reference: String, // 序列号分配, 创建后不可变
    pub name: String,

    // ===== 业务编码 =====
    pub code: Option<String>,             // <期间><线路简称><业务类型>[性质]###
    pub last_synced_code: Option<String>, // 最近一次同步的编码 (区分手工编辑与字段驱动)
    pub nature: Option<Nature>,

    // ===== 分类 =====
    pub period_id: Option<i64>,
    pub line_id: Option<i64>,
    pub affair_type_id: Option<i64>,
    pub track_type_ids: Vec<i64>,

    // ===== 客户与报价 =====
    pub partner_id: i64,
    pub quotation_line_id: Option<i64>,

    // ===== 时间范围 (闭区间, 按天) =====
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,

    // ===== 公里标 (km) =====
    pub pk_initial: f64,
    pub pk_final: f64,
    pub progress_start: Option<f64>, // 实测起点 (文件归档写入)
    pub progress_end: Option<f64>,   // 实测终点

    // ===== 班组 =====
    pub team_1_id: Option<i64>,
    pub team_2_id: Option<i64>,

    // ===== 生命周期 =====
    pub state: MissionState,

    // ===== 计价 =====
    pub price_unit: f64, // 每公里单价
    pub daily_rate: f64, // 每班次单价

    pub notes: Option<String>,
}

impl Mission {
    /// 创建新的任务 (presale, 尚无编码)
    pub fn new(reference: String, partner_id: i64) -> Self {
        Self {
            id: 0,
            reference,
            name: "New Measurement".to_string(),
            code: None,
            last_synced_code: None,
            nature: None,
            period_id: None,
            line_id: None,
            affair_type_id: None,
            track_type_ids: Vec::new(),
            partner_id,
            quotation_line_id: None,
            date_start: None,
            date_end: None,
            pk_initial: 0.0,
            pk_final: 0.0,
            progress_start: None,
            progress_end: None,
            team_1_id: None,
            team_2_id: None,
            state: MissionState::Presale,
            price_unit: 0.0,
            daily_rate: 0.0,
            notes: None,
        }
    }

    /// 半开时间窗口 (起止日期均已设置时)
    pub fn window(&self) -> Option<DateWindow> {
        match (self.date_start, self.date_end) {
            (Some(start), Some(end)) => Some(DateWindow::from_inclusive(start, end)),
            _ => None,
        }
    }

    /// 已设置的班组 (去掉空位)
    pub fn teams(&self) -> Vec<i64> {
        [self.team_1_id, self.team_2_id].into_iter().flatten().collect()
    }

    /// 用于提示信息的标签: 优先业务编码, 其次参考号
    pub fn label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.reference)
    }
}

// ==========================================
// CartTypeLine - 小车类型需求行
// ==========================================
// 约束: (mission_id, cart_type_id) 唯一; quantity >= 1
// 离开生产阶段前: 已分配数量必须等于需求数量
// ==========================================
// 冲突命中的另一任务 (携带其窗口与编号, 用于提示)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingMission {
    pub mission_id: i64,
    pub reference: String,
    pub code: Option<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl ConflictingMission {
    pub fn label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.reference)
    }
}

impl fmt::Display for ConflictingMission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ~ {})", self.reference, self.date_start, self.date_end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartTypeLine {
    pub id: i64,
    pub mission_id: i64,
    pub cart_type_id: i64,
    pub quantity: i32,
    pub assigned_cart_ids: Vec<i64>,
}

impl CartTypeLine {
    pub fn assigned_count(&self) -> usize {
        self.assigned_cart_ids.len()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.assigned_count() == self.quantity.max(0) as usize
    }
}
