// ==========================================
// 轨道测量任务管理 - 周计划
// ==========================================
// 职责: 每个 ISO 周一行, 七个日班/夜班选择; 测量日文件
// 键: (mission_id, iso_year, iso_week)
// ==========================================

use crate::domain::types::DaySlot;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// ISO 周键 (年, 周序号)
pub type WeekKey = (i32, u32);

// ==========================================
// WeeklyPlanningLine - 周计划行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPlanningLine {
    pub id: i64,
    pub mission_id: i64,
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_start: NaiveDate, // 周一
    pub week_end: NaiveDate,   // 周日
    pub slots: [DaySlot; 7],   // 周一 .. 周日
}

impl WeeklyPlanningLine {
    pub fn key(&self) -> WeekKey {
        (self.iso_year, self.iso_week)
    }

    /// 本周已排班次 (非空选择数)
    pub fn slot_count(&self) -> u32 {
        self.slots.iter().filter(|s| s.is_worked()).count() as u32
    }

    /// 周标签: "S03 (2026)"
    pub fn week_label(&self) -> String {
        format!("S{:02} ({})", self.iso_week, self.iso_year)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.week_start <= date && date <= self.week_end
    }
}

/// 星期 → 存储键 (mon..sun)
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

// ==========================================
// DayFile - 测量日文件
// ==========================================
// 由测量文件归档流程创建, 挂在对应的周计划行与星期上
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayFile {
    pub id: i64,
    pub planning_id: i64,
    pub day: String, // mon..sun
    pub file_name: String,
    pub content: Vec<u8>,
    pub first_pk: Option<f64>,
    pub last_pk: Option<f64>,
}
