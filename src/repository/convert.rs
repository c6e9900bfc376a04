// ==========================================
// 轨道测量任务管理 - 行映射辅助
// ==========================================
// 日期统一存储为 YYYY-MM-DD 文本
// ==========================================

use chrono::NaiveDate;
use rusqlite::types::Type;

pub const DATE_FMT: &str = "%Y-%m-%d";

pub fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub fn fmt_opt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(fmt_date)
}

/// 解析日期列; 非法文本转为 rusqlite 转换错误 (不静默回退)
pub fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_opt_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| parse_date(idx, &s)).transpose()
}

pub fn bool_to_int(v: bool) -> i32 {
    if v {
        1
    } else {
        0
    }
}
