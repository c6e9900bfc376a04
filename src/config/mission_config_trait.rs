// ==========================================
// 轨道测量任务管理 - 任务配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::WeekAlignment;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ==========================================
// MissionConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait MissionConfigReader: Send + Sync {
    /// 周对齐策略
    ///
    /// # 默认值
    /// - SNAP: 写入日期向外扩展到周一/周日
    fn get_week_alignment(&self) -> Result<WeekAlignment, Box<dyn Error>>;

    /// 小车分配校验通过后是否直接进入测量/等待
    ///
    /// # 默认值
    /// - true
    fn get_auto_start_measure(&self) -> Result<bool, Box<dyn Error>>;

    /// 任务 reference 前缀
    ///
    /// # 默认值
    /// - MES/
    fn get_reference_prefix(&self) -> Result<String, Box<dyn Error>>;

    /// 提示信息默认语言
    ///
    /// # 默认值
    /// - zh-CN
    fn get_default_locale(&self) -> Result<String, Box<dyn Error>>;
}

// ==========================================
// MissionConfig - 单次请求使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    pub week_alignment: WeekAlignment,
    pub auto_start_measure: bool,
    pub reference_prefix: String,
    pub default_locale: String,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            week_alignment: WeekAlignment::Snap,
            auto_start_measure: true,
            reference_prefix: "MES/".to_string(),
            default_locale: "zh-CN".to_string(),
        }
    }
}

impl MissionConfig {
    /// 一次性读取全部配置项
    pub fn load(reader: &dyn MissionConfigReader) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            week_alignment: reader.get_week_alignment()?,
            auto_start_measure: reader.get_auto_start_measure()?,
            reference_prefix: reader.get_reference_prefix()?,
            default_locale: reader.get_default_locale()?,
        })
    }
}
