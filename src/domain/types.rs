// ==========================================
// 轨道测量任务管理 - 领域类型定义
// ==========================================
// 职责: 任务主状态 + 阶段子状态、报价单状态、小车物理状态、
//       任务性质、日班/夜班选择等枚举
// 红线: 子状态只能挂在匹配的主状态上 (标签联合, 不存在非法组合)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 生产阶段子状态 (Production Step)
// ==========================================
// 顺序: 收到任务 → 物资检查 → (可选) 紧急/短缺 → 小车已分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStep {
    MissionReceived, // 收到任务
    MaterialCheck,   // 物资检查
    Urgency,         // 紧急/短缺 (软失败被人工确认)
    CartsAssigned,   // 小车已分配
}

impl ProductionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStep::MissionReceived => "MISSION_RECEIVED",
            ProductionStep::MaterialCheck => "MATERIAL_CHECK",
            ProductionStep::Urgency => "URGENCY",
            ProductionStep::CartsAssigned => "CARTS_ASSIGNED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MISSION_RECEIVED" => Some(ProductionStep::MissionReceived),
            "MATERIAL_CHECK" => Some(ProductionStep::MaterialCheck),
            "URGENCY" => Some(ProductionStep::Urgency),
            "CARTS_ASSIGNED" => Some(ProductionStep::CartsAssigned),
            _ => None,
        }
    }
}

// ==========================================
// 测量阶段子状态 (Measure Step)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasureStep {
    Waiting,        // 等待出发
    Reconnaissance, // 现场踏勘
    Geometry,       // 几何测量
    Position,       // 定位测量
    Catenary,       // 接触网测量
    Done,           // 测量完成
}

impl MeasureStep {
    pub const ORDER: [MeasureStep; 6] = [
        MeasureStep::Waiting,
        MeasureStep::Reconnaissance,
        MeasureStep::Geometry,
        MeasureStep::Position,
        MeasureStep::Catenary,
        MeasureStep::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureStep::Waiting => "WAITING",
            MeasureStep::Reconnaissance => "RECONNAISSANCE",
            MeasureStep::Geometry => "GEOMETRY",
            MeasureStep::Position => "POSITION",
            MeasureStep::Catenary => "CATENARY",
            MeasureStep::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ORDER.iter().copied().find(|step| step.as_str() == s)
    }

    /// 下一个测量子状态 (Done 之后返回 None)
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|s| s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

// ==========================================
// 研究阶段子状态 (Study Step)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStep {
    Reception,  // 数据接收
    Analysis,   // 分析
    Validation, // 校核
}

impl StudyStep {
    pub const ORDER: [StudyStep; 3] = [StudyStep::Reception, StudyStep::Analysis, StudyStep::Validation];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStep::Reception => "RECEPTION",
            StudyStep::Analysis => "ANALYSIS",
            StudyStep::Validation => "VALIDATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ORDER.iter().copied().find(|step| step.as_str() == s)
    }

    pub fn next(&self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|s| s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

// ==========================================
// 任务状态 (Mission State)
// ==========================================
// 主状态: presale → production → measure → study → invoicing → done
// cancelled 可由任意非终态进入, 报价单回到草稿/已发送时可回到 presale
// 持久化: (state, sub_state) 两列, 由 to_db/from_db 负责编解码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionState {
    Presale,
    Production(ProductionStep),
    Measure(MeasureStep),
    Study(StudyStep),
    Invoicing,
    Done,
    Cancelled,
}

impl Default for MissionState {
    fn default() -> Self {
        MissionState::Presale
    }
}

impl MissionState {
    /// 主状态编码 (数据库 state 列)
    pub fn primary_str(&self) -> &'static str {
        match self {
            MissionState::Presale => "PRESALE",
            MissionState::Production(_) => "PRODUCTION",
            MissionState::Measure(_) => "MEASURE",
            MissionState::Study(_) => "STUDY",
            MissionState::Invoicing => "INVOICING",
            MissionState::Done => "DONE",
            MissionState::Cancelled => "CANCELLED",
        }
    }

    /// 子状态编码 (数据库 sub_state 列)
    pub fn sub_str(&self) -> Option<&'static str> {
        match self {
            MissionState::Production(step) => Some(step.as_str()),
            MissionState::Measure(step) => Some(step.as_str()),
            MissionState::Study(step) => Some(step.as_str()),
            _ => None,
        }
    }

    /// 从数据库两列解析
    ///
    /// # 返回
    /// - Some(MissionState): 组合合法
    /// - None: 未知主状态或子状态缺失/不匹配
    pub fn from_db(state: &str, sub_state: Option<&str>) -> Option<Self> {
        match state {
            "PRESALE" => Some(MissionState::Presale),
            "PRODUCTION" => sub_state.and_then(ProductionStep::parse).map(MissionState::Production),
            "MEASURE" => sub_state.and_then(MeasureStep::parse).map(MissionState::Measure),
            "STUDY" => sub_state.and_then(StudyStep::parse).map(MissionState::Study),
            "INVOICING" => Some(MissionState::Invoicing),
            "DONE" => Some(MissionState::Done),
            "CANCELLED" => Some(MissionState::Cancelled),
            _ => None,
        }
    }

    /// 是否为终态 (done 为终态; cancelled 可回到 presale, 但不再推进)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionState::Done | MissionState::Cancelled)
    }

    /// 是否真正占用资源 (presale 与 cancelled 不占用)
    pub fn claims_resources(&self) -> bool {
        !matches!(self, MissionState::Presale | MissionState::Cancelled)
    }

    pub fn is_presale(&self) -> bool {
        matches!(self, MissionState::Presale)
    }

    /// 需求行与小车分配只在售前与生产阶段可改
    pub fn accepts_resource_edits(&self) -> bool {
        matches!(self, MissionState::Presale | MissionState::Production(_))
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_str() {
            Some(sub) => write!(f, "{}/{}", self.primary_str(), sub),
            None => write!(f, "{}", self.primary_str()),
        }
    }
}

// ==========================================
// 报价单状态 (Quotation State)
// ==========================================
// 外部销售单据的生命周期, 任务主状态据此被动同步
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationState {
    Draft,
    Sent,
    Confirmed,
    Locked,
    Cancelled,
}

impl QuotationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationState::Draft => "DRAFT",
            QuotationState::Sent => "SENT",
            QuotationState::Confirmed => "CONFIRMED",
            QuotationState::Locked => "LOCKED",
            QuotationState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(QuotationState::Draft),
            "SENT" => Some(QuotationState::Sent),
            "CONFIRMED" => Some(QuotationState::Confirmed),
            "LOCKED" => Some(QuotationState::Locked),
            "CANCELLED" => Some(QuotationState::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for QuotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 小车物理状态 (Cart Condition)
// ==========================================
// 红线: 物理状态与日历占用是两个正交维度, 占用从不存储在小车上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartCondition {
    Available,    // 可用
    Maintenance,  // 维护中
    OutOfService, // 停用
}

impl CartCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartCondition::Available => "AVAILABLE",
            CartCondition::Maintenance => "MAINTENANCE",
            CartCondition::OutOfService => "OUT_OF_SERVICE",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MAINTENANCE" => CartCondition::Maintenance,
            "OUT_OF_SERVICE" => CartCondition::OutOfService,
            _ => CartCondition::Available,
        }
    }

    pub fn is_operable(&self) -> bool {
        matches!(self, CartCondition::Available)
    }
}

impl fmt::Display for CartCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 任务性质 (Nature)
// ==========================================
// R: 仅测量 (Relevés seuls), E: 测量 + 研究 (Relevés et études)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nature {
    R,
    E,
}

impl Nature {
    pub fn letter(&self) -> char {
        match self {
            Nature::R => 'R',
            Nature::E => 'E',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'R' => Some(Nature::R),
            'E' => Some(Nature::E),
            _ => None,
        }
    }
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ==========================================
// 轨距 (Track Gauge)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackGauge {
    Normal, // 标准轨 1435mm
    Metric, // 米轨 1000mm
}

impl TrackGauge {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackGauge::Normal => "NORMAL",
            TrackGauge::Metric => "METRIC",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "METRIC" => TrackGauge::Metric,
            _ => TrackGauge::Normal,
        }
    }
}

// ==========================================
// 日班/夜班选择 (Day Slot)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaySlot {
    #[default]
    Empty,
    Day,
    Night,
}

impl DaySlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaySlot::Empty => "EMPTY",
            DaySlot::Day => "DAY",
            DaySlot::Night => "NIGHT",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DAY" => DaySlot::Day,
            "NIGHT" => DaySlot::Night,
            _ => DaySlot::Empty,
        }
    }

    pub fn is_worked(&self) -> bool {
        !matches!(self, DaySlot::Empty)
    }
}

// ==========================================
// 周对齐策略 (Week Alignment)
// ==========================================
// Snap: 写入时向外扩展到周一/周日; Strict: 未对齐直接拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekAlignment {
    Snap,
    Strict,
}

impl WeekAlignment {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "STRICT" => WeekAlignment::Strict,
            _ => WeekAlignment::Snap,
        }
    }
}
