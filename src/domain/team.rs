// ==========================================
// 轨道测量任务管理 - 现场班组
// ==========================================
// 红线: 班组长不能同时是班组成员
// 说明: 班组占用与小车一样, 通过检索重叠任务派生, 不存储
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTeam {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
    pub member_ids: Vec<i64>,
    pub color: String,
    pub active: bool,
}

impl FieldTeam {
    pub fn new(name: &str, leader_id: i64, member_ids: Vec<i64>) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            leader_id,
            member_ids,
            color: "#875A7B".to_string(),
            active: true,
        }
    }

    /// 班组构成是否合法 (班组长不在成员列表中)
    pub fn is_composition_valid(&self) -> bool {
        !self.member_ids.contains(&self.leader_id)
    }
}
