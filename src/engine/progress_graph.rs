// ==========================================
// 轨道测量任务管理 - 进度流程图 (只读投影)
// ==========================================
// 由 (主状态, 子状态) 纯计算出有序节点, 每个节点为 完成/当前/未开始
// 输出 Mermaid 文本 (graph LR), 紧急子状态作为物资检查后的分支节点
// ==========================================

use crate::domain::types::{MeasureStep, MissionState, ProductionStep, StudyStep};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Complete,
    Active,
    Pending,
}

impl NodeStatus {
    fn css_class(&self) -> &'static str {
        match self {
            NodeStatus::Complete => "done",
            NodeStatus::Active => "active",
            NodeStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressNode {
    pub id: &'static str,
    pub label: &'static str,
    pub state: MissionState,
    pub status: NodeStatus,
}

/// 主干流程 (不含紧急分支)
const MAIN_PATH: [(&str, &str, MissionState); 17] = [
    ("PRESALE", "Avant-vente", MissionState::Presale),
    ("P_RECV", "Mission reçue", MissionState::Production(ProductionStep::MissionReceived)),
    ("P_MAT", "Vérif. matériel", MissionState::Production(ProductionStep::MaterialCheck)),
    ("P_CARTS", "Chariots affectés", MissionState::Production(ProductionStep::CartsAssigned)),
    ("M_WAIT", "En attente", MissionState::Measure(MeasureStep::Waiting)),
    ("M_RECO", "Reconnaissance", MissionState::Measure(MeasureStep::Reconnaissance)),
    ("M_GEO", "Géométrie", MissionState::Measure(MeasureStep::Geometry)),
    ("M_POS", "Position", MissionState::Measure(MeasureStep::Position)),
    ("M_CAT", "Caténaire", MissionState::Measure(MeasureStep::Catenary)),
    ("M_DONE", "Relevés terminés", MissionState::Measure(MeasureStep::Done)),
    ("S_RECEP", "Réception", MissionState::Study(StudyStep::Reception)),
    ("S_ANA", "Analyse", MissionState::Study(StudyStep::Analysis)),
    ("S_VALID", "Validation", MissionState::Study(StudyStep::Validation)),
    ("INVOICE", "Facturation", MissionState::Invoicing),
    ("DONE", "Terminé", MissionState::Done),
    ("URGENCY", "Urgence", MissionState::Production(ProductionStep::Urgency)),
    ("CANCELLED", "Annulé", MissionState::Cancelled),
];

/// 节点在主干上的序号; 紧急子状态视为与物资检查之后、分配之前同级
fn rank(state: MissionState) -> Option<usize> {
    match state {
        MissionState::Production(ProductionStep::Urgency) => Some(2),
        MissionState::Cancelled => None,
        other => MAIN_PATH[..15].iter().position(|(_, _, s)| *s == other),
    }
}

/// 计算全部节点状态
pub fn progress_nodes(current: MissionState) -> Vec<ProgressNode> {
    let current_rank = rank(current);
    MAIN_PATH
        .iter()
        .map(|(id, label, state)| {
            let status = if *state == current {
                NodeStatus::Active
            } else {
                match (*state, current_rank) {
                    // 分支与取消节点只在当前时高亮
                    (MissionState::Production(ProductionStep::Urgency), _) | (MissionState::Cancelled, _) => {
                        NodeStatus::Pending
                    }
                    (_, None) => NodeStatus::Pending,
                    (s, Some(cur)) => match rank(s) {
                        Some(r) if r <= cur => NodeStatus::Complete,
                        _ => NodeStatus::Pending,
                    },
                }
            };
            ProgressNode {
                id,
                label,
                state: *state,
                status,
            }
        })
        .collect()
}

/// 渲染 Mermaid 流程图
pub fn render_mermaid(current: MissionState) -> String {
    let nodes = progress_nodes(current);
    let mut lines = vec![
        "graph LR".to_string(),
        "classDef active fill:#714B67,color:#fff,stroke:#333,stroke-width:4px".to_string(),
        "classDef done fill:#e2e2e2,color:#999,stroke:#ccc".to_string(),
        "classDef pending fill:#fff,color:#bfbfbf,stroke:#eee".to_string(),
    ];

    let main: Vec<&ProgressNode> = nodes.iter().take(15).collect();
    for pair in main.windows(2) {
        lines.push(format!(
            "  {}({}) --> {}({})",
            pair[0].id, pair[0].label, pair[1].id, pair[1].label
        ));
    }
    lines.push("  P_MAT -. conflit .-> URGENCY[Urgence]".to_string());
    lines.push("  URGENCY --> P_CARTS".to_string());
    lines.push("  PRESALE -.-> CANCELLED((Annulé))".to_string());

    for node in &nodes {
        lines.push(format!("  class {} {}", node.id, node.status.css_class()));
    }
    lines.join("\n")
}
