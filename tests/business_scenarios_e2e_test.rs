// ==========================================
// 端到端业务场景测试
// ==========================================
// 场景:
// 1. 两台 LYNX 分配完成 → 校验通过 → 进入测量/等待
// 2. 小车日历冲突 → 需要确认 → 紧急放行
// 3. 手工编码撞码 → 自动顺延
// 4. 缩短日期删除周 → 再延长得到空周
// 5. 班组冲突 → 写入阻断, 提示占用任务与窗口
// 6. 报价单确认 → 任务进入生产
// ==========================================

mod test_helpers;

use rail_measurement::api::ApiError;
use rail_measurement::domain::types::{
    DaySlot, MeasureStep, MissionState, ProductionStep, QuotationState,
};
use rail_measurement::engine::conflict::SoftFailure;
use rail_measurement::engine::lifecycle::AssignmentOutcome;
use test_helpers::{d, TestEnv, ACTOR};

#[test]
fn test_场景1_分配完成后进入测量() {
    let env = TestEnv::new().expect("环境初始化失败");
    let m = env.create_presale("Relevé L650", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let line = env
        .missions
        .add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 2)
        .unwrap()
        .value;
    assert_eq!(
        env.missions.advance(ACTOR, m.id).unwrap().value,
        MissionState::Production(ProductionStep::MaterialCheck)
    );

    // 只分配一台: 数量门槛阻断
    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[0]])
        .unwrap();
    assert!(matches!(
        env.missions.validate_assignment(ACTOR, m.id, false),
        Err(ApiError::ValidationError(_))
    ));

    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[0], env.seed.carts[1]])
        .unwrap();
    let outcome = env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    assert_eq!(
        outcome.value,
        AssignmentOutcome::Assigned(MissionState::Measure(MeasureStep::Waiting))
    );

    let logs = env.missions.action_logs(m.id).unwrap();
    assert!(logs.iter().any(|l| l.action_type == "CreateMission"));
    assert!(logs.iter().any(|l| l.action_type == "AssignCarts"));
    assert!(logs.iter().any(|l| l.action_type == "QuotationSync"));
}

#[test]
fn test_场景2_日历冲突经确认后紧急放行() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];

    let b = env.create_presale("B", d(2026, 1, 12), d(2026, 1, 18));
    let b_line = env
        .missions
        .add_requirement(ACTOR, b.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;
    env.missions.set_assigned_carts(ACTOR, b_line.id, vec![cart]).unwrap();

    let a = env.production_with_carts("A", d(2026, 1, 5), d(2026, 1, 18), &[cart]);
    env.missions.validate_assignment(ACTOR, a.id, false).unwrap();

    env.confirm(b.id);
    env.missions.advance(ACTOR, b.id).unwrap();

    let pending = env.missions.validate_assignment(ACTOR, b.id, false).unwrap();
    match pending.value {
        AssignmentOutcome::ConfirmationRequired(soft) => {
            let text = soft[0].to_string();
            assert!(text.contains("LYNX1"));
            assert!(text.contains(&a.reference));
            assert!(matches!(soft[0], SoftFailure::CartCalendarConflict { .. }));
        }
        other => panic!("unexpected: {:?}", other),
    }

    let confirmed = env.missions.validate_assignment(ACTOR, b.id, true).unwrap();
    assert!(matches!(confirmed.value, AssignmentOutcome::Urgency(_)));
    let stored = env.missions.get_mission(b.id).unwrap();
    assert_eq!(stored.state, MissionState::Production(ProductionStep::Urgency));
    assert!(env
        .missions
        .action_logs(b.id)
        .unwrap()
        .iter()
        .any(|l| l.action_type == "UrgencyOverride"));
}

#[test]
fn test_场景3_手工编码撞码顺延() {
    let env = TestEnv::new().unwrap();
    let mut first = env.draft("A", d(2026, 1, 5), d(2026, 1, 18));
    first.code = Some("C650P001".to_string());
    let first = env.missions.create_mission(ACTOR, first).unwrap();
    assert_eq!(first.value.code.as_deref(), Some("C650P001"));
    assert!(!first.has_notice("naming.code_renumbered"));

    let mut second = env.draft("B", d(2026, 1, 5), d(2026, 1, 18));
    second.code = Some("C650P001".to_string());
    let second = env.missions.create_mission(ACTOR, second).unwrap();
    assert_eq!(second.value.code.as_deref(), Some("C650P002"));
    assert!(second.has_notice("naming.code_renumbered"));
}

#[test]
fn test_场景4_缩短再延长周计划() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let rows = env.missions.list_planning(m.id).unwrap();
    assert_eq!(rows.len(), 2);
    env.missions
        .set_day_slots(ACTOR, rows[1].id, [DaySlot::Night; 7])
        .unwrap();

    let mut edit = env.missions.get_mission(m.id).unwrap();
    edit.date_end = Some(d(2026, 1, 11));
    let shrunk = env.missions.update_mission(ACTOR, edit).unwrap();
    assert!(shrunk.has_notice("planning.weeks_removed"));
    assert_eq!(env.missions.list_planning(m.id).unwrap().len(), 1);

    let mut edit = env.missions.get_mission(m.id).unwrap();
    edit.date_end = Some(d(2026, 1, 18));
    env.missions.update_mission(ACTOR, edit).unwrap();
    let rows = env.missions.list_planning(m.id).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].key(), (2026, 3));
    assert_eq!(rows[1].slot_count(), 0);
}

#[test]
fn test_场景5_班组冲突阻断写入() {
    let env = TestEnv::new().unwrap();
    let t1 = env.seed.team_1;

    let m1 = env.create_presale("M1", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m1.id);
    env.missions.set_teams(ACTOR, m1.id, Some(t1), None).unwrap();

    let m4 = env.create_presale("M4", d(2026, 1, 10), d(2026, 1, 12));
    env.confirm(m4.id);
    // M4 把 T1 放在第二班组槽位, 同样与 M1 的第一槽位冲突
    let err = env.missions.set_teams(ACTOR, m4.id, None, Some(t1)).unwrap_err();
    match err {
        ApiError::ResourceConflict(msg) => {
            assert!(msg.contains("T1"));
            assert!(msg.contains(&m1.reference));
            assert!(msg.contains("2026-01-05 ~ 2026-01-18"));
        }
        other => panic!("unexpected: {:?}", other),
    }
    let m4 = env.missions.get_mission(m4.id).unwrap();
    assert_eq!(m4.team_1_id, None);
    assert_eq!(m4.team_2_id, None);
}

#[test]
fn test_场景6_报价单确认进入生产() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let (quotation_id, line_id) = env.attach_quotation(m.id);

    env.missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Sent)
        .unwrap();
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Presale);

    let outcome = env
        .missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Confirmed)
        .unwrap();
    assert_eq!(outcome.value.len(), 1);
    assert_eq!(
        env.missions.get_mission(m.id).unwrap().state,
        MissionState::Production(ProductionStep::MissionReceived)
    );

    // 报价单状态写入不回写报价行
    let line = env.missions.get_quotation_line(line_id).unwrap();
    assert_eq!(line.mission_id, Some(m.id));
}

#[test]
fn test_报价行不能被两个任务关联() {
    let env = TestEnv::new().unwrap();
    let a = env.create_presale("A", d(2026, 1, 5), d(2026, 1, 18));
    let (_, line_id) = env.attach_quotation(a.id);

    let b = env.create_presale("B", d(2026, 1, 5), d(2026, 1, 18));
    let err = env.missions.link_quotation_line(ACTOR, b.id, line_id).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_创建时关联报价行() {
    let env = TestEnv::new().unwrap();
    let quotation = env
        .missions
        .create_quotation(ACTOR, env.seed.partner_id, "Devis 2026-01")
        .unwrap()
        .value;
    let line = env
        .missions
        .add_quotation_line(ACTOR, quotation.id, "Relevé", 90.0)
        .unwrap()
        .value;
    env.missions
        .set_quotation_state(ACTOR, quotation.id, QuotationState::Confirmed)
        .unwrap();

    let mut draft = env.draft("M", d(2026, 1, 5), d(2026, 1, 18));
    draft.quotation_line_id = Some(line.id);
    let m = env.missions.create_mission(ACTOR, draft).unwrap().value;
    assert_eq!(m.quotation_line_id, Some(line.id));
    assert_eq!(m.state, MissionState::Production(ProductionStep::MissionReceived));
}
