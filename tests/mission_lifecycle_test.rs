// ==========================================
// 任务生命周期集成测试
// ==========================================
// 覆盖: 报价单驱动的状态同步 / 单步推进 / 数量门槛 / 取消与回到售前
// ==========================================

mod test_helpers;

use rail_measurement::api::ApiError;
use rail_measurement::config::config_keys;
use rail_measurement::domain::types::{
    MeasureStep, MissionState, ProductionStep, QuotationState, StudyStep,
};
use rail_measurement::engine::lifecycle::AssignmentOutcome;
use test_helpers::{d, TestEnv, ACTOR};

const RECEIVED: MissionState = MissionState::Production(ProductionStep::MissionReceived);

// ==========================================
// 报价单同步
// ==========================================

#[test]
fn test_新建任务为售前() {
    let env = TestEnv::new().expect("环境初始化失败");
    let m = env.create_presale("Relevé 650", d(2026, 1, 5), d(2026, 1, 18));

    assert_eq!(m.state, MissionState::Presale);
    assert_eq!(m.reference, "MES/00001");
    assert!(m.id > 0);

    let second = env.create_presale("Relevé 650 bis", d(2026, 1, 5), d(2026, 1, 18));
    assert_eq!(second.reference, "MES/00002");
}

#[test]
fn test_草稿报价单保持售前_确认后进入生产() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let (quotation_id, _) = env.attach_quotation(m.id);

    // 草稿
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Presale);

    let outcome = env
        .missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Confirmed)
        .expect("确认报价单失败");
    assert_eq!(outcome.value.len(), 1);
    assert_eq!(outcome.value[0].state, RECEIVED);
    assert!(outcome.has_notice("lifecycle.state_changed"));

    // 已锁定: 已处于生产中, 不再变化
    let outcome = env
        .missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Locked)
        .unwrap();
    assert!(outcome.value.is_empty());
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, RECEIVED);
}

#[test]
fn test_报价单取消后任务取消_回到草稿后回到售前() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let quotation_id = env.confirm(m.id);

    env.missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Cancelled)
        .unwrap();
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Cancelled);

    env.missions
        .set_quotation_state(ACTOR, quotation_id, QuotationState::Draft)
        .unwrap();
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Presale);
}

#[test]
fn test_解除报价关联后生产任务回到售前() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let outcome = env.missions.unlink_quotation(ACTOR, m.id).expect("解除关联失败");
    assert_eq!(outcome.value.quotation_line_id, None);
    assert_eq!(outcome.value.state, MissionState::Presale);
}

#[test]
fn test_普通读取不触发状态同步() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);
    let logs_before = env.missions.action_logs(m.id).unwrap().len();

    for _ in 0..3 {
        env.missions.get_mission(m.id).unwrap();
        env.missions.list_missions(None).unwrap();
    }
    assert_eq!(env.missions.action_logs(m.id).unwrap().len(), logs_before);

    // 显式刷新: 报价单仍为已确认, 状态保持
    let outcome = env.missions.refresh_state(ACTOR, m.id).unwrap();
    assert_eq!(outcome.value, RECEIVED);
}

#[test]
fn test_报价行回写距离与明细() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let (_, line_id) = env.attach_quotation(m.id);

    let line = env.missions.get_quotation_line(line_id).unwrap();
    assert_eq!(line.mission_id, Some(m.id));
    assert!((line.quantity - 12.5).abs() < 1e-9);
    assert!(line.description.starts_with("Relevé géométrique\n\n"));
    assert!(line.description.contains("REF: MES/00001"));
    assert!(line.description.contains("Ligne: L650000 (650)"));

    // 修改公里标后重新回写
    let mut updated = env.missions.get_mission(m.id).unwrap();
    updated.pk_final = 30.0;
    env.missions.update_mission(ACTOR, updated).unwrap();
    let line = env.missions.get_quotation_line(line_id).unwrap();
    assert!((line.quantity - 20.0).abs() < 1e-9);
}

// ==========================================
// 推进
// ==========================================

#[test]
fn test_售前不能手工推进() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));

    let err = env.missions.advance(ACTOR, m.id).unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[test]
fn test_物资检查需要需求行() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let err = env.missions.advance(ACTOR, m.id).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(ref msg) if msg.contains("需求行")));
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, RECEIVED);
}

#[test]
fn test_物资检查之后必须经过分配校验() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..1]);
    assert_eq!(m.state, MissionState::Production(ProductionStep::MaterialCheck));

    let err = env.missions.advance(ACTOR, m.id).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_分配校验数量不符为硬失败() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);
    let line = env
        .missions
        .add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 2)
        .unwrap()
        .value;
    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[0]])
        .unwrap();
    env.missions.advance(ACTOR, m.id).unwrap();

    let err = env.missions.validate_assignment(ACTOR, m.id, false).unwrap_err();
    match err {
        ApiError::ValidationError(msg) => {
            assert!(msg.contains("LYNX"));
            assert!(msg.contains('2'));
            assert!(msg.contains('1'));
        }
        other => panic!("unexpected: {:?}", other),
    }
    // 确认紧急也不能绕过硬失败
    assert!(env.missions.validate_assignment(ACTOR, m.id, true).is_err());
    assert_eq!(
        env.missions.get_mission(m.id).unwrap().state,
        MissionState::Production(ProductionStep::MaterialCheck)
    );
}

#[test]
fn test_关闭自动开测时停在已分配() {
    let env = TestEnv::new().unwrap();
    env.set_config(config_keys::AUTO_START_MEASURE, "false");
    let carts = env.seed.carts.clone();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..2]);

    let outcome = env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    assert_eq!(
        outcome.value,
        AssignmentOutcome::Assigned(MissionState::Production(ProductionStep::CartsAssigned))
    );

    let next = env.missions.advance(ACTOR, m.id).unwrap().value;
    assert_eq!(next, MissionState::Measure(MeasureStep::Waiting));
}

#[test]
fn test_完整推进到完成_完成为终态() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..1]);
    env.missions.validate_assignment(ACTOR, m.id, false).unwrap();

    let mut visited = Vec::new();
    loop {
        match env.missions.advance(ACTOR, m.id) {
            Ok(outcome) => visited.push(outcome.value),
            Err(e) => {
                assert!(matches!(e, ApiError::InvalidStateTransition { .. }));
                break;
            }
        }
    }
    assert_eq!(visited.first(), Some(&MissionState::Measure(MeasureStep::Reconnaissance)));
    assert!(visited.contains(&MissionState::Study(StudyStep::Reception)));
    assert_eq!(visited.last(), Some(&MissionState::Done));

    // 终态不可取消
    assert!(env.missions.cancel(ACTOR, m.id).is_err());
    assert!(env.missions.reset_to_presale(ACTOR, m.id).is_err());

    let state_logs = env
        .missions
        .action_logs(m.id)
        .unwrap()
        .into_iter()
        .filter(|l| l.action_type == "StateChange")
        .count();
    assert!(state_logs >= visited.len());
}

#[test]
fn test_已完成任务不受报价单状态影响() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..1]);
    env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    while env.missions.advance(ACTOR, m.id).is_ok() {}
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Done);

    let line_id = m.quotation_line_id.unwrap();
    let quotation_id = env.missions.get_quotation_line(line_id).unwrap().quotation_id;

    for state in [QuotationState::Cancelled, QuotationState::Draft] {
        let changed = env
            .missions
            .set_quotation_state(ACTOR, quotation_id, state)
            .unwrap()
            .value;
        assert!(changed.is_empty());
        assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Done);
    }

    env.missions.unlink_quotation(ACTOR, m.id).unwrap();
    env.missions.refresh_state(ACTOR, m.id).unwrap();
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Done);
    assert!(env.missions.reset_to_presale(ACTOR, m.id).is_err());
}

#[test]
fn test_离开生产阶段后不能修改需求与小车() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();

    // 测量中
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..1]);
    env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    let line = env.missions.list_requirements(m.id).unwrap().remove(0);
    assert!(matches!(
        env.missions.set_assigned_carts(ACTOR, line.id, vec![carts[1]]),
        Err(ApiError::BusinessRuleViolation(_))
    ));

    // 已完成
    while env.missions.advance(ACTOR, m.id).is_ok() {}
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, MissionState::Done);
    assert!(matches!(
        env.missions.update_requirement_quantity(ACTOR, line.id, 3),
        Err(ApiError::BusinessRuleViolation(_))
    ));
    assert!(matches!(
        env.missions.set_assigned_carts(ACTOR, line.id, vec![]),
        Err(ApiError::BusinessRuleViolation(ref msg)) if msg.contains(&m.reference)
    ));
    assert!(matches!(
        env.missions.remove_requirement(ACTOR, line.id),
        Err(ApiError::BusinessRuleViolation(_))
    ));
    assert!(matches!(
        env.missions.add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 1),
        Err(ApiError::BusinessRuleViolation(ref msg)) if msg.contains("不能再修改")
    ));
    let stored = env.missions.list_requirements(m.id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].quantity, 1);
    assert_eq!(stored[0].assigned_cart_ids, vec![carts[0]]);

    // 已取消
    let c = env.production_with_carts("C", d(2026, 2, 2), d(2026, 2, 15), &carts[1..2]);
    env.missions.cancel(ACTOR, c.id).unwrap();
    let line = env.missions.list_requirements(c.id).unwrap().remove(0);
    assert!(matches!(
        env.missions.update_requirement_quantity(ACTOR, line.id, 2),
        Err(ApiError::BusinessRuleViolation(_))
    ));
    assert!(matches!(
        env.missions.set_assigned_carts(ACTOR, line.id, vec![carts[2]]),
        Err(ApiError::BusinessRuleViolation(_))
    ));
}

// ==========================================
// 取消 / 回到售前
// ==========================================

#[test]
fn test_任意非终态可取消() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &carts[..1]);
    env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    env.missions.advance(ACTOR, m.id).unwrap();

    let state = env.missions.cancel(ACTOR, m.id).unwrap().value;
    assert_eq!(state, MissionState::Cancelled);
    // 已取消不能再次取消
    assert!(env.missions.cancel(ACTOR, m.id).is_err());
}

#[test]
fn test_无报价单时取消后可回到售前() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.missions.cancel(ACTOR, m.id).unwrap();

    let state = env.missions.reset_to_presale(ACTOR, m.id).unwrap().value;
    assert_eq!(state, MissionState::Presale);
}

#[test]
fn test_报价单已确认时不能回到售前() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let err = env.missions.reset_to_presale(ACTOR, m.id).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
    assert_eq!(env.missions.get_mission(m.id).unwrap().state, RECEIVED);
}

// ==========================================
// 字段约束
// ==========================================

#[test]
fn test_离开售前后公里标必须有效() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let mut edit = env.missions.get_mission(m.id).unwrap();
    edit.pk_final = edit.pk_initial;
    let err = env.missions.update_mission(ACTOR, edit).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 售前允许相同公里标
    let p = env.create_presale("P", d(2026, 1, 5), d(2026, 1, 18));
    let mut edit = p.clone();
    edit.pk_final = edit.pk_initial;
    assert!(env.missions.update_mission(ACTOR, edit).is_ok());
}

#[test]
fn test_删除仅限售前或已取消() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);
    let err = env.missions.delete_mission(ACTOR, m.id).unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    let p = env.create_presale("P", d(2026, 1, 5), d(2026, 1, 18));
    env.missions.delete_mission(ACTOR, p.id).expect("删除售前任务失败");
    assert!(matches!(env.missions.get_mission(p.id), Err(ApiError::NotFound(_))));
    // 周计划随任务级联删除
    assert!(env.missions.list_planning(p.id).unwrap().is_empty());
}

#[test]
fn test_操作人不能为空() {
    let env = TestEnv::new().unwrap();
    let err = env
        .missions
        .create_mission("  ", env.draft("M", d(2026, 1, 5), d(2026, 1, 18)))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(env.missions.list_missions(None).unwrap().is_empty());
}

#[test]
fn test_进度流程图() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m.id);

    let nodes = env.missions.progress_nodes(m.id).unwrap();
    assert!(!nodes.is_empty());
    let mermaid = env.missions.progress_mermaid(m.id).unwrap();
    assert!(mermaid.starts_with("graph LR"));
    assert!(mermaid.contains("P_RECV"));
}
