// ==========================================
// 资源冲突检测集成测试
// ==========================================
// 覆盖: 半开窗口重叠 / 自身排除 / 售前与已取消不占用
//       直接写入阻断 / 分配校验软失败与紧急放行 / 下拉标签
// ==========================================

mod test_helpers;

use rail_measurement::api::ApiError;
use rail_measurement::domain::types::{CartCondition, MeasureStep, MissionState, ProductionStep};
use rail_measurement::engine::conflict::SoftFailure;
use rail_measurement::engine::lifecycle::AssignmentOutcome;
use test_helpers::{d, TestEnv, ACTOR};

/// 生产中的任务, 已通过分配校验 (进入测量/等待)
fn measuring(env: &TestEnv, name: &str, start: (u32, u32), end: (u32, u32), carts: &[i64]) -> i64 {
    let m = env.production_with_carts(name, d(2026, start.0, start.1), d(2026, end.0, end.1), carts);
    let outcome = env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    assert_eq!(
        outcome.value,
        AssignmentOutcome::Assigned(MissionState::Measure(MeasureStep::Waiting))
    );
    m.id
}

// ==========================================
// 小车
// ==========================================

#[test]
fn test_相邻周不冲突() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];
    measuring(&env, "A", (1, 5), (1, 11), &[cart]);
    // 紧接着的一周使用同一台小车
    measuring(&env, "B", (1, 12), (1, 18), &[cart]);
}

#[test]
fn test_重叠窗口直接写入小车被阻断() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];
    let a = measuring(&env, "A", (1, 5), (1, 18), &[cart]);
    let a_ref = env.missions.get_mission(a).unwrap().reference;

    let b = env.create_presale("B", d(2026, 1, 12), d(2026, 1, 25));
    env.confirm(b.id);
    let line = env
        .missions
        .add_requirement(ACTOR, b.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;

    let err = env
        .missions
        .set_assigned_carts(ACTOR, line.id, vec![cart])
        .unwrap_err();
    match err {
        ApiError::ResourceConflict(msg) => {
            assert!(msg.contains("LYNX1"));
            assert!(msg.contains(&a_ref));
            assert!(msg.contains("2026-01-05 ~ 2026-01-18"));
        }
        other => panic!("unexpected: {:?}", other),
    }
    // 事务回滚: 没有写入任何分配
    let lines = env.missions.list_requirements(b.id).unwrap();
    assert!(lines[0].assigned_cart_ids.is_empty());

    // 另一台空闲小车可以分配
    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[1]])
        .expect("空闲小车分配失败");
}

#[test]
fn test_冲突检测对称() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];

    // 先排后一周, 再排覆盖两周的任务: 同样冲突
    measuring(&env, "Later", (1, 12), (1, 18), &[cart]);
    let early = env.create_presale("Early", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(early.id);
    let line = env
        .missions
        .add_requirement(ACTOR, early.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;
    assert!(matches!(
        env.missions.set_assigned_carts(ACTOR, line.id, vec![cart]),
        Err(ApiError::ResourceConflict(_))
    ));
}

#[test]
fn test_修改日期后重新校验已分配小车() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];
    measuring(&env, "A", (1, 5), (1, 11), &[cart]);
    let b = measuring(&env, "B", (1, 12), (1, 18), &[cart]);

    // B 提前到 1 月 8 日, 对齐后从 1 月 5 日开始, 与 A 重叠
    let mut edit = env.missions.get_mission(b).unwrap();
    edit.date_start = Some(d(2026, 1, 8));
    let err = env.missions.update_mission(ACTOR, edit).unwrap_err();
    assert!(matches!(err, ApiError::ResourceConflict(_)));

    let stored = env.missions.get_mission(b).unwrap();
    assert_eq!(stored.date_start, Some(d(2026, 1, 12)));
}

#[test]
fn test_任务不与自身冲突() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];
    let a = env
        .production_with_carts("A", d(2026, 1, 5), d(2026, 1, 18), &[cart])
        .id;

    let line = env.missions.list_requirements(a).unwrap().remove(0);
    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![cart])
        .expect("重新写入自身小车不应冲突");
    env.missions.validate_assignment(ACTOR, a, false).unwrap();

    let mut edit = env.missions.get_mission(a).unwrap();
    edit.date_end = Some(d(2026, 1, 25));
    env.missions.update_mission(ACTOR, edit).expect("延长自身日期不应冲突");

    let report = env.missions.check_assignment(a).unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_售前与已取消任务不占用资源() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];

    // 售前任务先分配同一台小车
    let p = env.create_presale("P", d(2026, 1, 5), d(2026, 1, 18));
    let line = env
        .missions
        .add_requirement(ACTOR, p.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;
    env.missions.set_assigned_carts(ACTOR, line.id, vec![cart]).unwrap();

    // 生产任务照常分配并通过校验
    let a = measuring(&env, "A", (1, 5), (1, 18), &[cart]);

    // A 取消后, 同窗口的新任务可以使用该小车
    env.missions.cancel(ACTOR, a).unwrap();
    measuring(&env, "C", (1, 5), (1, 18), &[cart]);
}

#[test]
fn test_软失败需要确认_确认后转入紧急() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];

    // B 在售前阶段先拿到小车 (售前不校验)
    let b = env.create_presale("B", d(2026, 1, 12), d(2026, 1, 25));
    let line = env
        .missions
        .add_requirement(ACTOR, b.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;
    env.missions.set_assigned_carts(ACTOR, line.id, vec![cart]).unwrap();

    // A 进入测量, 占用 1/5 ~ 1/18
    let a = measuring(&env, "A", (1, 5), (1, 18), &[cart]);
    let a_ref = env.missions.get_mission(a).unwrap().reference;

    // B 报价确认后进入生产
    env.confirm(b.id);
    env.missions.advance(ACTOR, b.id).unwrap();

    let outcome = env.missions.validate_assignment(ACTOR, b.id, false).unwrap();
    let soft = match outcome.value {
        AssignmentOutcome::ConfirmationRequired(soft) => soft,
        other => panic!("unexpected: {:?}", other),
    };
    assert_eq!(soft.len(), 1);
    match &soft[0] {
        SoftFailure::CartCalendarConflict { cart_id, conflicts, .. } => {
            assert_eq!(*cart_id, cart);
            assert_eq!(conflicts[0].reference, a_ref);
        }
        other => panic!("unexpected: {:?}", other),
    }
    // 未确认时状态不变
    assert_eq!(
        env.missions.get_mission(b.id).unwrap().state,
        MissionState::Production(ProductionStep::MaterialCheck)
    );

    let outcome = env.missions.validate_assignment(ACTOR, b.id, true).unwrap();
    assert!(matches!(outcome.value, AssignmentOutcome::Urgency(_)));
    assert!(outcome.has_notice("lifecycle.urgency_confirmed"));
    assert_eq!(
        env.missions.get_mission(b.id).unwrap().state,
        MissionState::Production(ProductionStep::Urgency)
    );

    let logs = env.missions.action_logs(b.id).unwrap();
    let urgency = logs
        .iter()
        .find(|l| l.action_type == "UrgencyOverride")
        .expect("缺少紧急放行审计日志");
    assert_eq!(urgency.actor, ACTOR);

    // 紧急子状态下允许写入冲突资源, 之后可继续推进
    env.missions
        .set_assigned_carts(ACTOR, line.id, vec![cart])
        .expect("紧急状态写入冲突小车应被允许");
    assert_eq!(
        env.missions.advance(ACTOR, b.id).unwrap().value,
        MissionState::Production(ProductionStep::CartsAssigned)
    );
    assert_eq!(
        env.missions.advance(ACTOR, b.id).unwrap().value,
        MissionState::Measure(MeasureStep::Waiting)
    );
}

#[test]
fn test_小车物理状态为软失败() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[2];
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &[cart]);
    env.catalog
        .set_cart_condition(ACTOR, cart, CartCondition::Maintenance)
        .unwrap();

    let outcome = env.missions.validate_assignment(ACTOR, m.id, false).unwrap();
    match outcome.value {
        AssignmentOutcome::ConfirmationRequired(soft) => {
            assert!(matches!(
                soft[0],
                SoftFailure::CartNotOperable { condition: CartCondition::Maintenance, .. }
            ));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_分配小车校验类型与数量() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let line = env
        .missions
        .add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 1)
        .unwrap()
        .value;

    // 超出需求数量
    let err = env
        .missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[0], env.seed.carts[1]])
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 重复 ID 去重后只算一台
    let line = env
        .missions
        .set_assigned_carts(ACTOR, line.id, vec![env.seed.carts[0], env.seed.carts[0]])
        .unwrap()
        .value;
    assert_eq!(line.assigned_cart_ids, vec![env.seed.carts[0]]);

    // 同一类型不能有第二条需求行
    let err = env
        .missions
        .add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 2)
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    // 数量必须 >= 1
    assert!(matches!(
        env.missions.update_requirement_quantity(ACTOR, line.id, 0),
        Err(ApiError::ValidationError(_))
    ));
}

// ==========================================
// 班组
// ==========================================

#[test]
fn test_班组冲突在写入时阻断() {
    let env = TestEnv::new().unwrap();
    let (t1, t2) = (env.seed.team_1, env.seed.team_2);

    let m1 = env.create_presale("M1", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m1.id);
    env.missions.set_teams(ACTOR, m1.id, Some(t1), None).unwrap();
    let m1 = env.missions.get_mission(m1.id).unwrap();

    let m4 = env.create_presale("M4", d(2026, 1, 19), d(2026, 1, 25));
    env.confirm(m4.id);
    env.missions.set_teams(ACTOR, m4.id, Some(t1), None).expect("不重叠时可共用班组");

    // 1/10 ~ 1/12 对齐为 1/5 ~ 1/18, 与 M1 重叠
    let mut edit = env.missions.get_mission(m4.id).unwrap();
    edit.date_start = Some(d(2026, 1, 10));
    edit.date_end = Some(d(2026, 1, 12));
    let err = env.missions.update_mission(ACTOR, edit).unwrap_err();
    match err {
        ApiError::ResourceConflict(msg) => {
            assert!(msg.contains("T1"));
            assert!(msg.contains(&m1.reference));
            assert!(msg.contains("2026-01-05 ~ 2026-01-18"));
        }
        other => panic!("unexpected: {:?}", other),
    }

    // 换成 T2 后同样的日期可以保存
    let mut edit = env.missions.get_mission(m4.id).unwrap();
    edit.date_start = Some(d(2026, 1, 10));
    edit.date_end = Some(d(2026, 1, 12));
    edit.team_1_id = Some(t2);
    let saved = env.missions.update_mission(ACTOR, edit).unwrap();
    assert_eq!(saved.value.date_start, Some(d(2026, 1, 5)));
    assert!(saved.has_notice("planning.dates_snapped"));
}

#[test]
fn test_第二班组槽位同样占用() {
    let env = TestEnv::new().unwrap();
    let (t1, t2) = (env.seed.team_1, env.seed.team_2);

    let m1 = env.create_presale("M1", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(m1.id);
    env.missions.set_teams(ACTOR, m1.id, Some(t2), Some(t1)).unwrap();

    let m4 = env.create_presale("M4", d(2026, 1, 12), d(2026, 1, 18));
    env.confirm(m4.id);

    // 第一槽位 vs 第二槽位
    let err = env.missions.set_teams(ACTOR, m4.id, Some(t1), None).unwrap_err();
    assert!(matches!(err, ApiError::ResourceConflict(ref msg) if msg.contains("T1")));
    // 第二槽位 vs 第二槽位
    let err = env.missions.set_teams(ACTOR, m4.id, None, Some(t1)).unwrap_err();
    assert!(matches!(err, ApiError::ResourceConflict(ref msg) if msg.contains("T1")));
    // 第二槽位 vs 第一槽位
    let err = env.missions.set_teams(ACTOR, m4.id, None, Some(t2)).unwrap_err();
    assert!(matches!(err, ApiError::ResourceConflict(ref msg) if msg.contains("T2")));

    let report = env.missions.check_assignment(m1.id).unwrap();
    assert!(!report
        .soft
        .iter()
        .any(|s| matches!(s, SoftFailure::TeamCalendarConflict { .. })));
}

#[test]
fn test_两个班组槽位不能相同() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let t1 = env.seed.team_1;
    let err = env.missions.set_teams(ACTOR, m.id, Some(t1), Some(t1)).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_分配校验报告班组软冲突() {
    let env = TestEnv::new().unwrap();
    let t1 = env.seed.team_1;

    // B 售前时设置 T1
    let b = env.create_presale("B", d(2026, 1, 5), d(2026, 1, 18));
    env.missions.set_teams(ACTOR, b.id, Some(t1), None).unwrap();

    let a = env.create_presale("A", d(2026, 1, 5), d(2026, 1, 18));
    env.confirm(a.id);
    env.missions.set_teams(ACTOR, a.id, Some(t1), None).unwrap();

    env.confirm(b.id);
    let report = env.missions.check_assignment(b.id).unwrap();
    assert!(report
        .soft
        .iter()
        .any(|s| matches!(s, SoftFailure::TeamCalendarConflict { team_id, .. } if *team_id == t1)));
    // 没有需求行: 同时存在硬失败
    assert!(report.has_hard());
}

// ==========================================
// 可用性展示
// ==========================================

#[test]
fn test_下拉标签与可用小车() {
    let env = TestEnv::new().unwrap();
    let carts = env.seed.carts.clone();
    let a = measuring(&env, "A", (1, 5), (1, 18), &carts[..1]);
    env.missions.set_teams(ACTOR, a, Some(env.seed.team_1), None).unwrap();
    let a_label = env.missions.get_mission(a).unwrap().label().to_string();
    env.catalog
        .set_cart_condition(ACTOR, carts[2], CartCondition::OutOfService)
        .unwrap();

    let b = env.create_presale("B", d(2026, 1, 12), d(2026, 1, 18));
    let options = env.missions.cart_options(b.id, env.seed.lynx_type_id).unwrap();
    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["⚠️ LYNX1 (Déjà réservé)", "🟢 LYNX2", "🔴 LYNX3 (Hors service)"]
    );

    let teams = env.missions.team_options(b.id).unwrap();
    let t1 = teams.iter().find(|t| t.team_id == env.seed.team_1).unwrap();
    assert_eq!(t1.label, format!("⚠️ T1 <Occupée : {}>", a_label));
    let t2 = teams.iter().find(|t| t.team_id == env.seed.team_2).unwrap();
    assert_eq!(t2.label, "🟢 T2 (RCE : Bernard)");

    let free = env.missions.available_carts(b.id, env.seed.lynx_type_id).unwrap();
    let ids: Vec<i64> = free.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![carts[1]]);

    // 从 A 自身的视角, LYNX1 不显示为已占用
    let own = env.missions.cart_options(a, env.seed.lynx_type_id).unwrap();
    assert_eq!(own[0].label, "🟢 LYNX1");
}
