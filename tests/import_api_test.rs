// ==========================================
// ImportApi 集成测试
// ==========================================
// 覆盖: 测量文件匹配与归档 (唯一/多个/无匹配/缺周) + 范围行整体替换 + 目标点
// 文件解析与表格读取使用测试桩
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use rail_measurement::api::{ApiError, ImportApi};
use rail_measurement::domain::scope::{ConsistencyLine, PlatformLine, TargetLine};
use rail_measurement::engine::error::{EngineError, EngineResult};
use rail_measurement::engine::file_attach::{MeasurementFileHeader, MeasurementFileParser};
use rail_measurement::engine::scope_import::{ScopeSheet, ScopeSheetReader};
use std::sync::Arc;
use test_helpers::{d, TestEnv, ACTOR};

// ==========================================
// 测试桩
// ==========================================

/// 总是返回同一个文件头; 空内容视为解析失败
struct StubParser {
    header: MeasurementFileHeader,
}

impl MeasurementFileParser for StubParser {
    fn parse(&self, _file_name: &str, content: &[u8]) -> EngineResult<MeasurementFileHeader> {
        if content.is_empty() {
            return Err(EngineError::ParseError("文件为空".to_string()));
        }
        Ok(self.header.clone())
    }
}

struct StubSheet {
    sheet: ScopeSheet,
}

impl ScopeSheetReader for StubSheet {
    fn read(&self, _content: &[u8]) -> EngineResult<ScopeSheet> {
        Ok(self.sheet.clone())
    }
}

fn header(date: NaiveDate) -> MeasurementFileHeader {
    MeasurementFileHeader {
        line: "650000".to_string(),
        date,
        track: "1".to_string(),
        cart_serial: "LX-001".to_string(),
        pk: 12.0,
        first_pk: 11.5,
        last_pk: 14.25,
        file_name: String::new(),
        content: Vec::new(),
    }
}

fn import_with(env: &TestEnv, date: NaiveDate) -> ImportApi {
    env.import_api()
        .with_file_parser(Arc::new(StubParser { header: header(date) }))
}

fn consistency(pk_start: f64, pk_end: f64) -> ConsistencyLine {
    ConsistencyLine {
        id: 0,
        mission_id: 0,
        track: Some("V1".to_string()),
        pk_start,
        pk_end,
        description: None,
    }
}

fn platform(station: &str, length_m: f64) -> PlatformLine {
    PlatformLine {
        id: 0,
        mission_id: 0,
        station: station.to_string(),
        platform: Some("Quai 1".to_string()),
        track: Some("V1".to_string()),
        pk_start: None,
        pk_end: None,
        length_m: Some(length_m),
    }
}

// ==========================================
// 测量文件归档
// ==========================================

#[test]
fn test_唯一匹配时直接归档() {
    let env = TestEnv::new().expect("环境初始化失败");
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &env.seed.carts[..1]);
    let import = import_with(&env, d(2026, 1, 7));

    let outcome = import
        .attach_file(ACTOR, "relevé_0107.lx", b"HEADER")
        .expect("归档失败");
    let receipt = outcome.value;
    assert_eq!(receipt.mission_id, m.id);
    assert_eq!(receipt.week_label, "S02 (2026)");
    assert_eq!(receipt.day, "wed");
    assert!(outcome.notices.iter().any(|n| n.key == "import.attached"));

    let files = env.missions.list_day_files(receipt.planning_id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "relevé_0107.lx");
    assert_eq!(files[0].content, b"HEADER".to_vec());
    assert_eq!(files[0].first_pk, Some(11.5));

    // 实测进度写回任务
    let stored = env.missions.get_mission(m.id).unwrap();
    assert_eq!(stored.progress_start, Some(11.5));
    assert_eq!(stored.progress_end, Some(14.25));
    let figures = env.missions.figures(m.id).unwrap();
    assert!((figures.progress_pct.unwrap() - 22.0).abs() < 1e-9);

    let logs = env.missions.action_logs(m.id).unwrap();
    assert!(logs.iter().any(|l| l.action_type == "AttachFile"));
}

#[test]
fn test_预分析不写库() {
    let env = TestEnv::new().unwrap();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &env.seed.carts[..1]);
    let import = import_with(&env, d(2026, 1, 7));

    let analysis = import.analyze_file("a.lx", b"HEADER").unwrap();
    assert_eq!(analysis.header.line, "L650000");
    assert_eq!(analysis.header.track, "V1");
    assert_eq!(analysis.candidates.len(), 1);
    assert_eq!(analysis.candidates[0].mission_id, m.id);

    let planning = env.missions.list_planning(m.id).unwrap();
    assert!(planning
        .iter()
        .all(|w| env.missions.list_day_files(w.id).unwrap().is_empty()));
}

#[test]
fn test_多个匹配返回候选_选择后归档() {
    let env = TestEnv::new().unwrap();
    let cart = env.seed.carts[0];
    // 两个售前任务使用同一台小车与相同范围
    let mut ids = Vec::new();
    for name in ["A", "B"] {
        let m = env.create_presale(name, d(2026, 1, 5), d(2026, 1, 18));
        let line = env
            .missions
            .add_requirement(ACTOR, m.id, env.seed.lynx_type_id, 1)
            .unwrap()
            .value;
        env.missions.set_assigned_carts(ACTOR, line.id, vec![cart]).unwrap();
        ids.push(m.id);
    }
    let import = import_with(&env, d(2026, 1, 13));

    let err = import.attach_file(ACTOR, "x.lx", b"HEADER").unwrap_err();
    let candidates = match err {
        ApiError::MultipleMatches(candidates) => candidates,
        other => panic!("unexpected: {:?}", other),
    };
    let got: Vec<i64> = candidates.iter().map(|c| c.mission_id).collect();
    assert_eq!(got, ids);

    let analysis = import.analyze_file("x.lx", b"HEADER").unwrap();
    let receipt = import
        .attach_to(ACTOR, ids[1], analysis.header)
        .expect("选择后归档失败")
        .value;
    assert_eq!(receipt.mission_id, ids[1]);
    assert_eq!(receipt.week_label, "S03 (2026)");
    assert_eq!(receipt.day, "tue");
}

#[test]
fn test_无匹配返回描述性错误() {
    let env = TestEnv::new().unwrap();
    let m = env.production_with_carts("M", d(2026, 1, 5), d(2026, 1, 18), &env.seed.carts[..1]);

    // 日期在任务范围之外
    let err = import_with(&env, d(2026, 2, 4))
        .attach_file(ACTOR, "x.lx", b"HEADER")
        .unwrap_err();
    match err {
        ApiError::ImportError(msg) => {
            assert!(msg.contains("L650000"));
            assert!(msg.contains("2026-02-04"));
            assert!(msg.contains("LX-001"));
        }
        other => panic!("unexpected: {:?}", other),
    }

    // 已取消的任务不参与匹配
    env.missions.cancel(ACTOR, m.id).unwrap();
    let err = import_with(&env, d(2026, 1, 7))
        .attach_file(ACTOR, "x.lx", b"HEADER")
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportError(_)));
}

#[test]
fn test_目标日期没有周计划() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let import = env.import_api();

    let err = import
        .attach_to(ACTOR, m.id, header(d(2026, 3, 4)))
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportError(ref msg) if msg.contains("周计划")));
    assert_eq!(env.missions.get_mission(m.id).unwrap().progress_start, None);
}

#[test]
fn test_未配置解析器或解析失败() {
    let env = TestEnv::new().unwrap();
    let err = env.import_api().attach_file(ACTOR, "x.lx", b"HEADER").unwrap_err();
    assert!(matches!(err, ApiError::InternalError(_)));

    let err = import_with(&env, d(2026, 1, 7))
        .attach_file(ACTOR, "x.lx", b"")
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportError(_)));
}

// ==========================================
// 范围行
// ==========================================

#[test]
fn test_范围行整体替换() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let import = env.import_api();

    let sheet = ScopeSheet {
        consistency: vec![consistency(10.0, 12.5), consistency(15.0, 14.0)],
        platforms: vec![platform("Gare A", 220.0)],
    };
    let summary = import.replace_scope_lines(ACTOR, m.id, sheet).unwrap().value;
    assert_eq!(summary.consistency_count, 2);
    assert!((summary.consistency_km - 3.5).abs() < 1e-9);
    assert_eq!(summary.platform_count, 1);
    assert!((summary.platform_m - 220.0).abs() < 1e-9);

    // 再次导入只保留新内容
    let sheet = ScopeSheet {
        consistency: vec![consistency(1.0, 2.0)],
        platforms: vec![],
    };
    let summary = import.replace_scope_lines(ACTOR, m.id, sheet).unwrap().value;
    assert_eq!(summary.consistency_count, 1);
    assert_eq!(summary.platform_count, 0);
    assert_eq!(import.list_consistency(m.id).unwrap().len(), 1);
    assert!(import.list_platforms(m.id).unwrap().is_empty());

    let logs = env.missions.action_logs(m.id).unwrap();
    assert_eq!(logs.iter().filter(|l| l.action_type == "ReplaceScope").count(), 2);
}

#[test]
fn test_非法范围行整体回滚() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let import = env.import_api();
    import
        .replace_scope_lines(
            ACTOR,
            m.id,
            ScopeSheet {
                consistency: vec![consistency(10.0, 12.5)],
                platforms: vec![platform("Gare A", 220.0)],
            },
        )
        .unwrap();

    let err = import
        .replace_scope_lines(
            ACTOR,
            m.id,
            ScopeSheet {
                consistency: vec![consistency(1.0, 2.0), consistency(-1.0, 2.0)],
                platforms: vec![],
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let summary = import.scope_summary(m.id).unwrap();
    assert_eq!(summary.consistency_count, 1);
    assert_eq!(summary.platform_count, 1);
}

#[test]
fn test_通过表格读取器导入() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let import = env.import_api().with_sheet_reader(Arc::new(StubSheet {
        sheet: ScopeSheet {
            consistency: vec![consistency(0.0, 4.0)],
            platforms: vec![platform("Gare B", 180.0), platform("Gare C", 95.5)],
        },
    }));

    let summary = import.import_scope_sheet(ACTOR, m.id, b"xlsx").unwrap().value;
    assert_eq!(summary.consistency_count, 1);
    assert_eq!(summary.platform_count, 2);
    assert!((summary.platform_m - 275.5).abs() < 1e-9);

    // 未配置读取器
    let err = env.import_api().import_scope_sheet(ACTOR, m.id, b"xlsx").unwrap_err();
    assert!(matches!(err, ApiError::InternalError(_)));
}

#[test]
fn test_目标点增删改() {
    let env = TestEnv::new().unwrap();
    let m = env.create_presale("M", d(2026, 1, 5), d(2026, 1, 18));
    let import = env.import_api();

    let target = TargetLine {
        id: 0,
        mission_id: 0,
        label: "PN 12".to_string(),
        pk: Some(11.2),
        kind: Some("PN".to_string()),
    };
    let mut created = import.add_target(ACTOR, m.id, target).unwrap().value;
    assert!(created.id > 0);
    assert_eq!(created.mission_id, m.id);

    created.label = "PN 12 bis".to_string();
    import.update_target(ACTOR, created.clone()).unwrap();
    let targets = import.list_targets(m.id).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].label, "PN 12 bis");
    assert_eq!(import.scope_summary(m.id).unwrap().target_count, 1);

    // 名称不能为空
    let mut blank = created.clone();
    blank.label = " ".to_string();
    assert!(matches!(
        import.update_target(ACTOR, blank),
        Err(ApiError::ValidationError(_))
    ));

    import.remove_target(ACTOR, m.id, created.id).unwrap();
    assert!(import.list_targets(m.id).unwrap().is_empty());
}
