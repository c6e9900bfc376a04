// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库 + 基础目录数据 + 常用任务构造
// 约定: "今日" 固定为 2026-01-01, 所有测试日期落在 2026 年 1 月
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use rail_measurement::api::{CatalogApi, ImportApi, MissionApi, PortalApi, Store};
use rail_measurement::config::ConfigManager;
use rail_measurement::domain::catalog::{AccountingPeriod, AffairType, Cart, CartType, RailLine};
use rail_measurement::domain::mission::Mission;
use rail_measurement::domain::team::FieldTeam;
use rail_measurement::domain::types::{MissionState, ProductionStep, QuotationState};
use rail_measurement::db;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const ACTOR: &str = "test_user";

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

// ==========================================
// 基础目录
// ==========================================
#[derive(Debug, Clone)]
pub struct Seed {
    pub line_id: i64,        // L650000 / 650
    pub period_id: i64,      // C (2026)
    pub type_p_id: i64,      // P: 不需要性质
    pub type_ins_id: i64,    // INS: 需要性质
    pub track_v1_id: i64,    // V1
    pub lynx_type_id: i64,   // LYNX
    pub carts: Vec<i64>,     // LX-001, LX-002, LX-003
    pub leaders: Vec<i64>,
    pub team_1: i64,         // T1
    pub team_2: i64,         // T2
    pub partner_id: i64,
}

// ==========================================
// TestEnv - API 层测试环境
// ==========================================
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,
    pub config: Arc<ConfigManager>,
    pub missions: MissionApi,
    pub catalog: CatalogApi,
    pub seed: Seed,
}

impl TestEnv {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        rail_measurement::logging::init_test();

        let (temp_file, db_path) = create_test_db()?;
        let conn = Arc::new(Mutex::new(db::open_sqlite_connection(&db_path)?));
        let config = Arc::new(ConfigManager::from_connection(Arc::clone(&conn))?);
        let store = Store::new(Arc::clone(&conn), Arc::clone(&config)).with_today(d(2026, 1, 1));

        let missions = MissionApi::with_store(store.clone());
        let catalog = CatalogApi::with_store(store);
        let seed = seed_catalog(&catalog)?;

        Ok(Self {
            _temp_file: temp_file,
            conn,
            config,
            missions,
            catalog,
            seed,
        })
    }

    pub fn store(&self) -> Store {
        self.missions.store().clone()
    }

    pub fn import_api(&self) -> ImportApi {
        ImportApi::with_store(self.store())
    }

    pub fn portal_api(&self) -> PortalApi {
        PortalApi::new(MissionApi::with_store(self.store()))
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.config
            .set_global_config_value(key, value)
            .expect("写入配置失败");
    }

    // ==========================================
    // 任务构造
    // ==========================================

    /// 售前任务草稿: 线路 650 / 期间 C / 类型 P / 股道 V1
    pub fn draft(&self, name: &str, start: NaiveDate, end: NaiveDate) -> Mission {
        let mut m = Mission::new(String::new(), self.seed.partner_id);
        m.name = name.to_string();
        m.line_id = Some(self.seed.line_id);
        m.period_id = Some(self.seed.period_id);
        m.affair_type_id = Some(self.seed.type_p_id);
        m.track_type_ids = vec![self.seed.track_v1_id];
        m.date_start = Some(start);
        m.date_end = Some(end);
        m.pk_initial = 10.0;
        m.pk_final = 22.5;
        m.price_unit = 100.0;
        m.daily_rate = 500.0;
        m
    }

    pub fn create_presale(&self, name: &str, start: NaiveDate, end: NaiveDate) -> Mission {
        self.missions
            .create_mission(ACTOR, self.draft(name, start, end))
            .expect("创建任务失败")
            .value
    }

    /// 为任务新建报价单 + 报价行并关联 (报价单为草稿)
    pub fn attach_quotation(&self, mission_id: i64) -> (i64, i64) {
        let quotation = self
            .missions
            .create_quotation(ACTOR, self.seed.partner_id, "Devis")
            .expect("创建报价单失败")
            .value;
        let line = self
            .missions
            .add_quotation_line(ACTOR, quotation.id, "Relevé géométrique", 100.0)
            .expect("创建报价行失败")
            .value;
        self.missions
            .link_quotation_line(ACTOR, mission_id, line.id)
            .expect("关联报价行失败");
        (quotation.id, line.id)
    }

    /// 确认报价单, 任务进入 Production(MissionReceived)
    pub fn confirm(&self, mission_id: i64) -> i64 {
        let (quotation_id, _) = self.attach_quotation(mission_id);
        self.missions
            .set_quotation_state(ACTOR, quotation_id, QuotationState::Confirmed)
            .expect("确认报价单失败");
        let m = self.missions.get_mission(mission_id).unwrap();
        assert_eq!(m.state, MissionState::Production(ProductionStep::MissionReceived));
        quotation_id
    }

    /// 生产中的任务, 需求行 LYNX x carts.len(), 已分配给定小车, 处于物资检查
    pub fn production_with_carts(&self, name: &str, start: NaiveDate, end: NaiveDate, carts: &[i64]) -> Mission {
        let m = self.create_presale(name, start, end);
        self.confirm(m.id);
        let line = self
            .missions
            .add_requirement(ACTOR, m.id, self.seed.lynx_type_id, carts.len() as i32)
            .expect("新增需求行失败")
            .value;
        self.missions
            .set_assigned_carts(ACTOR, line.id, carts.to_vec())
            .expect("分配小车失败");
        self.missions.advance(ACTOR, m.id).expect("进入物资检查失败");
        self.missions.get_mission(m.id).unwrap()
    }
}

/// 通过目录 API 写入基础数据
fn seed_catalog(catalog: &CatalogApi) -> Result<Seed, Box<dyn Error>> {
    let line = catalog
        .create_line(ACTOR, RailLine::new("L650000", "650"))?
        .value;
    let period = catalog
        .create_period(
            ACTOR,
            AccountingPeriod {
                id: 0,
                code: "C".to_string(),
                date_start: d(2026, 1, 1),
                date_end: d(2026, 12, 31),
                active: true,
            },
        )?
        .value;
    let type_p = catalog
        .create_affair_type(ACTOR, AffairType::new("Projet", "P", false))?
        .value;
    let type_ins = catalog
        .create_affair_type(ACTOR, AffairType::new("Inspection", "INS", true))?
        .value;
    let track = catalog.create_track_type(ACTOR, "V1")?.value;
    let lynx = catalog
        .create_cart_type(
            ACTOR,
            CartType {
                id: 0,
                name: "LYNX".to_string(),
                manufacturer: None,
                notes: None,
            },
        )?
        .value;

    let mut carts = Vec::new();
    for (name, serial) in [("LYNX1", "LX-001"), ("LYNX2", "LX-002"), ("LYNX3", "LX-003")] {
        carts.push(catalog.create_cart(ACTOR, Cart::new(name, serial, lynx.id))?.value.id);
    }

    let mut employees = Vec::new();
    for name in ["Dupont", "Martin", "Bernard", "Petit"] {
        employees.push(catalog.create_employee(ACTOR, name)?.value.id);
    }
    let team_1 = catalog
        .create_team(ACTOR, FieldTeam::new("T1", employees[0], vec![employees[1]]))?
        .value
        .id;
    let team_2 = catalog
        .create_team(ACTOR, FieldTeam::new("T2", employees[2], vec![employees[3]]))?
        .value
        .id;

    Ok(Seed {
        line_id: line.id,
        period_id: period.id,
        type_p_id: type_p.id,
        type_ins_id: type_ins.id,
        track_v1_id: track.id,
        lynx_type_id: lynx.id,
        carts,
        leaders: vec![employees[0], employees[2]],
        team_1,
        team_2,
        partner_id: 1,
    })
}
