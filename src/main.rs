// ==========================================
// 轨道测量任务管理 - 命令行入口
// ==========================================
// 职责: 初始化日志 → 打开/初始化数据库 → 输出目录与任务概况
// 用法: rail-measurement [数据库路径]
// ==========================================

use anyhow::{Context, Result};
use rail_measurement::config::{default_db_path, ConfigManager, MissionConfig};
use rail_measurement::{db, logging, CatalogApi, MissionApi};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn main() -> Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", rail_measurement::APP_NAME);
    tracing::info!("系统版本: {}", rail_measurement::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建数据目录 {}", parent.display()))?;
    }
    tracing::info!("使用数据库: {}", db_path.display());

    let path_str = db_path.to_string_lossy().to_string();
    let conn = db::open_sqlite_connection(&path_str).context("无法打开数据库")?;
    db::init_schema(&conn).context("数据库初始化失败")?;
    let version = db::read_schema_version(&conn)?;
    tracing::info!(schema_version = ?version, "数据库就绪");

    let conn = Arc::new(Mutex::new(conn));
    let config = Arc::new(
        ConfigManager::from_connection(Arc::clone(&conn))
            .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?,
    );
    let snapshot = MissionConfig::load(config.as_ref())
        .map_err(|e| anyhow::anyhow!("配置读取失败: {}", e))?;
    tracing::info!(
        week_alignment = ?snapshot.week_alignment,
        auto_start_measure = snapshot.auto_start_measure,
        locale = %snapshot.default_locale,
        "当前配置"
    );

    let catalog = CatalogApi::new(Arc::clone(&conn), Arc::clone(&config));
    let missions = MissionApi::new(Arc::clone(&conn), Arc::clone(&config));

    let lines = catalog.list_lines()?;
    let carts: usize = catalog
        .list_cart_types()?
        .iter()
        .map(|t| catalog.list_carts(t.id).map(|c| c.len()))
        .sum::<Result<usize, _>>()?;
    let teams = catalog.list_teams()?;
    let all = missions.list_missions(None)?;

    tracing::info!(lines = lines.len(), carts, teams = teams.len(), "目录概况");
    tracing::info!(missions = all.len(), "任务概况");
    for mission in all.iter().take(20) {
        tracing::info!("  {} | {} | {}", mission.reference, mission.label(), mission.state);
    }
    Ok(())
}
