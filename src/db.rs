// ==========================================
// 轨道测量任务管理 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键级联删除依赖 foreign_keys)
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 提供幂等建库脚本 (任务聚合根及其子表全部 ON DELETE CASCADE)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本
///
/// 说明:
/// - 日期统一存储为 `YYYY-MM-DD` 文本, 字典序即时间序
/// - 任务状态拆为 state + sub_state 两列, 由领域层保证组合合法
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS sequence (
    code TEXT PRIMARY KEY,
    next_value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS employee (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS rail_line (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    nickname TEXT NOT NULL UNIQUE,
    gauge TEXT NOT NULL DEFAULT 'NORMAL',
    station_start TEXT,
    station_end TEXT,
    length_km REAL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS accounting_period (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    date_start TEXT NOT NULL,
    date_end TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS affair_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    description TEXT,
    requires_nature INTEGER NOT NULL DEFAULT 0,
    sequence INTEGER NOT NULL DEFAULT 10,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS track_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS cart_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    manufacturer TEXT,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS cart (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    serial_number TEXT NOT NULL UNIQUE,
    cart_type_id INTEGER NOT NULL REFERENCES cart_type(id) ON DELETE RESTRICT,
    condition TEXT NOT NULL DEFAULT 'AVAILABLE',
    notes TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS field_team (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    leader_id INTEGER NOT NULL REFERENCES employee(id),
    color TEXT NOT NULL DEFAULT '#875A7B',
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS field_team_member (
    team_id INTEGER NOT NULL REFERENCES field_team(id) ON DELETE CASCADE,
    employee_id INTEGER NOT NULL REFERENCES employee(id),
    PRIMARY KEY (team_id, employee_id)
);

CREATE TABLE IF NOT EXISTS quotation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    partner_id INTEGER NOT NULL,
    state TEXT NOT NULL DEFAULT 'DRAFT'
);

CREATE TABLE IF NOT EXISTS quotation_line (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quotation_id INTEGER NOT NULL REFERENCES quotation(id) ON DELETE CASCADE,
    product_name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    quantity REAL NOT NULL DEFAULT 0,
    price_unit REAL NOT NULL DEFAULT 0,
    mission_id INTEGER REFERENCES mission(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS mission (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    code TEXT,
    last_synced_code TEXT,
    nature TEXT,
    period_id INTEGER REFERENCES accounting_period(id),
    line_id INTEGER REFERENCES rail_line(id),
    affair_type_id INTEGER REFERENCES affair_type(id),
    partner_id INTEGER NOT NULL,
    quotation_line_id INTEGER REFERENCES quotation_line(id) ON DELETE SET NULL,
    date_start TEXT,
    date_end TEXT,
    pk_initial REAL NOT NULL DEFAULT 0,
    pk_final REAL NOT NULL DEFAULT 0,
    progress_start REAL,
    progress_end REAL,
    team_1_id INTEGER REFERENCES field_team(id),
    team_2_id INTEGER REFERENCES field_team(id),
    state TEXT NOT NULL DEFAULT 'PRESALE',
    sub_state TEXT,
    price_unit REAL NOT NULL DEFAULT 0,
    daily_rate REAL NOT NULL DEFAULT 0,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- 业务编码大小写不敏感唯一 (NULL 不参与)
DROP INDEX IF EXISTS idx_mission_code;
CREATE UNIQUE INDEX IF NOT EXISTS idx_mission_code_unique ON mission(UPPER(code));
CREATE INDEX IF NOT EXISTS idx_mission_window ON mission(date_start, date_end);
CREATE INDEX IF NOT EXISTS idx_mission_partner ON mission(partner_id);

CREATE TABLE IF NOT EXISTS mission_track_type (
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    track_type_id INTEGER NOT NULL REFERENCES track_type(id),
    PRIMARY KEY (mission_id, track_type_id)
);

CREATE TABLE IF NOT EXISTS cart_type_line (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    cart_type_id INTEGER NOT NULL REFERENCES cart_type(id),
    quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
    UNIQUE (mission_id, cart_type_id)
);

CREATE TABLE IF NOT EXISTS cart_type_line_cart (
    line_id INTEGER NOT NULL REFERENCES cart_type_line(id) ON DELETE CASCADE,
    cart_id INTEGER NOT NULL REFERENCES cart(id),
    PRIMARY KEY (line_id, cart_id)
);

CREATE INDEX IF NOT EXISTS idx_line_cart_cart ON cart_type_line_cart(cart_id);

CREATE TABLE IF NOT EXISTS weekly_planning (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    iso_year INTEGER NOT NULL,
    iso_week INTEGER NOT NULL,
    week_start TEXT NOT NULL,
    week_end TEXT NOT NULL,
    mon TEXT NOT NULL DEFAULT 'EMPTY',
    tue TEXT NOT NULL DEFAULT 'EMPTY',
    wed TEXT NOT NULL DEFAULT 'EMPTY',
    thu TEXT NOT NULL DEFAULT 'EMPTY',
    fri TEXT NOT NULL DEFAULT 'EMPTY',
    sat TEXT NOT NULL DEFAULT 'EMPTY',
    sun TEXT NOT NULL DEFAULT 'EMPTY',
    UNIQUE (mission_id, iso_year, iso_week)
);

CREATE TABLE IF NOT EXISTS day_file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    planning_id INTEGER NOT NULL REFERENCES weekly_planning(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content BLOB,
    first_pk REAL,
    last_pk REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS scope_consistency (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    track TEXT,
    pk_start REAL NOT NULL,
    pk_end REAL NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS scope_target (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    pk REAL,
    kind TEXT
);

CREATE TABLE IF NOT EXISTS scope_platform (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES mission(id) ON DELETE CASCADE,
    station TEXT NOT NULL,
    platform TEXT,
    track TEXT,
    pk_start REAL,
    pk_end REAL,
    length_m REAL
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    mission_id INTEGER,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_mission ON action_log(mission_id);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启 (级联删除依赖它)
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表 (测试/演示使用)
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 幂等建库, 并写入当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
