// ==========================================
// 轨道测量任务管理 - 目录数据仓储
// ==========================================
// 职责: 线路 / 会计期间 / 业务类型 / 股道类型 / 小车类型 / 员工
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::catalog::{AccountingPeriod, AffairType, CartType, Employee, RailLine, TrackType};
use crate::domain::types::TrackGauge;
use crate::repository::convert::{bool_to_int, fmt_date, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

// ==========================================
// CatalogRepository - 目录仓储
// ==========================================
/// 借用事务连接, 与同一请求内的其他仓储共享事务
pub struct CatalogRepository<'a> {
    conn: &'a Connection,
}

fn map_line(row: &Row) -> SqliteResult<RailLine> {
    Ok(RailLine {
        id: row.get(0)?,
        name: row.get(1)?,
        nickname: row.get(2)?,
        gauge: TrackGauge::from_str(&row.get::<_, String>(3)?),
        station_start: row.get(4)?,
        station_end: row.get(5)?,
        length_km: row.get(6)?,
        active: row.get::<_, i32>(7)? != 0,
    })
}

fn map_period(row: &Row) -> SqliteResult<AccountingPeriod> {
    Ok(AccountingPeriod {
        id: row.get(0)?,
        code: row.get(1)?,
        date_start: parse_date(2, &row.get::<_, String>(2)?)?,
        date_end: parse_date(3, &row.get::<_, String>(3)?)?,
        active: row.get::<_, i32>(4)? != 0,
    })
}

fn map_affair_type(row: &Row) -> SqliteResult<AffairType> {
    Ok(AffairType {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        requires_nature: row.get::<_, i32>(4)? != 0,
        sequence: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
    })
}

const LINE_COLUMNS: &str =
    "id, name, nickname, gauge, station_start, station_end, length_km, active";
const PERIOD_COLUMNS: &str = "id, code, date_start, date_end, active";
const AFFAIR_TYPE_COLUMNS: &str =
    "id, name, code, description, requires_nature, sequence, active";

impl<'a> CatalogRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 线路
    // ==========================================

    /// 新增线路, 返回 id
    pub fn insert_line(&self, line: &RailLine) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO rail_line (name, nickname, gauge, station_start, station_end, length_km, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                line.name,
                line.nickname,
                line.gauge.as_str(),
                line.station_start,
                line.station_end,
                line.length_km,
                bool_to_int(line.active),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_line(&self, line: &RailLine) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE rail_line SET name = ?1, nickname = ?2, gauge = ?3, station_start = ?4,
                station_end = ?5, length_km = ?6, active = ?7
            WHERE id = ?8
            "#,
            params![
                line.name,
                line.nickname,
                line.gauge.as_str(),
                line.station_start,
                line.station_end,
                line.length_km,
                bool_to_int(line.active),
                line.id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("RailLine", line.id));
        }
        Ok(())
    }

    pub fn find_line(&self, id: i64) -> RepositoryResult<Option<RailLine>> {
        let sql = format!("SELECT {} FROM rail_line WHERE id = ?1", LINE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], map_line).optional()?)
    }

    pub fn get_line(&self, id: i64) -> RepositoryResult<RailLine> {
        self.find_line(id)?
            .ok_or_else(|| RepositoryError::not_found("RailLine", id))
    }

    pub fn find_line_by_name(&self, name: &str) -> RepositoryResult<Option<RailLine>> {
        let sql = format!("SELECT {} FROM rail_line WHERE name = ?1", LINE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![name], map_line).optional()?)
    }

    /// 查询所有线路 (编码解析时按简称前缀匹配)
    pub fn list_lines(&self) -> RepositoryResult<Vec<RailLine>> {
        let sql = format!("SELECT {} FROM rail_line ORDER BY name", LINE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let lines = stmt
            .query_map([], map_line)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    // ==========================================
    // 会计期间
    // ==========================================

    pub fn insert_period(&self, period: &AccountingPeriod) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO accounting_period (code, date_start, date_end, active) VALUES (?1, ?2, ?3, ?4)",
            params![
                period.code,
                fmt_date(period.date_start),
                fmt_date(period.date_end),
                bool_to_int(period.active),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_period(&self, period: &AccountingPeriod) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE accounting_period SET code = ?1, date_start = ?2, date_end = ?3, active = ?4 WHERE id = ?5",
            params![
                period.code,
                fmt_date(period.date_start),
                fmt_date(period.date_end),
                bool_to_int(period.active),
                period.id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AccountingPeriod", period.id));
        }
        Ok(())
    }

    pub fn find_period(&self, id: i64) -> RepositoryResult<Option<AccountingPeriod>> {
        let sql = format!("SELECT {} FROM accounting_period WHERE id = ?1", PERIOD_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], map_period).optional()?)
    }

    /// 按编码字母查询 (最新期间优先)
    pub fn find_period_by_code(&self, code: &str) -> RepositoryResult<Option<AccountingPeriod>> {
        let sql = format!(
            "SELECT {} FROM accounting_period WHERE code = ?1 ORDER BY date_start DESC LIMIT 1",
            PERIOD_COLUMNS
        );
        Ok(self.conn.query_row(&sql, params![code], map_period).optional()?)
    }

    pub fn list_periods(&self) -> RepositoryResult<Vec<AccountingPeriod>> {
        let sql = format!("SELECT {} FROM accounting_period ORDER BY date_start DESC", PERIOD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let periods = stmt
            .query_map([], map_period)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(periods)
    }

    // ==========================================
    // 业务类型
    // ==========================================

    pub fn insert_affair_type(&self, affair_type: &AffairType) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO affair_type (name, code, description, requires_nature, sequence, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                affair_type.name,
                affair_type.code,
                affair_type.description,
                bool_to_int(affair_type.requires_nature),
                affair_type.sequence,
                bool_to_int(affair_type.active),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_affair_type(&self, affair_type: &AffairType) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE affair_type SET name = ?1, code = ?2, description = ?3, requires_nature = ?4,
                sequence = ?5, active = ?6
            WHERE id = ?7
            "#,
            params![
                affair_type.name,
                affair_type.code,
                affair_type.description,
                bool_to_int(affair_type.requires_nature),
                affair_type.sequence,
                bool_to_int(affair_type.active),
                affair_type.id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AffairType", affair_type.id));
        }
        Ok(())
    }

    pub fn find_affair_type(&self, id: i64) -> RepositoryResult<Option<AffairType>> {
        let sql = format!("SELECT {} FROM affair_type WHERE id = ?1", AFFAIR_TYPE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], map_affair_type).optional()?)
    }

    pub fn find_affair_type_by_code(&self, code: &str) -> RepositoryResult<Option<AffairType>> {
        let sql = format!("SELECT {} FROM affair_type WHERE code = ?1", AFFAIR_TYPE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![code], map_affair_type).optional()?)
    }

    pub fn list_affair_types(&self) -> RepositoryResult<Vec<AffairType>> {
        let sql = format!(
            "SELECT {} FROM affair_type ORDER BY sequence, id",
            AFFAIR_TYPE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let types = stmt
            .query_map([], map_affair_type)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(types)
    }

    // ==========================================
    // 股道类型
    // ==========================================

    pub fn insert_track_type(&self, name: &str) -> RepositoryResult<i64> {
        self.conn
            .execute("INSERT INTO track_type (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_track_type_by_name(&self, name: &str) -> RepositoryResult<Option<TrackType>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM track_type WHERE name = ?1",
                params![name],
                |row| Ok(TrackType { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?)
    }

    pub fn list_track_types(&self) -> RepositoryResult<Vec<TrackType>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM track_type ORDER BY name")?;
        let types = stmt
            .query_map([], |row| Ok(TrackType { id: row.get(0)?, name: row.get(1)? }))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(types)
    }

    pub fn list_track_types_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<TrackType>> {
        let mut result = Vec::with_capacity(ids.len());
        let mut stmt = self.conn.prepare("SELECT id, name FROM track_type WHERE id = ?1")?;
        for id in ids {
            if let Some(t) = stmt
                .query_row(params![id], |row| Ok(TrackType { id: row.get(0)?, name: row.get(1)? }))
                .optional()?
            {
                result.push(t);
            }
        }
        Ok(result)
    }

    // ==========================================
    // 小车类型
    // ==========================================

    pub fn insert_cart_type(&self, cart_type: &CartType) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO cart_type (name, manufacturer, notes) VALUES (?1, ?2, ?3)",
            params![cart_type.name, cart_type.manufacturer, cart_type.notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_cart_type(&self, id: i64) -> RepositoryResult<Option<CartType>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, manufacturer, notes FROM cart_type WHERE id = ?1",
                params![id],
                |row| {
                    Ok(CartType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        manufacturer: row.get(2)?,
                        notes: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_cart_types(&self) -> RepositoryResult<Vec<CartType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, manufacturer, notes FROM cart_type ORDER BY name")?;
        let types = stmt
            .query_map([], |row| {
                Ok(CartType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    manufacturer: row.get(2)?,
                    notes: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(types)
    }

    // ==========================================
    // 员工
    // ==========================================

    pub fn insert_employee(&self, name: &str) -> RepositoryResult<i64> {
        self.conn
            .execute("INSERT INTO employee (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_employee(&self, id: i64) -> RepositoryResult<Option<Employee>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, active FROM employee WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Employee {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        active: row.get::<_, i32>(2)? != 0,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_employees(&self) -> RepositoryResult<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active FROM employee ORDER BY name")?;
        let employees = stmt
            .query_map([], |row| {
                Ok(Employee {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    active: row.get::<_, i32>(2)? != 0,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(employees)
    }
}
