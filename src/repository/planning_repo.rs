// ==========================================
// 轨道测量任务管理 - 周计划仓储
// ==========================================
// 职责: weekly_planning 行 + day_file 附件
// 红线: 按 (iso_year, iso_week) 增删, 未变更的行不得重写
// ==========================================

use crate::domain::planning::{DayFile, WeekKey, WeeklyPlanningLine};
use crate::domain::types::DaySlot;
use crate::repository::convert::{fmt_date, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct PlanningRepository<'a> {
    conn: &'a Connection,
}

const PLANNING_COLUMNS: &str =
    "id, mission_id, iso_year, iso_week, week_start, week_end, mon, tue, wed, thu, fri, sat, sun";

fn map_planning(row: &Row) -> SqliteResult<WeeklyPlanningLine> {
    let mut slots = [DaySlot::Empty; 7];
    for (i, slot) in slots.iter_mut().enumerate() {
        *slot = DaySlot::from_str(&row.get::<_, String>(6 + i)?);
    }
    Ok(WeeklyPlanningLine {
        id: row.get(0)?,
        mission_id: row.get(1)?,
        iso_year: row.get(2)?,
        iso_week: row.get(3)?,
        week_start: parse_date(4, &row.get::<_, String>(4)?)?,
        week_end: parse_date(5, &row.get::<_, String>(5)?)?,
        slots,
    })
}

impl<'a> PlanningRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 新建空周计划行 (七天全部 EMPTY)
    pub fn insert_week(
        &self,
        mission_id: i64,
        key: WeekKey,
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO weekly_planning (mission_id, iso_year, iso_week, week_start, week_end)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![mission_id, key.0, key.1, fmt_date(week_start), fmt_date(week_end)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 删除指定周 (附件级联删除), 返回删除行数
    pub fn delete_week(&self, mission_id: i64, key: WeekKey) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM weekly_planning WHERE mission_id = ?1 AND iso_year = ?2 AND iso_week = ?3",
            params![mission_id, key.0, key.1],
        )?)
    }

    pub fn update_slots(&self, planning_id: i64, slots: &[DaySlot; 7]) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE weekly_planning
            SET mon = ?1, tue = ?2, wed = ?3, thu = ?4, fri = ?5, sat = ?6, sun = ?7
            WHERE id = ?8
            "#,
            params![
                slots[0].as_str(),
                slots[1].as_str(),
                slots[2].as_str(),
                slots[3].as_str(),
                slots[4].as_str(),
                slots[5].as_str(),
                slots[6].as_str(),
                planning_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("WeeklyPlanningLine", planning_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, planning_id: i64) -> RepositoryResult<Option<WeeklyPlanningLine>> {
        let sql = format!("SELECT {} FROM weekly_planning WHERE id = ?1", PLANNING_COLUMNS);
        Ok(self.conn.query_row(&sql, params![planning_id], map_planning).optional()?)
    }

    pub fn get(&self, planning_id: i64) -> RepositoryResult<WeeklyPlanningLine> {
        self.find_by_id(planning_id)?
            .ok_or_else(|| RepositoryError::not_found("WeeklyPlanningLine", planning_id))
    }

    /// 任务全部周计划 (按周顺序)
    pub fn list_by_mission(&self, mission_id: i64) -> RepositoryResult<Vec<WeeklyPlanningLine>> {
        let sql = format!(
            "SELECT {} FROM weekly_planning WHERE mission_id = ?1 ORDER BY week_start",
            PLANNING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![mission_id], map_planning)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 包含指定日期的周计划行
    pub fn find_week_containing(
        &self,
        mission_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Option<WeeklyPlanningLine>> {
        let sql = format!(
            "SELECT {} FROM weekly_planning WHERE mission_id = ?1 AND week_start <= ?2 AND week_end >= ?2",
            PLANNING_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![mission_id, fmt_date(date)], map_planning)
            .optional()?)
    }

    // ==========================================
    // 日附件
    // ==========================================

    pub fn insert_day_file(&self, file: &DayFile) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO day_file (planning_id, day, file_name, content, first_pk, last_pk)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                file.planning_id,
                file.day,
                file.file_name,
                file.content,
                file.first_pk,
                file.last_pk,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_day_files(&self, planning_id: i64) -> RepositoryResult<Vec<DayFile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, planning_id, day, file_name, content, first_pk, last_pk
            FROM day_file WHERE planning_id = ?1 ORDER BY id
            "#,
        )?;
        let files = stmt
            .query_map(params![planning_id], |row| {
                Ok(DayFile {
                    id: row.get(0)?,
                    planning_id: row.get(1)?,
                    day: row.get(2)?,
                    file_name: row.get(3)?,
                    content: row.get::<_, Option<Vec<u8>>>(4)?.unwrap_or_default(),
                    first_pk: row.get(5)?,
                    last_pk: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(files)
    }
}
