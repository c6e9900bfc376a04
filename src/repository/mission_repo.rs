// ==========================================
// 轨道测量任务管理 - 任务数据仓储
// ==========================================
// 职责: 任务聚合根 CRUD + 占用查询 + 编码查询 + 文件匹配查询
// 红线: Repository 不含业务逻辑, 冲突判定规则由 engine::conflict 决定
// 占用窗口: 库内日期为闭区间, 查询时转换为半开区间 [start, end + 1)
// ==========================================

use crate::domain::mission::{ConflictingMission, DateWindow, Mission};
use crate::domain::types::{MissionState, Nature};
use crate::repository::convert::{fmt_date, fmt_opt_date, parse_date, parse_opt_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use tracing::debug;

/// 文件归档匹配条件 (已规范化)
#[derive(Debug, Clone)]
pub struct FileMatchQuery<'q> {
    pub line_name: &'q str,
    pub date: NaiveDate,
    pub pk: f64,
    pub cart_serial: &'q str,
    pub track: &'q str,
}

pub struct MissionRepository<'a> {
    conn: &'a Connection,
}

const MISSION_COLUMNS: &str = r#"
    id, reference, name, code, last_synced_code, nature,
    period_id, line_id, affair_type_id, partner_id, quotation_line_id,
    date_start, date_end, pk_initial, pk_final, progress_start, progress_end,
    team_1_id, team_2_id, state, sub_state, price_unit, daily_rate, notes
"#;

fn map_mission(row: &Row) -> SqliteResult<Mission> {
    let state_raw: String = row.get(19)?;
    let sub_raw: Option<String> = row.get(20)?;
    let state = MissionState::from_db(&state_raw, sub_raw.as_deref()).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            19,
            rusqlite::types::Type::Text,
            format!("非法状态组合: {}/{:?}", state_raw, sub_raw).into(),
        )
    })?;

    Ok(Mission {
        id: row.get(0)?,
        reference: row.get(1)?,
        name: row.get(2)?,
        code: row.get(3)?,
        last_synced_code: row.get(4)?,
        nature: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| s.chars().next())
            .and_then(Nature::from_letter),
        period_id: row.get(6)?,
        line_id: row.get(7)?,
        affair_type_id: row.get(8)?,
        track_type_ids: Vec::new(),
        partner_id: row.get(9)?,
        quotation_line_id: row.get(10)?,
        date_start: parse_opt_date(11, row.get(11)?)?,
        date_end: parse_opt_date(12, row.get(12)?)?,
        pk_initial: row.get(13)?,
        pk_final: row.get(14)?,
        progress_start: row.get(15)?,
        progress_end: row.get(16)?,
        team_1_id: row.get(17)?,
        team_2_id: row.get(18)?,
        state,
        price_unit: row.get(21)?,
        daily_rate: row.get(22)?,
        notes: row.get(23)?,
    })
}

fn map_occupancy(row: &Row) -> SqliteResult<ConflictingMission> {
    Ok(ConflictingMission {
        mission_id: row.get(0)?,
        reference: row.get(1)?,
        code: row.get(2)?,
        date_start: parse_date(3, &row.get::<_, String>(3)?)?,
        date_end: parse_date(4, &row.get::<_, String>(4)?)?,
    })
}

impl<'a> MissionRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 新增任务 (含股道类型), 返回 id
    pub fn insert(&self, mission: &Mission) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO mission (
                reference, name, code, last_synced_code, nature,
                period_id, line_id, affair_type_id, partner_id, quotation_line_id,
                date_start, date_end, pk_initial, pk_final, progress_start, progress_end,
                team_1_id, team_2_id, state, sub_state, price_unit, daily_rate, notes
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
            )
            "#,
            params![
                mission.reference,
                mission.name,
                mission.code,
                mission.last_synced_code,
                mission.nature.map(|n| n.to_string()),
                mission.period_id,
                mission.line_id,
                mission.affair_type_id,
                mission.partner_id,
                mission.quotation_line_id,
                fmt_opt_date(mission.date_start),
                fmt_opt_date(mission.date_end),
                mission.pk_initial,
                mission.pk_final,
                mission.progress_start,
                mission.progress_end,
                mission.team_1_id,
                mission.team_2_id,
                mission.state.primary_str(),
                mission.state.sub_str(),
                mission.price_unit,
                mission.daily_rate,
                mission.notes,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_track_types(id, &mission.track_type_ids)?;
        Ok(id)
    }

    /// 整行更新 (reference 不可变, 不参与更新)
    pub fn update(&self, mission: &Mission) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE mission SET
                name = ?1, code = ?2, last_synced_code = ?3, nature = ?4,
                period_id = ?5, line_id = ?6, affair_type_id = ?7, partner_id = ?8,
                quotation_line_id = ?9, date_start = ?10, date_end = ?11,
                pk_initial = ?12, pk_final = ?13, progress_start = ?14, progress_end = ?15,
                team_1_id = ?16, team_2_id = ?17, state = ?18, sub_state = ?19,
                price_unit = ?20, daily_rate = ?21, notes = ?22,
                updated_at = datetime('now')
            WHERE id = ?23
            "#,
            params![
                mission.name,
                mission.code,
                mission.last_synced_code,
                mission.nature.map(|n| n.to_string()),
                mission.period_id,
                mission.line_id,
                mission.affair_type_id,
                mission.partner_id,
                mission.quotation_line_id,
                fmt_opt_date(mission.date_start),
                fmt_opt_date(mission.date_end),
                mission.pk_initial,
                mission.pk_final,
                mission.progress_start,
                mission.progress_end,
                mission.team_1_id,
                mission.team_2_id,
                mission.state.primary_str(),
                mission.state.sub_str(),
                mission.price_unit,
                mission.daily_rate,
                mission.notes,
                mission.id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Mission", mission.id));
        }
        self.replace_track_types(mission.id, &mission.track_type_ids)
    }

    /// 只更新状态列
    pub fn update_state(&self, id: i64, state: MissionState) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE mission SET state = ?1, sub_state = ?2, updated_at = datetime('now') WHERE id = ?3",
            params![state.primary_str(), state.sub_str(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Mission", id));
        }
        Ok(())
    }

    /// 删除任务 (子表由外键级联删除)
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let rows = self
            .conn
            .execute("DELETE FROM mission WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Mission", id));
        }
        Ok(())
    }

    fn replace_track_types(&self, mission_id: i64, ids: &[i64]) -> RepositoryResult<()> {
        self.conn.execute(
            "DELETE FROM mission_track_type WHERE mission_id = ?1",
            params![mission_id],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO mission_track_type (mission_id, track_type_id) VALUES (?1, ?2)",
        )?;
        for track_type_id in ids {
            stmt.execute(params![mission_id, track_type_id])?;
        }
        Ok(())
    }

    // ==========================================
    // 读取操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Mission>> {
        let sql = format!("SELECT {} FROM mission WHERE id = ?1", MISSION_COLUMNS);
        let mission = self.conn.query_row(&sql, params![id], map_mission).optional()?;
        match mission {
            Some(mut m) => {
                m.track_type_ids = self.track_type_ids(m.id)?;
                Ok(Some(m))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, id: i64) -> RepositoryResult<Mission> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("Mission", id))
    }

    pub fn find_by_reference(&self, reference: &str) -> RepositoryResult<Option<Mission>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM mission WHERE reference = ?1",
                params![reference],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.find_by_id(id),
            None => Ok(None),
        }
    }

    /// 按客户查询 (门户使用)
    pub fn list_by_partner(&self, partner_id: i64) -> RepositoryResult<Vec<Mission>> {
        let sql = format!(
            "SELECT {} FROM mission WHERE partner_id = ?1 ORDER BY id DESC",
            MISSION_COLUMNS
        );
        self.collect_missions(&sql, params![partner_id])
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Mission>> {
        let sql = format!("SELECT {} FROM mission ORDER BY id", MISSION_COLUMNS);
        self.collect_missions(&sql, [])
    }

    fn collect_missions<P: rusqlite::Params>(&self, sql: &str, p: P) -> RepositoryResult<Vec<Mission>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut missions = stmt
            .query_map(p, map_mission)?
            .collect::<SqliteResult<Vec<_>>>()?;
        for m in missions.iter_mut() {
            m.track_type_ids = self.track_type_ids(m.id)?;
        }
        Ok(missions)
    }

    pub fn track_type_ids(&self, mission_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT track_type_id FROM mission_track_type WHERE mission_id = ?1 ORDER BY track_type_id",
        )?;
        let ids = stmt
            .query_map(params![mission_id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(ids)
    }

    // ==========================================
    // 占用查询 (冲突检测数据源)
    // ==========================================

    /// 查询在窗口内占用指定小车的其他任务
    ///
    /// 占用来源: 需求行已分配的小车 (cart_type_line_cart)
    /// 排除: 自身、售前、已取消、未设日期
    pub fn find_cart_occupancy(
        &self,
        cart_id: i64,
        window: &DateWindow,
        exclude_mission_id: Option<i64>,
    ) -> RepositoryResult<Vec<ConflictingMission>> {
        debug!(cart_id, start = %window.start, end = %window.end, "查询小车占用");
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT m.id, m.reference, m.code, m.date_start, m.date_end
            FROM mission m
            JOIN cart_type_line l ON l.mission_id = m.id
            JOIN cart_type_line_cart lc ON lc.line_id = l.id
            WHERE lc.cart_id = ?1
              AND m.id != ?2
              AND m.state NOT IN ('PRESALE', 'CANCELLED')
              AND m.date_start IS NOT NULL
              AND m.date_end IS NOT NULL
              AND m.date_start < ?3
              AND date(m.date_end, '+1 day') > ?4
            ORDER BY m.date_start, m.id
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    cart_id,
                    exclude_mission_id.unwrap_or(-1),
                    fmt_date(window.end),
                    fmt_date(window.start),
                ],
                map_occupancy,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询在窗口内占用指定班组的其他任务 (班组1 或 班组2)
    pub fn find_team_occupancy(
        &self,
        team_id: i64,
        window: &DateWindow,
        exclude_mission_id: Option<i64>,
    ) -> RepositoryResult<Vec<ConflictingMission>> {
        debug!(team_id, start = %window.start, end = %window.end, "查询班组占用");
        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.id, m.reference, m.code, m.date_start, m.date_end
            FROM mission m
            WHERE (m.team_1_id = ?1 OR m.team_2_id = ?1)
              AND m.id != ?2
              AND m.state NOT IN ('PRESALE', 'CANCELLED')
              AND m.date_start IS NOT NULL
              AND m.date_end IS NOT NULL
              AND m.date_start < ?3
              AND date(m.date_end, '+1 day') > ?4
            ORDER BY m.date_start, m.id
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    team_id,
                    exclude_mission_id.unwrap_or(-1),
                    fmt_date(window.end),
                    fmt_date(window.start),
                ],
                map_occupancy,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 编码查询
    // ==========================================

    /// 编码是否已被其他任务使用 (大小写不敏感)
    pub fn code_exists(&self, code: &str, exclude_mission_id: Option<i64>) -> RepositoryResult<bool> {
        let hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM mission WHERE UPPER(code) = UPPER(?1) AND id != ?2 LIMIT 1",
                params![code, exclude_mission_id.unwrap_or(-1)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    /// 指定前缀下最大的数字序号 (排除自身; 序号部分含非数字字符的编码不参与)
    pub fn max_sequence_with_prefix(
        &self,
        prefix: &str,
        exclude_mission_id: Option<i64>,
    ) -> RepositoryResult<Option<u32>> {
        let prefix = prefix.to_uppercase();
        let pattern = format!("{}[0-9]*", glob_escape(&prefix));
        let suffix_start = prefix.chars().count() as i64 + 1;
        let max: Option<i64> = self.conn.query_row(
            r#"
            SELECT MAX(CAST(SUBSTR(UPPER(code), ?3) AS INTEGER)) FROM mission
            WHERE UPPER(code) GLOB ?1
              AND SUBSTR(UPPER(code), ?3) NOT GLOB '*[^0-9]*'
              AND id != ?2
            "#,
            params![pattern, exclude_mission_id.unwrap_or(-1), suffix_start],
            |row| row.get(0),
        )?;
        Ok(max.and_then(|n| u32::try_from(n).ok()))
    }

    // ==========================================
    // 文件归档匹配
    // ==========================================

    /// 复合条件匹配: 线路名 + 日期 ∈ 任务日期 + pk ∈ 任务里程 + 已分配小车序列号 + 股道
    pub fn find_file_matches(&self, q: &FileMatchQuery<'_>) -> RepositoryResult<Vec<Mission>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT m.id
            FROM mission m
            JOIN rail_line rl ON rl.id = m.line_id
            JOIN cart_type_line l ON l.mission_id = m.id
            JOIN cart_type_line_cart lc ON lc.line_id = l.id
            JOIN cart c ON c.id = lc.cart_id
            JOIN mission_track_type mt ON mt.mission_id = m.id
            JOIN track_type tt ON tt.id = mt.track_type_id
            WHERE rl.name = ?1
              AND m.date_start <= ?2 AND m.date_end >= ?2
              AND MIN(m.pk_initial, m.pk_final) <= ?3
              AND MAX(m.pk_initial, m.pk_final) >= ?3
              AND c.serial_number = ?4
              AND tt.name = ?5
              AND m.state != 'CANCELLED'
            ORDER BY m.id
            "#,
        )?;
        let ids = stmt
            .query_map(
                params![q.line_name, fmt_date(q.date), q.pk, q.cart_serial, q.track],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut missions = Vec::with_capacity(ids.len());
        for id in ids {
            missions.push(self.get(id)?);
        }
        Ok(missions)
    }
}

/// GLOB 通配符转义 (* ? [ 按字面匹配)
fn glob_escape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '*' | '?' | '[' => format!("[{}]", c),
            other => other.to_string(),
        })
        .collect()
}
