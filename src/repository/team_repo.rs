// ==========================================
// 轨道测量任务管理 - 现场班组仓储
// ==========================================

use crate::domain::team::FieldTeam;
use crate::repository::convert::bool_to_int;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

pub struct TeamRepository<'a> {
    conn: &'a Connection,
}

impl<'a> TeamRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 新增班组 (含成员)
    pub fn insert(&self, team: &FieldTeam) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO field_team (name, leader_id, color, active) VALUES (?1, ?2, ?3, ?4)",
            params![team.name, team.leader_id, team.color, bool_to_int(team.active)],
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_members(id, &team.member_ids)?;
        Ok(id)
    }

    /// 更新班组长与成员
    pub fn update(&self, team: &FieldTeam) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE field_team SET name = ?1, leader_id = ?2, color = ?3, active = ?4 WHERE id = ?5",
            params![team.name, team.leader_id, team.color, bool_to_int(team.active), team.id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("FieldTeam", team.id));
        }
        self.replace_members(team.id, &team.member_ids)
    }

    fn replace_members(&self, team_id: i64, member_ids: &[i64]) -> RepositoryResult<()> {
        self.conn.execute(
            "DELETE FROM field_team_member WHERE team_id = ?1",
            params![team_id],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO field_team_member (team_id, employee_id) VALUES (?1, ?2)",
        )?;
        for employee_id in member_ids {
            stmt.execute(params![team_id, employee_id])?;
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<FieldTeam>> {
        let head = self
            .conn
            .query_row(
                "SELECT id, name, leader_id, color, active FROM field_team WHERE id = ?1",
                params![id],
                |row| {
                    Ok(FieldTeam {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        leader_id: row.get(2)?,
                        member_ids: Vec::new(),
                        color: row.get(3)?,
                        active: row.get::<_, i32>(4)? != 0,
                    })
                },
            )
            .optional()?;

        let Some(mut team) = head else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT employee_id FROM field_team_member WHERE team_id = ?1 ORDER BY employee_id",
        )?;
        team.member_ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(Some(team))
    }

    pub fn get(&self, id: i64) -> RepositoryResult<FieldTeam> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("FieldTeam", id))
    }

    /// 在用班组 id 列表 (按名称排序)
    pub fn list_active_ids(&self) -> RepositoryResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM field_team WHERE active = 1 ORDER BY name")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(ids)
    }

    /// 全部班组 (含停用)
    pub fn list_all(&self) -> RepositoryResult<Vec<FieldTeam>> {
        let mut stmt = self.conn.prepare("SELECT id FROM field_team ORDER BY name")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        ids.into_iter().map(|id| self.get(id)).collect()
    }

    /// 班组长姓名 (用于可用性标签)
    pub fn leader_name(&self, team_id: i64) -> RepositoryResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT e.name FROM field_team t
                JOIN employee e ON e.id = t.leader_id
                WHERE t.id = ?1
                "#,
                params![team_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}
