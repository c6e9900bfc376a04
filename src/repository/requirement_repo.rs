// ==========================================
// 轨道测量任务管理 - 小车需求行仓储
// ==========================================
// 需求行: "任务需要 N 台 T 类型小车", 已分配小车存于 cart_type_line_cart
// ==========================================

use crate::domain::mission::CartTypeLine;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

pub struct RequirementRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RequirementRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 新增需求行 (同一任务同一类型唯一), 返回 id
    pub fn insert(&self, line: &CartTypeLine) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO cart_type_line (mission_id, cart_type_id, quantity) VALUES (?1, ?2, ?3)",
            params![line.mission_id, line.cart_type_id, line.quantity],
        )?;
        let id = self.conn.last_insert_rowid();
        self.replace_assigned(id, &line.assigned_cart_ids)?;
        Ok(id)
    }

    pub fn update_quantity(&self, line_id: i64, quantity: i32) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE cart_type_line SET quantity = ?1 WHERE id = ?2",
            params![quantity, line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("CartTypeLine", line_id));
        }
        Ok(())
    }

    /// 覆盖已分配小车
    pub fn replace_assigned(&self, line_id: i64, cart_ids: &[i64]) -> RepositoryResult<()> {
        self.conn.execute(
            "DELETE FROM cart_type_line_cart WHERE line_id = ?1",
            params![line_id],
        )?;
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO cart_type_line_cart (line_id, cart_id) VALUES (?1, ?2)")?;
        for cart_id in cart_ids {
            stmt.execute(params![line_id, cart_id])?;
        }
        Ok(())
    }

    pub fn delete(&self, line_id: i64) -> RepositoryResult<()> {
        let rows = self
            .conn
            .execute("DELETE FROM cart_type_line WHERE id = ?1", params![line_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("CartTypeLine", line_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, line_id: i64) -> RepositoryResult<Option<CartTypeLine>> {
        let head = self
            .conn
            .query_row(
                "SELECT id, mission_id, cart_type_id, quantity FROM cart_type_line WHERE id = ?1",
                params![line_id],
                |row| {
                    Ok(CartTypeLine {
                        id: row.get(0)?,
                        mission_id: row.get(1)?,
                        cart_type_id: row.get(2)?,
                        quantity: row.get(3)?,
                        assigned_cart_ids: Vec::new(),
                    })
                },
            )
            .optional()?;
        match head {
            Some(mut line) => {
                line.assigned_cart_ids = self.assigned_cart_ids(line.id)?;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, line_id: i64) -> RepositoryResult<CartTypeLine> {
        self.find_by_id(line_id)?
            .ok_or_else(|| RepositoryError::not_found("CartTypeLine", line_id))
    }

    /// 任务全部需求行 (含已分配小车)
    pub fn list_by_mission(&self, mission_id: i64) -> RepositoryResult<Vec<CartTypeLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mission_id, cart_type_id, quantity FROM cart_type_line WHERE mission_id = ?1 ORDER BY id",
        )?;
        let mut lines = stmt
            .query_map(params![mission_id], |row| {
                Ok(CartTypeLine {
                    id: row.get(0)?,
                    mission_id: row.get(1)?,
                    cart_type_id: row.get(2)?,
                    quantity: row.get(3)?,
                    assigned_cart_ids: Vec::new(),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        for line in lines.iter_mut() {
            line.assigned_cart_ids = self.assigned_cart_ids(line.id)?;
        }
        Ok(lines)
    }

    fn assigned_cart_ids(&self, line_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT cart_id FROM cart_type_line_cart WHERE line_id = ?1 ORDER BY cart_id",
        )?;
        let ids = stmt
            .query_map(params![line_id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(ids)
    }
}
