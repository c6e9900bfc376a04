// ==========================================
// 轨道测量任务管理 - 小车数据仓储
// ==========================================
// 红线: 小车表只存物理状态, 不存日历占用
// ==========================================

use crate::domain::catalog::Cart;
use crate::domain::types::CartCondition;
use crate::repository::convert::bool_to_int;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct CartRepository<'a> {
    conn: &'a Connection,
}

const CART_COLUMNS: &str = "id, name, serial_number, cart_type_id, condition, notes, active";

fn map_cart(row: &Row) -> SqliteResult<Cart> {
    Ok(Cart {
        id: row.get(0)?,
        name: row.get(1)?,
        serial_number: row.get(2)?,
        cart_type_id: row.get(3)?,
        condition: CartCondition::from_str(&row.get::<_, String>(4)?),
        notes: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
    })
}

impl<'a> CartRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 新增小车 (序列号唯一, 冲突时返回 UniqueConstraintViolation)
    pub fn insert(&self, cart: &Cart) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO cart (name, serial_number, cart_type_id, condition, notes, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                cart.name,
                cart.serial_number,
                cart.cart_type_id,
                cart.condition.as_str(),
                cart.notes,
                bool_to_int(cart.active),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Cart>> {
        let sql = format!("SELECT {} FROM cart WHERE id = ?1", CART_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], map_cart).optional()?)
    }

    pub fn get(&self, id: i64) -> RepositoryResult<Cart> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("Cart", id))
    }

    pub fn find_by_serial(&self, serial: &str) -> RepositoryResult<Option<Cart>> {
        let sql = format!("SELECT {} FROM cart WHERE serial_number = ?1", CART_COLUMNS);
        Ok(self.conn.query_row(&sql, params![serial], map_cart).optional()?)
    }

    /// 按类型查询在用小车
    pub fn list_by_type(&self, cart_type_id: i64) -> RepositoryResult<Vec<Cart>> {
        let sql = format!(
            "SELECT {} FROM cart WHERE cart_type_id = ?1 AND active = 1 ORDER BY name",
            CART_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let carts = stmt
            .query_map(params![cart_type_id], map_cart)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(carts)
    }

    /// 更新名称/备注/启用标志 (序列号与类型不可变)
    pub fn update(&self, cart: &Cart) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE cart SET name = ?1, notes = ?2, active = ?3 WHERE id = ?4",
            params![cart.name, cart.notes, bool_to_int(cart.active), cart.id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Cart", cart.id));
        }
        Ok(())
    }

    /// 更新物理状态
    pub fn update_condition(&self, id: i64, condition: CartCondition) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE cart SET condition = ?1 WHERE id = ?2",
            params![condition.as_str(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Cart", id));
        }
        Ok(())
    }
}
