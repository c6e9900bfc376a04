// ==========================================
// 轨道测量任务管理 - 报价单仓储 (销售协作方接口)
// ==========================================

use crate::domain::quotation::{Quotation, QuotationLine};
use crate::domain::types::QuotationState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct QuotationRepository<'a> {
    conn: &'a Connection,
}

fn map_quotation(row: &Row) -> SqliteResult<Quotation> {
    let raw: String = row.get(3)?;
    let state = QuotationState::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("非法报价单状态: {}", raw).into(),
        )
    })?;
    Ok(Quotation {
        id: row.get(0)?,
        name: row.get(1)?,
        partner_id: row.get(2)?,
        state,
    })
}

fn map_line(row: &Row) -> SqliteResult<QuotationLine> {
    Ok(QuotationLine {
        id: row.get(0)?,
        quotation_id: row.get(1)?,
        product_name: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
        price_unit: row.get(5)?,
        mission_id: row.get(6)?,
    })
}

const LINE_COLUMNS: &str = "id, quotation_id, product_name, description, quantity, price_unit, mission_id";

impl<'a> QuotationRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, quotation: &Quotation) -> RepositoryResult<i64> {
        self.conn.execute(
            "INSERT INTO quotation (name, partner_id, state) VALUES (?1, ?2, ?3)",
            params![quotation.name, quotation.partner_id, quotation.state.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Quotation>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, partner_id, state FROM quotation WHERE id = ?1",
                params![id],
                map_quotation,
            )
            .optional()?)
    }

    pub fn get(&self, id: i64) -> RepositoryResult<Quotation> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("Quotation", id))
    }

    pub fn update_state(&self, id: i64, state: QuotationState) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE quotation SET state = ?1 WHERE id = ?2",
            params![state.as_str(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Quotation", id));
        }
        Ok(())
    }

    // ===== 报价行 =====

    pub fn insert_line(&self, line: &QuotationLine) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO quotation_line (quotation_id, product_name, description, quantity, price_unit, mission_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                line.quotation_id,
                line.product_name,
                line.description,
                line.quantity,
                line.price_unit,
                line.mission_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_line(&self, line_id: i64) -> RepositoryResult<Option<QuotationLine>> {
        let sql = format!("SELECT {} FROM quotation_line WHERE id = ?1", LINE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![line_id], map_line).optional()?)
    }

    pub fn get_line(&self, line_id: i64) -> RepositoryResult<QuotationLine> {
        self.find_line(line_id)?
            .ok_or_else(|| RepositoryError::not_found("QuotationLine", line_id))
    }

    /// 报价行所属报价单的状态
    pub fn state_of_line(&self, line_id: i64) -> RepositoryResult<Option<QuotationState>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                r#"
                SELECT q.state FROM quotation q
                JOIN quotation_line l ON l.quotation_id = q.id
                WHERE l.id = ?1
                "#,
                params![line_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| QuotationState::parse(&s)))
    }

    /// 同步数量与描述
    pub fn update_line_content(&self, line_id: i64, quantity: f64, description: &str) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE quotation_line SET quantity = ?1, description = ?2 WHERE id = ?3",
            params![quantity, description, line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("QuotationLine", line_id));
        }
        Ok(())
    }

    /// 写回任务指针
    pub fn set_line_mission(&self, line_id: i64, mission_id: Option<i64>) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE quotation_line SET mission_id = ?1 WHERE id = ?2",
            params![mission_id, line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("QuotationLine", line_id));
        }
        Ok(())
    }

    /// 报价单下所有关联了任务的报价行
    pub fn list_linked_lines(&self, quotation_id: i64) -> RepositoryResult<Vec<QuotationLine>> {
        let sql = format!(
            "SELECT {} FROM quotation_line WHERE quotation_id = ?1 AND mission_id IS NOT NULL ORDER BY id",
            LINE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params![quotation_id], map_line)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }
}
