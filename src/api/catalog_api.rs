// ==========================================
// 轨道测量任务管理 - 目录 API
// ==========================================
// 职责: 线路、会计期间、业务类型、股道类型、小车类型、小车、班组、员工维护
// 红线: 小车序列号唯一; 班组长不能同时是成员; 编码用字段 (简称/期间码/类型码) 唯一
// ==========================================

use crate::api::error::{ApiError, ApiResult, WriteOutcome};
use crate::api::store::Store;
use crate::config::ConfigManager;
use crate::domain::action_log::ActionType;
use crate::domain::catalog::{AccountingPeriod, AffairType, Cart, CartType, Employee, RailLine, TrackType};
use crate::domain::team::FieldTeam;
use crate::domain::types::CartCondition;
use crate::engine::context::{ContextFlags, ExecContext};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

fn require_text(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

fn log_catalog(ctx: &ExecContext<'_>, entity: &str, id: i64, detail: String) -> ApiResult<()> {
    ctx.log_action(
        None,
        ActionType::Catalog,
        Some(json!({ "entity": entity, "id": id })),
        detail,
    )?;
    Ok(())
}

// ==========================================
// CatalogApi - 目录 API
// ==========================================
pub struct CatalogApi {
    store: Store,
}

impl CatalogApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self {
            store: Store::new(conn, config),
        }
    }

    pub fn with_store(store: Store) -> Self {
        Self { store }
    }

    // ==========================================
    // 线路
    // ==========================================

    pub fn create_line(&self, actor: &str, line: RailLine) -> ApiResult<WriteOutcome<RailLine>> {
        require_text(&line.name, "线路名")?;
        require_text(&line.nickname, "线路简称")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut line = line;
            line.nickname = line.nickname.trim().to_uppercase();
            if ctx
                .catalog()
                .list_lines()?
                .iter()
                .any(|l| l.name == line.name || l.nickname == line.nickname)
            {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "线路名 {} 或简称 {} 已存在",
                    line.name, line.nickname
                )));
            }
            line.id = ctx.catalog().insert_line(&line)?;
            log_catalog(ctx, "rail_line", line.id, format!("新增线路 {}", line.name))?;
            Ok(line)
        })
    }

    pub fn update_line(&self, actor: &str, line: RailLine) -> ApiResult<WriteOutcome<RailLine>> {
        require_text(&line.name, "线路名")?;
        require_text(&line.nickname, "线路简称")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut line = line;
            line.nickname = line.nickname.trim().to_uppercase();
            ctx.catalog().update_line(&line)?;
            log_catalog(ctx, "rail_line", line.id, format!("修改线路 {}", line.name))?;
            Ok(line)
        })
    }

    pub fn list_lines(&self) -> ApiResult<Vec<RailLine>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_lines()?))
    }

    // ==========================================
    // 会计期间
    // ==========================================

    /// 新增会计期间 (编码为单个字母)
    pub fn create_period(&self, actor: &str, period: AccountingPeriod) -> ApiResult<WriteOutcome<AccountingPeriod>> {
        let code = period.code.trim().to_uppercase();
        if code.len() != 1 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::InvalidInput(format!(
                "会计期间编码必须是单个字母: '{}'",
                period.code
            )));
        }
        if period.date_end < period.date_start {
            return Err(ApiError::ValidationError(format!(
                "会计期间结束日期 {} 早于开始日期 {}",
                period.date_end, period.date_start
            )));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut period = period;
            period.code = code;
            period.id = ctx.catalog().insert_period(&period)?;
            log_catalog(ctx, "accounting_period", period.id, format!("新增会计期间 {}", period.display_name()))?;
            Ok(period)
        })
    }

    pub fn update_period(&self, actor: &str, period: AccountingPeriod) -> ApiResult<WriteOutcome<AccountingPeriod>> {
        if period.date_end < period.date_start {
            return Err(ApiError::ValidationError(format!(
                "会计期间结束日期 {} 早于开始日期 {}",
                period.date_end, period.date_start
            )));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            ctx.catalog().update_period(&period)?;
            log_catalog(ctx, "accounting_period", period.id, format!("修改会计期间 {}", period.display_name()))?;
            Ok(period)
        })
    }

    pub fn list_periods(&self) -> ApiResult<Vec<AccountingPeriod>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_periods()?))
    }

    // ==========================================
    // 业务类型
    // ==========================================

    pub fn create_affair_type(&self, actor: &str, affair_type: AffairType) -> ApiResult<WriteOutcome<AffairType>> {
        require_text(&affair_type.name, "业务类型名称")?;
        require_text(&affair_type.code, "业务类型编码")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut affair_type = affair_type;
            affair_type.code = affair_type.code.trim().to_uppercase();
            if ctx.catalog().find_affair_type_by_code(&affair_type.code)?.is_some() {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "业务类型编码 {} 已存在",
                    affair_type.code
                )));
            }
            affair_type.id = ctx.catalog().insert_affair_type(&affair_type)?;
            log_catalog(ctx, "affair_type", affair_type.id, format!("新增业务类型 {}", affair_type.code))?;
            Ok(affair_type)
        })
    }

    pub fn update_affair_type(&self, actor: &str, affair_type: AffairType) -> ApiResult<WriteOutcome<AffairType>> {
        require_text(&affair_type.code, "业务类型编码")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut affair_type = affair_type;
            affair_type.code = affair_type.code.trim().to_uppercase();
            ctx.catalog().update_affair_type(&affair_type)?;
            log_catalog(ctx, "affair_type", affair_type.id, format!("修改业务类型 {}", affair_type.code))?;
            Ok(affair_type)
        })
    }

    pub fn list_affair_types(&self) -> ApiResult<Vec<AffairType>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_affair_types()?))
    }

    // ==========================================
    // 股道类型 / 小车类型
    // ==========================================

    pub fn create_track_type(&self, actor: &str, name: &str) -> ApiResult<WriteOutcome<TrackType>> {
        require_text(name, "股道类型")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let name = name.trim().to_uppercase();
            if ctx.catalog().find_track_type_by_name(&name)?.is_some() {
                return Err(ApiError::BusinessRuleViolation(format!("股道类型 {} 已存在", name)));
            }
            let id = ctx.catalog().insert_track_type(&name)?;
            log_catalog(ctx, "track_type", id, format!("新增股道类型 {}", name))?;
            Ok(TrackType { id, name })
        })
    }

    pub fn list_track_types(&self) -> ApiResult<Vec<TrackType>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_track_types()?))
    }

    pub fn create_cart_type(&self, actor: &str, cart_type: CartType) -> ApiResult<WriteOutcome<CartType>> {
        require_text(&cart_type.name, "小车类型名称")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut cart_type = cart_type;
            cart_type.id = ctx.catalog().insert_cart_type(&cart_type)?;
            log_catalog(ctx, "cart_type", cart_type.id, format!("新增小车类型 {}", cart_type.name))?;
            Ok(cart_type)
        })
    }

    pub fn list_cart_types(&self) -> ApiResult<Vec<CartType>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_cart_types()?))
    }

    // ==========================================
    // 小车
    // ==========================================

    /// 新增小车 (序列号唯一)
    pub fn create_cart(&self, actor: &str, cart: Cart) -> ApiResult<WriteOutcome<Cart>> {
        require_text(&cart.name, "小车名称")?;
        require_text(&cart.serial_number, "小车序列号")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut cart = cart;
            cart.serial_number = cart.serial_number.trim().to_string();
            if let Some(existing) = ctx.carts().find_by_serial(&cart.serial_number)? {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "序列号 {} 已被小车 {} 使用",
                    cart.serial_number, existing.name
                )));
            }
            ctx.catalog()
                .find_cart_type(cart.cart_type_id)?
                .ok_or_else(|| ApiError::NotFound(format!("小车类型(id={})不存在", cart.cart_type_id)))?;
            cart.id = ctx.carts().insert(&cart)?;
            log_catalog(ctx, "cart", cart.id, format!("新增小车 {} ({})", cart.name, cart.serial_number))?;
            Ok(cart)
        })
    }

    /// 修改名称/备注/启用标志
    pub fn update_cart(&self, actor: &str, cart: Cart) -> ApiResult<WriteOutcome<Cart>> {
        require_text(&cart.name, "小车名称")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            ctx.carts().update(&cart)?;
            log_catalog(ctx, "cart", cart.id, format!("修改小车 {}", cart.name))?;
            Ok(ctx.carts().get(cart.id)?)
        })
    }

    /// 修改物理状态 (可用/维护/停用), 与日历占用无关
    pub fn set_cart_condition(
        &self,
        actor: &str,
        cart_id: i64,
        condition: CartCondition,
    ) -> ApiResult<WriteOutcome<Cart>> {
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let cart = ctx.carts().get(cart_id)?;
            ctx.carts().update_condition(cart_id, condition)?;
            ctx.log_action(
                None,
                ActionType::Catalog,
                Some(json!({ "entity": "cart", "id": cart_id, "from": cart.condition, "to": condition })),
                format!("小车 {} 状态 {} → {}", cart.name, cart.condition, condition),
            )?;
            info!(cart = %cart.name, from = %cart.condition, to = %condition, "小车物理状态变更");
            Ok(ctx.carts().get(cart_id)?)
        })
    }

    pub fn list_carts(&self, cart_type_id: i64) -> ApiResult<Vec<Cart>> {
        self.store.read(|ctx| Ok(ctx.carts().list_by_type(cart_type_id)?))
    }

    // ==========================================
    // 员工 / 班组
    // ==========================================

    pub fn create_employee(&self, actor: &str, name: &str) -> ApiResult<WriteOutcome<Employee>> {
        require_text(name, "员工姓名")?;
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let id = ctx.catalog().insert_employee(name.trim())?;
            log_catalog(ctx, "employee", id, format!("新增员工 {}", name.trim()))?;
            Ok(Employee {
                id,
                name: name.trim().to_string(),
                active: true,
            })
        })
    }

    pub fn list_employees(&self) -> ApiResult<Vec<Employee>> {
        self.store.read(|ctx| Ok(ctx.catalog().list_employees()?))
    }

    /// 新增班组 (班组长不能同时是成员)
    pub fn create_team(&self, actor: &str, team: FieldTeam) -> ApiResult<WriteOutcome<FieldTeam>> {
        require_text(&team.name, "班组名称")?;
        if !team.is_composition_valid() {
            return Err(ApiError::ValidationError(format!(
                "班组 {} 的班组长不能同时是成员",
                team.name
            )));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            let mut team = team;
            ensure_employees_exist(ctx, &team)?;
            team.id = ctx.teams().insert(&team)?;
            log_catalog(ctx, "field_team", team.id, format!("新增班组 {}", team.name))?;
            Ok(team)
        })
    }

    pub fn update_team(&self, actor: &str, team: FieldTeam) -> ApiResult<WriteOutcome<FieldTeam>> {
        if !team.is_composition_valid() {
            return Err(ApiError::ValidationError(format!(
                "班组 {} 的班组长不能同时是成员",
                team.name
            )));
        }
        self.store.write(actor, ContextFlags::default(), |ctx| {
            ensure_employees_exist(ctx, &team)?;
            ctx.teams().update(&team)?;
            log_catalog(ctx, "field_team", team.id, format!("修改班组 {}", team.name))?;
            Ok(ctx.teams().get(team.id)?)
        })
    }

    pub fn list_teams(&self) -> ApiResult<Vec<FieldTeam>> {
        self.store.read(|ctx| Ok(ctx.teams().list_all()?))
    }
}

fn ensure_employees_exist(ctx: &ExecContext<'_>, team: &FieldTeam) -> ApiResult<()> {
    for id in std::iter::once(team.leader_id).chain(team.member_ids.iter().copied()) {
        if ctx.catalog().find_employee(id)?.is_none() {
            return Err(ApiError::NotFound(format!("员工(id={})不存在", id)));
        }
    }
    Ok(())
}
