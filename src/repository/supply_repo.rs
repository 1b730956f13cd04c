// ==========================================
// 供应链跟踪系统 - 库存与订单仓储
// ==========================================
// 职责: 管理 stock / orders 表
// 说明: 两张表均按 part_number 关联，是分析视图刷新的数据来源
//       写操作后向引用该零件的项目发布 SupplyChanged
// ==========================================

use crate::db::now_timestamp;
use crate::domain::types::OrderStatus;
use crate::engine::events::{
    OptionalEventPublisher, ProjectDataEvent, ProjectDataEventPublisher, ProjectDataEventType,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 订单行（一个订单号可包含多个零件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_number: String,
    pub part_number: String,
    pub quantity: f64,
    pub status: OrderStatus,
    pub eta: Option<String>, // YYYY-MM-DD
}

pub struct SupplyRepository {
    conn: Arc<Mutex<Connection>>,
    publisher: OptionalEventPublisher,
}

impl SupplyRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self {
            conn,
            publisher: OptionalEventPublisher::none(),
        };
        repo.ensure_tables()?;
        Ok(repo)
    }

    /// 创建带事件发布者的仓储
    pub fn with_publisher(
        conn: Arc<Mutex<Connection>>,
        publisher: Arc<dyn ProjectDataEventPublisher>,
    ) -> RepositoryResult<Self> {
        let repo = Self {
            conn,
            publisher: OptionalEventPublisher::with_publisher(publisher),
        };
        repo.ensure_tables()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stock (
              part_number TEXT PRIMARY KEY,
              quantity_available REAL NOT NULL DEFAULT 0,
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS orders (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              order_number TEXT NOT NULL,
              part_number TEXT NOT NULL,
              quantity REAL NOT NULL DEFAULT 0,
              status TEXT NOT NULL,
              eta TEXT,
              UNIQUE(order_number, part_number)
            );

            CREATE INDEX IF NOT EXISTS idx_orders_part_status
              ON orders(part_number, status);
            "#,
        )?;
        Ok(())
    }

    fn check_quantity(field: &str, value: f64) -> RepositoryResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("数量必须为非负数: {}", value),
            });
        }
        Ok(())
    }

    /// 查找引用该零件的项目
    ///
    /// order_number 为 Some 时只统计挂了该订单号的机器
    fn affected_projects(
        conn: &Connection,
        part_number: &str,
        order_number: Option<&str>,
    ) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT pm.project_id
            FROM project_machine_parts p
            JOIN project_machines pm ON pm.id = p.machine_id
            WHERE p.part_number = ?1
              AND (?2 IS NULL OR EXISTS (
                SELECT 1 FROM project_machine_order_numbers o
                WHERE o.machine_id = p.machine_id AND o.order_number = ?2
              ))
            ORDER BY pm.project_id ASC
            "#,
        )?;
        let ids = stmt
            .query_map(params![part_number, order_number], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// 写入成功后通知受影响的项目；查询失败只记日志
    fn notify_supply_changed(
        &self,
        conn: &Connection,
        part_number: &str,
        order_number: Option<&str>,
        source: String,
    ) -> Vec<ProjectDataEvent> {
        if !self.publisher.is_configured() {
            return Vec::new();
        }
        match Self::affected_projects(conn, part_number, order_number) {
            Ok(ids) => ids
                .into_iter()
                .map(|project_id| {
                    ProjectDataEvent::project(project_id, ProjectDataEventType::SupplyChanged)
                        .with_source(source.clone())
                })
                .collect(),
            Err(e) => {
                tracing::warn!(part_number = %part_number, "查询受影响项目失败，跳过事件: {}", e);
                Vec::new()
            }
        }
    }

    // ==========================================
    // 库存
    // ==========================================

    pub fn upsert_stock(&self, part_number: &str, quantity_available: f64) -> RepositoryResult<()> {
        Self::check_quantity("quantity_available", quantity_available)?;
        let part_number = part_number.trim();
        let events = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO stock (part_number, quantity_available, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(part_number) DO UPDATE SET
                    quantity_available = excluded.quantity_available,
                    updated_at = excluded.updated_at
                "#,
                params![part_number, quantity_available, now_timestamp()],
            )?;
            self.notify_supply_changed(&conn, part_number, None, format!("stock:{}", part_number))
        };

        for event in events {
            self.publisher.publish(event);
        }
        Ok(())
    }

    pub fn get_stock(&self, part_number: &str) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let qty = conn
            .query_row(
                "SELECT quantity_available FROM stock WHERE part_number = ?1",
                params![part_number],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(qty)
    }

    // ==========================================
    // 订单
    // ==========================================

    /// 新增或更新订单行（按 order_number + part_number 唯一）
    pub fn upsert_order_line(&self, line: &OrderLine) -> RepositoryResult<()> {
        Self::check_quantity("quantity", line.quantity)?;
        if line.order_number.trim().is_empty() || line.part_number.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "订单号与零件号不能为空".to_string(),
            ));
        }

        let order_number = line.order_number.trim();
        let part_number = line.part_number.trim();
        let events = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO orders (order_number, part_number, quantity, status, eta)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(order_number, part_number) DO UPDATE SET
                    quantity = excluded.quantity,
                    status = excluded.status,
                    eta = excluded.eta
                "#,
                params![order_number, part_number, line.quantity, line.status.as_str(), line.eta],
            )?;
            self.notify_supply_changed(
                &conn,
                part_number,
                Some(order_number),
                format!("order:{}", order_number),
            )
        };

        for event in events {
            self.publisher.publish(event);
        }
        Ok(())
    }

    pub fn list_order_lines(&self, order_number: &str) -> RepositoryResult<Vec<OrderLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_number, part_number, quantity, status, eta
            FROM orders WHERE order_number = ?1
            ORDER BY part_number ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![order_number], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(order_number, part_number, quantity, status, eta)| {
                let status = OrderStatus::parse(&status).ok_or_else(|| RepositoryError::FieldValueError {
                    field: "status".to_string(),
                    message: format!("未知订单状态: {}", status),
                })?;
                Ok(OrderLine {
                    order_number,
                    part_number,
                    quantity,
                    status,
                    eta,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;

    #[test]
    fn test_stock_upsert() {
        let repo = SupplyRepository::new(open_in_memory_shared().unwrap()).unwrap();
        repo.upsert_stock("P1", 5.0).unwrap();
        repo.upsert_stock("P1", 7.0).unwrap();
        assert_eq!(repo.get_stock("P1").unwrap(), Some(7.0));
        assert_eq!(repo.get_stock("P2").unwrap(), None);
        assert!(repo.upsert_stock("P1", -1.0).is_err());
    }

    #[test]
    fn test_order_line_upsert() {
        let repo = SupplyRepository::new(open_in_memory_shared().unwrap()).unwrap();
        let mut line = OrderLine {
            order_number: "SO-1".to_string(),
            part_number: "P1".to_string(),
            quantity: 3.0,
            status: OrderStatus::Backorder,
            eta: Some("2026-03-01".to_string()),
        };
        repo.upsert_order_line(&line).unwrap();
        line.status = OrderStatus::Invoiced;
        repo.upsert_order_line(&line).unwrap();

        let lines = repo.list_order_lines("SO-1").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].status, OrderStatus::Invoiced);
    }
}
