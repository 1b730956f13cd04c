// ==========================================
// 供应链跟踪系统 - 项目仓储
// ==========================================
// 职责: 管理 projects / project_machines / project_machine_parts /
//       project_machine_order_numbers 表
// 说明: 写操作成功后发布 ProjectDataEvent，供分析层失效重算
// ==========================================

use crate::db::now_timestamp;
use crate::domain::project::{MachinePartRequirement, Project, ProjectMachine};
use crate::engine::events::{
    OptionalEventPublisher, ProjectDataEvent, ProjectDataEventPublisher, ProjectDataEventType,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct ProjectRepository {
    conn: Arc<Mutex<Connection>>,
    publisher: OptionalEventPublisher,
}

impl ProjectRepository {
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
            CREATE TABLE IF NOT EXISTS projects (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              description TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS project_machines (
              id TEXT PRIMARY KEY,
              project_id TEXT NOT NULL,
              name TEXT NOT NULL,
              start_date TEXT,
              end_date TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_project_machines_project
              ON project_machines(project_id, created_at);

            CREATE TABLE IF NOT EXISTS project_machine_parts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              machine_id TEXT NOT NULL,
              part_number TEXT NOT NULL,
              description TEXT,
              quantity_required REAL NOT NULL DEFAULT 0,
              quantity_used REAL NOT NULL DEFAULT 0,
              FOREIGN KEY (machine_id) REFERENCES project_machines(id) ON DELETE CASCADE,
              UNIQUE(machine_id, part_number)
            );

            CREATE TABLE IF NOT EXISTS project_machine_order_numbers (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              machine_id TEXT NOT NULL,
              order_number TEXT NOT NULL,
              FOREIGN KEY (machine_id) REFERENCES project_machines(id) ON DELETE CASCADE,
              UNIQUE(machine_id, order_number)
            );
            "#,
        )?;
        Ok(())
    }

    fn map_project(row: &Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn map_machine(row: &Row) -> rusqlite::Result<ProjectMachine> {
        Ok(ProjectMachine {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // ==========================================
    // 项目
    // ==========================================

    pub fn create_project(&self, name: &str, description: Option<&str>) -> RepositoryResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "项目名称不能为空".to_string(),
            });
        }

        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|s| s.to_string()),
            created_at: now_timestamp(),
        };

        {
            let conn = self.get_conn()?;
            conn.execute(
                "INSERT INTO projects (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![project.id, project.name, project.description, project.created_at],
            )?;
        }

        self.publisher.publish(ProjectDataEvent::project(
            project.id.clone(),
            ProjectDataEventType::ProjectCreated,
        ));
        Ok(project)
    }

    pub fn find_project(&self, project_id: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.get_conn()?;
        let project = conn
            .query_row(
                "SELECT id, name, description, created_at FROM projects WHERE id = ?1",
                params![project_id],
                Self::map_project,
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self) -> RepositoryResult<Vec<Project>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at FROM projects ORDER BY created_at ASC, rowid ASC",
        )?;
        let projects = stmt
            .query_map([], Self::map_project)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    // ==========================================
    // 机器
    // ==========================================

    /// 新增机器（项目必须存在）
    pub fn add_machine(
        &self,
        project_id: &str,
        name: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> RepositoryResult<ProjectMachine> {
        if self.find_project(project_id)?.is_none() {
            return Err(RepositoryError::not_found("Project", project_id));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "机器名称不能为空".to_string(),
            });
        }

        let machine = ProjectMachine {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            start_date: start_date.map(|s| s.to_string()),
            end_date: end_date.map(|s| s.to_string()),
            created_at: now_timestamp(),
        };

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO project_machines (id, project_id, name, start_date, end_date, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    machine.id,
                    machine.project_id,
                    machine.name,
                    machine.start_date,
                    machine.end_date,
                    machine.created_at,
                ],
            )?;
        }

        self.publisher.publish(ProjectDataEvent::machine(
            machine.project_id.clone(),
            machine.id.clone(),
            ProjectDataEventType::MachineAdded,
        ));
        Ok(machine)
    }

    /// 查询项目机器（按创建顺序）
    pub fn list_machines(&self, project_id: &str) -> RepositoryResult<Vec<ProjectMachine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, name, start_date, end_date, created_at
            FROM project_machines
            WHERE project_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let machines = stmt
            .query_map(params![project_id], Self::map_machine)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(machines)
    }

    pub fn find_machine(&self, machine_id: &str) -> RepositoryResult<Option<ProjectMachine>> {
        let conn = self.get_conn()?;
        let machine = conn
            .query_row(
                r#"
                SELECT id, project_id, name, start_date, end_date, created_at
                FROM project_machines WHERE id = ?1
                "#,
                params![machine_id],
                Self::map_machine,
            )
            .optional()?;
        Ok(machine)
    }

    fn require_machine(&self, machine_id: &str) -> RepositoryResult<ProjectMachine> {
        self.find_machine(machine_id)?
            .ok_or_else(|| RepositoryError::not_found("ProjectMachine", machine_id))
    }

    // ==========================================
    // 机器零件需求
    // ==========================================

    /// 新增或更新机器零件需求
    pub fn upsert_machine_part(&self, requirement: &MachinePartRequirement) -> RepositoryResult<()> {
        if requirement.part_number.trim().is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "part_number".to_string(),
                message: "零件号不能为空".to_string(),
            });
        }
        for (field, value) in [
            ("quantity_required", requirement.quantity_required),
            ("quantity_used", requirement.quantity_used),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RepositoryError::FieldValueError {
                    field: field.to_string(),
                    message: format!("数量必须为非负数: {}", value),
                });
            }
        }

        let machine = self.require_machine(&requirement.machine_id)?;

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO project_machine_parts (
                    machine_id, part_number, description, quantity_required, quantity_used
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(machine_id, part_number) DO UPDATE SET
                    description = excluded.description,
                    quantity_required = excluded.quantity_required,
                    quantity_used = excluded.quantity_used
                "#,
                params![
                    requirement.machine_id,
                    requirement.part_number.trim(),
                    requirement.description,
                    requirement.quantity_required,
                    requirement.quantity_used,
                ],
            )?;
        }

        self.publisher.publish(ProjectDataEvent::machine(
            machine.project_id,
            machine.id,
            ProjectDataEventType::MachinePartChanged,
        ));
        Ok(())
    }

    pub fn list_machine_parts(&self, machine_id: &str) -> RepositoryResult<Vec<MachinePartRequirement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT machine_id, part_number, description, quantity_required, quantity_used
            FROM project_machine_parts
            WHERE machine_id = ?1
            ORDER BY part_number ASC
            "#,
        )?;
        let parts = stmt
            .query_map(params![machine_id], |row| {
                Ok(MachinePartRequirement {
                    machine_id: row.get(0)?,
                    part_number: row.get(1)?,
                    description: row.get(2)?,
                    quantity_required: row.get(3)?,
                    quantity_used: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }

    // ==========================================
    // 机器订单号
    // ==========================================

    /// 关联订单号到机器（重复关联忽略）
    pub fn add_machine_order_number(&self, machine_id: &str, order_number: &str) -> RepositoryResult<()> {
        let order_number = order_number.trim();
        if order_number.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "order_number".to_string(),
                message: "订单号不能为空".to_string(),
            });
        }
        let machine = self.require_machine(machine_id)?;

        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT OR IGNORE INTO project_machine_order_numbers (machine_id, order_number)
                VALUES (?1, ?2)
                "#,
                params![machine_id, order_number],
            )?;
        }

        self.publisher.publish(ProjectDataEvent::machine(
            machine.project_id,
            machine.id,
            ProjectDataEventType::OrderNumberChanged,
        ));
        Ok(())
    }

    pub fn list_machine_order_numbers(&self, machine_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_number FROM project_machine_order_numbers
            WHERE machine_id = ?1
            ORDER BY id ASC
            "#,
        )?;
        let numbers = stmt
            .query_map(params![machine_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(numbers)
    }
}
