#![allow(dead_code)]

use api::auth::{Principal, Role};
use api::departments::{self, NewDepartment};
use api::employees::{self, NewEmployee};
use api::identity;
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, EntityTrait, Statement,
};
use uuid::Uuid;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    bootstrap_sqlite(&db).await;
    db
}

async fn bootstrap_sqlite(db: &DatabaseConnection) {
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "PRAGMA foreign_keys = ON;",
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE employee (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            manager_id TEXT,
            status TEXT NOT NULL,
            account_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE department (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            manager_id TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE employee_department (
            id TEXT PRIMARY KEY,
            employee_id TEXT NOT NULL REFERENCES employee(id),
            department_id TEXT NOT NULL REFERENCES department(id),
            start_date TEXT NOT NULL,
            end_date TEXT,
            is_active INTEGER NOT NULL,
            UNIQUE(employee_id, department_id)
        );
        "#,
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE account (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            employee_id TEXT,
            locked_until TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE account_secret (
            account_id TEXT PRIMARY KEY REFERENCES account(id) ON DELETE CASCADE,
            password_hash TEXT NOT NULL,
            reset_token_hash TEXT,
            reset_token_expires TEXT,
            updated_at TEXT NOT NULL
        );
        "#,
    ))
    .await
    .unwrap();

    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        r#"
        CREATE TABLE account_role (
            account_id TEXT NOT NULL REFERENCES account(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            PRIMARY KEY (account_id, role)
        );
        "#,
    ))
    .await
    .unwrap();
}

/// Creates an HR administrator account with no employee link and returns
/// its principal.
pub async fn hr_admin(db: &DatabaseConnection) -> Principal {
    let account_id = identity::create_account(
        db,
        "hr.admin@example.test",
        None,
        identity::DEFAULT_PASSWORD,
    )
    .await
    .unwrap();
    identity::assign_role(db, account_id, Role::HrAdministrator)
        .await
        .unwrap();
    Principal {
        account_id,
        employee_id: None,
        roles: vec![Role::HrAdministrator],
    }
}

/// Builds the principal a login would yield for the employee: the linked
/// account plus its current role rows.
pub async fn principal_for(db: &DatabaseConnection, employee_id: Uuid) -> Principal {
    let model = entity::employee::Entity::find_by_id(employee_id)
        .one(db)
        .await
        .unwrap()
        .expect("employee exists");
    let account_id = model.account_id.expect("employee has a linked account");
    let roles = identity::load_roles(db, account_id).await.unwrap();
    Principal {
        account_id,
        employee_id: Some(employee_id),
        roles,
    }
}

pub async fn create_employee(
    db: &DatabaseConnection,
    admin: &Principal,
    first: &str,
    last: &str,
    email: &str,
    manager_id: Option<Uuid>,
) -> entity::employee::Model {
    let (record, warning) = employees::create(
        db,
        admin,
        NewEmployee {
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            phone: None,
            manager_id,
        },
    )
    .await
    .unwrap();
    assert!(warning.is_none(), "unexpected warning: {:?}", warning);
    record.employee
}

pub async fn create_department(
    db: &DatabaseConnection,
    admin: &Principal,
    name: &str,
    manager_id: Option<Uuid>,
) -> entity::department::Model {
    departments::create(
        db,
        admin,
        NewDepartment {
            name: name.into(),
            manager_id,
        },
    )
    .await
    .unwrap()
    .department
}
