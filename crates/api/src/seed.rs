//! Demo data for local development. Everything goes through the public
//! service functions, so seeding doubles as a smoke test of the write paths.

use sea_orm::DatabaseConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::departments::{self, NewDepartment};
use crate::employees::{self, NewEmployee};
use crate::error::HrError;
use crate::identity;

pub const SEED_ADMIN_EMAIL: &str = "hr.admin@example.com";

/// Ids of the records created by [`seed_hr_demo`].
#[derive(Debug, Clone)]
pub struct SeededHrRecords {
    pub admin_account_id: Uuid,
    pub manager_id: Uuid,
    pub engineering_id: Uuid,
    pub support_id: Uuid,
    pub engineer_ids: Vec<Uuid>,
}

pub async fn seed_hr_demo(db: &DatabaseConnection) -> Result<SeededHrRecords, HrError> {
    if identity::find_account_by_email(db, SEED_ADMIN_EMAIL)
        .await?
        .is_some()
    {
        return Err(HrError::validation("demo data is already seeded"));
    }

    let admin_account_id =
        identity::create_account(db, SEED_ADMIN_EMAIL, None, identity::DEFAULT_PASSWORD).await?;
    identity::assign_role(db, admin_account_id, Role::HrAdministrator).await?;
    let admin = Principal {
        account_id: admin_account_id,
        employee_id: None,
        roles: vec![Role::HrAdministrator],
    };

    let (manager, warning) = employees::create(
        db,
        &admin,
        NewEmployee {
            first_name: "Maria".into(),
            last_name: "Kovacs".into(),
            email: "maria.kovacs@example.com".into(),
            phone: Some("+36 30 555 0101".into()),
            manager_id: None,
        },
    )
    .await?;
    log_warning(warning);
    let manager_id = manager.employee.id;

    let mut engineer_ids = Vec::new();
    for (first, last, email) in [
        ("Daniel", "Okafor", "daniel.okafor@example.com"),
        ("Priya", "Natarajan", "priya.natarajan@example.com"),
        ("Tomas", "Lindqvist", "tomas.lindqvist@example.com"),
    ] {
        let (record, warning) = employees::create(
            db,
            &admin,
            NewEmployee {
                first_name: first.into(),
                last_name: last.into(),
                email: email.into(),
                phone: None,
                manager_id: Some(manager_id),
            },
        )
        .await?;
        log_warning(warning);
        engineer_ids.push(record.employee.id);
    }

    let engineering = departments::create(
        db,
        &admin,
        NewDepartment {
            name: "Engineering".into(),
            manager_id: Some(manager_id),
        },
    )
    .await?;
    let support = departments::create(
        db,
        &admin,
        NewDepartment {
            name: "Support".into(),
            manager_id: None,
        },
    )
    .await?;

    departments::assign_employees(db, &admin, engineering.department.id, &engineer_ids).await?;
    departments::assign_employees(
        db,
        &admin,
        support.department.id,
        &engineer_ids[engineer_ids.len() - 1..],
    )
    .await?;

    info!(
        employees = engineer_ids.len() + 1,
        departments = 2,
        "seeded demo records"
    );
    Ok(SeededHrRecords {
        admin_account_id,
        manager_id,
        engineering_id: engineering.department.id,
        support_id: support.department.id,
        engineer_ids,
    })
}

fn log_warning(warning: Option<String>) {
    if let Some(message) = warning {
        tracing::warn!(%message, "account provisioning skipped during seed");
    }
}
