//! Employee record service: scope-filtered reads and HR-gated mutations.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use entity::status::RecordStatus;
use entity::{department, employee, employee_department};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::info_span;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::error::HrError;
use crate::identity;
use crate::scope::{can_access, require_hr_admin, resolve_scope, ResourceKind};

#[derive(Debug, Clone)]
pub struct EmployeeRecord {
    pub employee: employee::Model,
    pub manager_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateEmployee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub manager_id: Option<Uuid>,
    pub status: RecordStatus,
}

/// Advisory counts returned from a soft delete. Deletion proceeds whether or
/// not the employee still manages departments or has subordinates; callers
/// decide what to do with the numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionReport {
    pub managed_departments: u64,
    pub subordinates: u64,
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    status: Option<RecordStatus>,
) -> Result<Vec<EmployeeRecord>, HrError> {
    let scope = resolve_scope(db, principal, ResourceKind::Employee).await?;
    let span = info_span!(
        "hr.employees.list",
        scope = scope.as_str(),
        has_status = status.is_some()
    );
    let _guard = span.enter();
    let mut query = employee::Entity::find();
    if let Some(ids) = scope.id_filter() {
        query = query.filter(employee::Column::Id.is_in(ids));
    }
    if let Some(status) = status {
        query = query.filter(employee::Column::Status.eq(status));
    }
    let rows = query
        .order_by_asc(employee::Column::LastName)
        .order_by_asc(employee::Column::FirstName)
        .all(db)
        .await?;
    with_manager_names(db, rows).await
}

pub async fn get(
    db: &DatabaseConnection,
    principal: &Principal,
    id: Uuid,
) -> Result<EmployeeRecord, HrError> {
    if !can_access(db, principal, ResourceKind::Employee, id).await? {
        return Err(HrError::Forbidden);
    }
    let model = employee::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let mut records = with_manager_names(db, vec![model]).await?;
    Ok(records.remove(0))
}

/// Creates the employee row and then provisions a linked account with the
/// well-known default credential. Account provisioning failure is surfaced
/// as a warning, not an error: the employee row stays saved without a link
/// and the rest of the system tolerates that state.
pub async fn create(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewEmployee,
) -> Result<(EmployeeRecord, Option<String>), HrError> {
    require_hr_admin(principal)?;
    let first_name = validate_name("firstName", &input.first_name)?;
    let last_name = validate_name("lastName", &input.last_name)?;
    let email = normalize_email(&input.email)?;
    let phone = validate_phone(input.phone)?;
    if let Some(manager_id) = input.manager_id {
        ensure_employee_exists(db, manager_id).await?;
    }
    ensure_email_unused(db, &email, None).await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let id = Uuid::new_v4();
    employee::ActiveModel {
        id: Set(id),
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email.clone()),
        phone: Set(phone),
        manager_id: Set(input.manager_id),
        status: Set(RecordStatus::Active),
        account_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let manages_departments = department::Entity::find()
        .filter(department::Column::ManagerId.eq(id))
        .count(db)
        .await?
        > 0;
    let warning = match provision_account(db, id, &email, manages_departments).await {
        Ok(_) => None,
        Err(err) => Some(format!("employee saved without a linked account: {}", err)),
    };

    let model = employee::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let mut records = with_manager_names(db, vec![model]).await?;
    Ok((records.remove(0), warning))
}

pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    input: UpdateEmployee,
) -> Result<EmployeeRecord, HrError> {
    if !can_access(db, principal, ResourceKind::Employee, input.id).await? {
        return Err(HrError::Forbidden);
    }
    let stored = employee::Entity::find_by_id(input.id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;

    // Only HR administrators may move an employee between managers or flip
    // its status; everyone else gets the stored values back regardless of
    // what was submitted. The account link always comes from the stored row.
    let mut input = input;
    if !principal.is_hr_admin() {
        input.manager_id = stored.manager_id;
        input.status = stored.status;
    }

    let first_name = validate_name("firstName", &input.first_name)?;
    let last_name = validate_name("lastName", &input.last_name)?;
    let email = normalize_email(&input.email)?;
    let phone = validate_phone(input.phone)?;
    ensure_email_unused(db, &email, Some(input.id)).await?;
    if let Some(manager_id) = input.manager_id {
        if manager_id == input.id {
            return Err(HrError::validation("an employee cannot manage themselves"));
        }
        ensure_employee_exists(db, manager_id).await?;
        ensure_no_manager_cycle(db, input.id, manager_id).await?;
    }

    let mut active: employee::ActiveModel = stored.into();
    active.first_name = Set(first_name);
    active.last_name = Set(last_name);
    active.email = Set(email);
    active.phone = Set(phone);
    active.manager_id = Set(input.manager_id);
    active.status = Set(input.status);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(db).await?;

    let mut records = with_manager_names(db, vec![updated]).await?;
    Ok(records.remove(0))
}

/// Soft delete: the employee becomes Inactive, every active assignment is
/// closed out, and the linked account is locked permanently, all in one
/// transaction. The row itself is never removed.
pub async fn soft_delete(
    db: &DatabaseConnection,
    principal: &Principal,
    id: Uuid,
) -> Result<DeletionReport, HrError> {
    require_hr_admin(principal)?;
    let txn = db.begin().await?;
    let stored = employee::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(HrError::NotFound)?;

    let managed_departments = department::Entity::find()
        .filter(department::Column::ManagerId.eq(id))
        .filter(department::Column::Status.eq(RecordStatus::Active))
        .count(&txn)
        .await?;
    let subordinates = employee::Entity::find()
        .filter(employee::Column::ManagerId.eq(id))
        .count(&txn)
        .await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let assignments = employee_department::Entity::find()
        .filter(employee_department::Column::EmployeeId.eq(id))
        .filter(employee_department::Column::IsActive.eq(true))
        .all(&txn)
        .await?;
    for assignment in assignments {
        let mut active: employee_department::ActiveModel = assignment.into();
        active.is_active = Set(false);
        active.end_date = Set(Some(now));
        active.update(&txn).await?;
    }

    let account_id = stored.account_id;
    let mut active: employee::ActiveModel = stored.into();
    active.status = Set(RecordStatus::Inactive);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    if let Some(account_id) = account_id {
        identity::lock_account(&txn, account_id, identity::permanent_lockout()).await?;
    }
    txn.commit().await?;

    Ok(DeletionReport {
        managed_departments,
        subordinates,
    })
}

/// Resets the linked account's credential back to the well-known default.
pub async fn reset_password(
    db: &DatabaseConnection,
    principal: &Principal,
    id: Uuid,
) -> Result<(), HrError> {
    require_hr_admin(principal)?;
    let stored = employee::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let account_id = stored.account_id.ok_or(HrError::NotFound)?;
    let txn = db.begin().await?;
    let token = identity::generate_reset_token(&txn, account_id).await?;
    identity::reset_password(&txn, account_id, &token, identity::DEFAULT_PASSWORD).await?;
    txn.commit().await?;
    Ok(())
}

async fn provision_account(
    db: &DatabaseConnection,
    employee_id: Uuid,
    email: &str,
    is_manager: bool,
) -> Result<Uuid, HrError> {
    let txn = db.begin().await?;
    let account_id =
        identity::create_account(&txn, email, Some(employee_id), identity::DEFAULT_PASSWORD)
            .await?;
    let role = if is_manager { Role::Manager } else { Role::Employee };
    identity::assign_role(&txn, account_id, role).await?;
    let stored = employee::Entity::find_by_id(employee_id)
        .one(&txn)
        .await?
        .ok_or(HrError::NotFound)?;
    let mut active: employee::ActiveModel = stored.into();
    active.account_id = Set(Some(account_id));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;
    txn.commit().await?;
    Ok(account_id)
}

async fn with_manager_names(
    db: &DatabaseConnection,
    rows: Vec<employee::Model>,
) -> Result<Vec<EmployeeRecord>, HrError> {
    let manager_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|row| row.manager_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names = manager_names(db, &manager_ids).await?;
    Ok(rows
        .into_iter()
        .map(|employee| {
            let manager_name = employee.manager_id.and_then(|id| names.get(&id).cloned());
            EmployeeRecord {
                employee,
                manager_name,
            }
        })
        .collect())
}

/// Resolves display names for the given employee ids at read time.
pub(crate) async fn manager_names<C>(
    conn: &C,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, String>, HrError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let managers = employee::Entity::find()
        .filter(employee::Column::Id.is_in(ids.to_vec()))
        .all(conn)
        .await?;
    Ok(managers
        .into_iter()
        .map(|m| (m.id, m.full_name()))
        .collect())
}

async fn ensure_employee_exists(db: &DatabaseConnection, id: Uuid) -> Result<(), HrError> {
    let exists = employee::Entity::find_by_id(id).one(db).await?.is_some();
    if !exists {
        return Err(HrError::validation("referenced employee does not exist"));
    }
    Ok(())
}

async fn ensure_email_unused(
    db: &DatabaseConnection,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<(), HrError> {
    let mut query = employee::Entity::find().filter(employee::Column::Email.eq(email));
    if let Some(id) = exclude {
        query = query.filter(employee::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(HrError::validation(format!(
            "employee with email {} already exists",
            email
        )));
    }
    Ok(())
}

/// Walks the manager chain upward from `proposed_manager`; hitting
/// `employee_id` again means the assignment would close a management loop.
async fn ensure_no_manager_cycle(
    db: &DatabaseConnection,
    employee_id: Uuid,
    proposed_manager: Uuid,
) -> Result<(), HrError> {
    let mut visited = HashSet::new();
    let mut cursor = Some(proposed_manager);
    while let Some(current) = cursor {
        if current == employee_id {
            return Err(HrError::validation(
                "manager assignment would create a reporting cycle",
            ));
        }
        if !visited.insert(current) {
            break;
        }
        cursor = employee::Entity::find_by_id(current)
            .one(db)
            .await?
            .and_then(|m| m.manager_id);
    }
    Ok(())
}

pub(crate) fn normalize_email(value: &str) -> Result<String, HrError> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(HrError::validation("invalid email address"));
    }
    if trimmed.chars().count() > 256 {
        return Err(HrError::validation("email must be at most 256 characters"));
    }
    Ok(trimmed)
}

pub(crate) fn validate_name(field: &str, value: &str) -> Result<String, HrError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HrError::validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > 100 {
        return Err(HrError::validation(format!(
            "{} must be at most 100 characters",
            field
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_phone(value: Option<String>) -> Result<Option<String>, HrError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > 20 {
                return Err(HrError::validation("phone must be at most 20 characters"));
            }
            Ok(Some(trimmed))
        }
    }
}
