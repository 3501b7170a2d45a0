//! Department record service: scoped CRUD, membership reconciliation, and
//! the manager-role maintenance that rides along with manager changes.

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
use crate::employees::{manager_names, validate_name};
use crate::error::HrError;
use crate::identity;
use crate::scope::{can_access, require_hr_admin, resolve_scope, ResourceKind};

#[derive(Debug, Clone)]
pub struct DepartmentRecord {
    pub department: department::Model,
    pub manager_name: Option<String>,
}

/// Detail view: the department plus the employees with an active assignment
/// to it. Loaded only after the scope gate has passed.
#[derive(Debug, Clone)]
pub struct DepartmentDetail {
    pub department: department::Model,
    pub manager_name: Option<String>,
    pub members: Vec<employee::Model>,
}

#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub name: String,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateDepartment {
    pub id: Uuid,
    pub name: String,
    pub manager_id: Option<Uuid>,
    pub status: RecordStatus,
}

/// State transitions performed by one `assign_employees` reconciliation.
/// All zero means the call was a no-op.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct AssignmentChanges {
    pub created: u64,
    pub reactivated: u64,
    pub deactivated: u64,
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    status: Option<RecordStatus>,
) -> Result<Vec<DepartmentRecord>, HrError> {
    let scope = resolve_scope(db, principal, ResourceKind::Department).await?;
    let span = info_span!(
        "hr.departments.list",
        scope = scope.as_str(),
        has_status = status.is_some()
    );
    let _guard = span.enter();
    let mut query = department::Entity::find();
    if let Some(ids) = scope.id_filter() {
        query = query.filter(department::Column::Id.is_in(ids));
    }
    if let Some(status) = status {
        query = query.filter(department::Column::Status.eq(status));
    }
    let rows = query
        .order_by_asc(department::Column::Name)
        .all(db)
        .await?;
    with_manager_names(db, rows).await
}

pub async fn get(
    db: &DatabaseConnection,
    principal: &Principal,
    id: Uuid,
) -> Result<DepartmentDetail, HrError> {
    if !can_access(db, principal, ResourceKind::Department, id).await? {
        return Err(HrError::Forbidden);
    }
    let model = department::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let member_ids: Vec<Uuid> = employee_department::Entity::find()
        .filter(employee_department::Column::DepartmentId.eq(id))
        .filter(employee_department::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.employee_id)
        .collect();
    let members = if member_ids.is_empty() {
        vec![]
    } else {
        employee::Entity::find()
            .filter(employee::Column::Id.is_in(member_ids))
            .order_by_asc(employee::Column::LastName)
            .all(db)
            .await?
    };
    let manager_name = resolve_manager_name(db, model.manager_id).await?;
    Ok(DepartmentDetail {
        department: model,
        manager_name,
        members,
    })
}

pub async fn create(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewDepartment,
) -> Result<DepartmentRecord, HrError> {
    require_hr_admin(principal)?;
    let name = validate_name("name", &input.name)?;
    let txn = db.begin().await?;
    if let Some(manager_id) = input.manager_id {
        ensure_employee_exists(&txn, manager_id).await?;
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let id = Uuid::new_v4();
    department::ActiveModel {
        id: Set(id),
        name: Set(name),
        manager_id: Set(input.manager_id),
        status: Set(RecordStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    if let Some(manager_id) = input.manager_id {
        grant_manager_role(&txn, manager_id).await?;
    }
    txn.commit().await?;

    let model = department::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let manager_name = resolve_manager_name(db, model.manager_id).await?;
    Ok(DepartmentRecord {
        department: model,
        manager_name,
    })
}

/// Updates the row and reconciles Manager roles in the same transaction: the
/// incoming manager's account gains the role, and the outgoing manager loses
/// it once no Active department references them. Both commit or neither.
pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    input: UpdateDepartment,
) -> Result<DepartmentRecord, HrError> {
    if !can_access(db, principal, ResourceKind::Department, input.id).await? {
        return Err(HrError::Forbidden);
    }
    let txn = db.begin().await?;
    let stored = department::Entity::find_by_id(input.id)
        .one(&txn)
        .await?
        .ok_or(HrError::NotFound)?;

    // Manager and status changes are reserved to HR administrators; a
    // department manager may only touch the remaining fields.
    let mut input = input;
    if !principal.is_hr_admin() {
        input.manager_id = stored.manager_id;
        input.status = stored.status;
    }

    let name = validate_name("name", &input.name)?;
    if let Some(manager_id) = input.manager_id {
        ensure_employee_exists(&txn, manager_id).await?;
    }

    let previous_manager = stored.manager_id;
    let mut active: department::ActiveModel = stored.into();
    active.name = Set(name);
    active.manager_id = Set(input.manager_id);
    active.status = Set(input.status);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    if input.manager_id != previous_manager {
        if let Some(new_manager) = input.manager_id {
            grant_manager_role(&txn, new_manager).await?;
        }
        if let Some(old_manager) = previous_manager {
            reconcile_manager_role(&txn, old_manager).await?;
        }
    }
    txn.commit().await?;

    let model = department::Entity::find_by_id(input.id)
        .one(db)
        .await?
        .ok_or(HrError::NotFound)?;
    let manager_name = resolve_manager_name(db, model.manager_id).await?;
    Ok(DepartmentRecord {
        department: model,
        manager_name,
    })
}

/// Soft delete: Inactive status, every active assignment closed out, and the
/// former manager's role re-checked, all in one transaction.
pub async fn soft_delete(
    db: &DatabaseConnection,
    principal: &Principal,
    id: Uuid,
) -> Result<(), HrError> {
    require_hr_admin(principal)?;
    let txn = db.begin().await?;
    let stored = department::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(HrError::NotFound)?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let assignments = employee_department::Entity::find()
        .filter(employee_department::Column::DepartmentId.eq(id))
        .filter(employee_department::Column::IsActive.eq(true))
        .all(&txn)
        .await?;
    for assignment in assignments {
        let mut active: employee_department::ActiveModel = assignment.into();
        active.is_active = Set(false);
        active.end_date = Set(Some(now));
        active.update(&txn).await?;
    }

    let manager_id = stored.manager_id;
    let mut active: department::ActiveModel = stored.into();
    active.status = Set(RecordStatus::Inactive);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    if let Some(manager_id) = manager_id {
        reconcile_manager_role(&txn, manager_id).await?;
    }
    txn.commit().await?;
    Ok(())
}

/// Reconciles the department's active membership to exactly `selected_ids`:
/// active rows outside the selection are deactivated, previously closed rows
/// inside it are reactivated with a fresh start date, and ids never assigned
/// before get a new row. Applying the same selection twice is a no-op.
pub async fn assign_employees(
    db: &DatabaseConnection,
    principal: &Principal,
    department_id: Uuid,
    selected_ids: &[Uuid],
) -> Result<AssignmentChanges, HrError> {
    if !can_access(db, principal, ResourceKind::Department, department_id).await? {
        return Err(HrError::Forbidden);
    }
    let selected: HashSet<Uuid> = selected_ids.iter().copied().collect();
    let txn = db.begin().await?;
    department::Entity::find_by_id(department_id)
        .one(&txn)
        .await?
        .ok_or(HrError::NotFound)?;
    if !selected.is_empty() {
        let known = employee::Entity::find()
            .filter(employee::Column::Id.is_in(selected.iter().copied().collect::<Vec<_>>()))
            .count(&txn)
            .await?;
        if known as usize != selected.len() {
            return Err(HrError::validation(
                "selection references unknown employees",
            ));
        }
    }

    let existing = employee_department::Entity::find()
        .filter(employee_department::Column::DepartmentId.eq(department_id))
        .all(&txn)
        .await?;
    let mut seen: HashSet<Uuid> = HashSet::new();
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut changes = AssignmentChanges::default();

    for row in existing {
        seen.insert(row.employee_id);
        if row.is_active && !selected.contains(&row.employee_id) {
            let mut active: employee_department::ActiveModel = row.into();
            active.is_active = Set(false);
            active.end_date = Set(Some(now));
            active.update(&txn).await?;
            changes.deactivated += 1;
        } else if !row.is_active && selected.contains(&row.employee_id) {
            let mut active: employee_department::ActiveModel = row.into();
            active.is_active = Set(true);
            active.start_date = Set(now);
            active.end_date = Set(None);
            active.update(&txn).await?;
            changes.reactivated += 1;
        }
    }
    for employee_id in selected {
        if seen.contains(&employee_id) {
            continue;
        }
        employee_department::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee_id),
            department_id: Set(department_id),
            start_date: Set(now),
            end_date: Set(None),
            is_active: Set(true),
        }
        .insert(&txn)
        .await?;
        changes.created += 1;
    }
    txn.commit().await?;
    Ok(changes)
}

/// Grants the Manager role to the employee's linked account. Employees
/// without an account are tolerated (see the creation warning path); there
/// is nothing to grant the role to.
async fn grant_manager_role<C>(conn: &C, employee_id: Uuid) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    let stored = employee::Entity::find_by_id(employee_id)
        .one(conn)
        .await?
        .ok_or(HrError::NotFound)?;
    if let Some(account_id) = stored.account_id {
        identity::assign_role(conn, account_id, Role::Manager).await?;
    }
    Ok(())
}

/// Revokes the Manager role once the employee no longer manages any Active
/// department. The Employee role is left untouched.
async fn reconcile_manager_role<C>(conn: &C, employee_id: Uuid) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    let still_managing = department::Entity::find()
        .filter(department::Column::ManagerId.eq(employee_id))
        .filter(department::Column::Status.eq(RecordStatus::Active))
        .count(conn)
        .await?
        > 0;
    if still_managing {
        return Ok(());
    }
    let stored = employee::Entity::find_by_id(employee_id)
        .one(conn)
        .await?
        .ok_or(HrError::NotFound)?;
    if let Some(account_id) = stored.account_id {
        identity::remove_role(conn, account_id, Role::Manager).await?;
    }
    Ok(())
}

async fn with_manager_names(
    db: &DatabaseConnection,
    rows: Vec<department::Model>,
) -> Result<Vec<DepartmentRecord>, HrError> {
    let manager_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|row| row.manager_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names: HashMap<Uuid, String> = manager_names(db, &manager_ids).await?;
    Ok(rows
        .into_iter()
        .map(|department| {
            let manager_name = department.manager_id.and_then(|id| names.get(&id).cloned());
            DepartmentRecord {
                department,
                manager_name,
            }
        })
        .collect())
}

async fn resolve_manager_name(
    db: &DatabaseConnection,
    manager_id: Option<Uuid>,
) -> Result<Option<String>, HrError> {
    let Some(id) = manager_id else {
        return Ok(None);
    };
    let names = manager_names(db, &[id]).await?;
    Ok(names.get(&id).cloned())
}

async fn ensure_employee_exists<C>(conn: &C, id: Uuid) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    let exists = employee::Entity::find_by_id(id).one(conn).await?.is_some();
    if !exists {
        return Err(HrError::validation("referenced employee does not exist"));
    }
    Ok(())
}
