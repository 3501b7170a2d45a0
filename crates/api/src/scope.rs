//! Access scope resolution: which employee/department rows a principal may
//! see or act upon.

use std::collections::HashSet;

use entity::{department, employee_department};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::error::HrError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResourceKind {
    Employee,
    Department,
}

/// The visibility predicate for one (principal, resource) pair. `Ids` may be
/// empty, which is an allowed-but-empty result; a principal with no scope at
/// all gets `HrError::Forbidden` from the resolver instead.
#[derive(Debug, Clone)]
pub enum AccessScope {
    All,
    Ids(HashSet<Uuid>),
}

impl AccessScope {
    pub fn contains(&self, id: Uuid) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Ids(ids) => ids.contains(&id),
        }
    }

    /// `None` means unrestricted; `Some(ids)` becomes an `id IN (...)` filter.
    pub fn id_filter(&self) -> Option<Vec<Uuid>> {
        match self {
            AccessScope::All => None,
            AccessScope::Ids(ids) => Some(ids.iter().copied().collect()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::All => "all",
            AccessScope::Ids(_) => "scoped",
        }
    }
}

/// Computes the row scope for `principal` over `kind`.
///
/// HR administrators see everything. Managers see the departments they
/// manage and the employees actively assigned to them (plus themselves).
/// Employees see their own record and their actively assigned departments.
/// A principal with no linked employee record and no HR administrator role
/// has no scope at all.
pub async fn resolve_scope<C>(
    conn: &C,
    principal: &Principal,
    kind: ResourceKind,
) -> Result<AccessScope, HrError>
where
    C: ConnectionTrait,
{
    if principal.has_role(Role::HrAdministrator) {
        return Ok(AccessScope::All);
    }
    let Some(employee_id) = principal.employee_id else {
        return Err(HrError::Forbidden);
    };
    if principal.has_role(Role::Manager) {
        // Managed means manager_id points here, regardless of status; role
        // reconciliation is what takes the Manager role away.
        let managed: Vec<Uuid> = department::Entity::find()
            .filter(department::Column::ManagerId.eq(employee_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        return match kind {
            ResourceKind::Department => Ok(AccessScope::Ids(managed.into_iter().collect())),
            ResourceKind::Employee => {
                let mut ids: HashSet<Uuid> = if managed.is_empty() {
                    HashSet::new()
                } else {
                    employee_department::Entity::find()
                        .filter(employee_department::Column::DepartmentId.is_in(managed))
                        .filter(employee_department::Column::IsActive.eq(true))
                        .all(conn)
                        .await?
                        .into_iter()
                        .map(|row| row.employee_id)
                        .collect()
                };
                ids.insert(employee_id);
                Ok(AccessScope::Ids(ids))
            }
        };
    }
    if principal.has_role(Role::Employee) {
        return match kind {
            ResourceKind::Employee => Ok(AccessScope::Ids(HashSet::from([employee_id]))),
            ResourceKind::Department => {
                let ids: HashSet<Uuid> = employee_department::Entity::find()
                    .filter(employee_department::Column::EmployeeId.eq(employee_id))
                    .filter(employee_department::Column::IsActive.eq(true))
                    .all(conn)
                    .await?
                    .into_iter()
                    .map(|row| row.department_id)
                    .collect();
                Ok(AccessScope::Ids(ids))
            }
        };
    }
    Err(HrError::Forbidden)
}

/// Gate for operations reserved to HR administrators.
pub fn require_hr_admin(principal: &Principal) -> Result<(), HrError> {
    if principal.has_role(Role::HrAdministrator) {
        Ok(())
    } else {
        Err(HrError::Forbidden)
    }
}

/// Boolean detail-view variant of [`resolve_scope`], evaluated against a
/// single target id. Gates single-record fetches before any related rows
/// are loaded. An out-of-scope principal yields `Ok(false)`, not an error.
pub async fn can_access<C>(
    conn: &C,
    principal: &Principal,
    kind: ResourceKind,
    id: Uuid,
) -> Result<bool, HrError>
where
    C: ConnectionTrait,
{
    match resolve_scope(conn, principal, kind).await {
        Ok(scope) => Ok(scope.contains(id)),
        Err(HrError::Forbidden) => Ok(false),
        Err(err) => Err(err),
    }
}
