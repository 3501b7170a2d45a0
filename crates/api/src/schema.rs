//! GraphQL surface. Resolvers stay thin: parse ids, call the service
//! functions with the caller's [`Principal`], translate errors.

use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, Error, ErrorExtensions, InputObject, Object, Schema,
    SimpleObject, ID,
};
use entity::status::RecordStatus;
use entity::{account_secret, employee};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::auth::{issue_token, AuthConfig, Principal, SESSION_COOKIE};
use crate::departments::{
    self, DepartmentDetail, DepartmentRecord, NewDepartment, UpdateDepartment,
};
use crate::employees::{self, EmployeeRecord, NewEmployee, UpdateEmployee};
use crate::error::HrError;
use crate::identity;

pub struct AppSchema(pub Schema<QueryRoot, MutationRoot, EmptySubscription>);

pub fn build_schema(db: Arc<DatabaseConnection>, auth: Arc<AuthConfig>) -> AppSchema {
    let schema = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(auth)
        .finish();
    AppSchema(schema)
}

pub struct QueryRoot;
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    async fn hr(&self) -> HrQuery {
        HrQuery
    }
}

#[Object]
impl MutationRoot {
    async fn hr(&self) -> HrMutation {
        HrMutation
    }
}

#[derive(Default)]
pub struct HrQuery;

#[derive(Default)]
pub struct HrMutation;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordState {
    #[graphql(name = "ACTIVE")]
    Active,
    #[graphql(name = "INACTIVE")]
    Inactive,
}

impl From<RecordStatus> for RecordState {
    fn from(value: RecordStatus) -> Self {
        match value {
            RecordStatus::Active => RecordState::Active,
            RecordStatus::Inactive => RecordState::Inactive,
        }
    }
}

impl From<RecordState> for RecordStatus {
    fn from(value: RecordState) -> Self {
        match value {
            RecordState::Active => RecordStatus::Active,
            RecordState::Inactive => RecordStatus::Inactive,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeeNode {
    pub id: ID,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub manager_id: Option<ID>,
    pub manager_name: Option<String>,
    pub status: RecordState,
    pub has_account: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl EmployeeNode {
    fn from_record(record: EmployeeRecord) -> Self {
        let model = record.employee;
        EmployeeNode {
            id: ID(model.id.to_string()),
            full_name: model.full_name(),
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            manager_id: model.manager_id.map(|id| ID(id.to_string())),
            manager_name: record.manager_name,
            status: model.status.into(),
            has_account: model.account_id.is_some(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DepartmentNode {
    pub id: ID,
    pub name: String,
    pub manager_id: Option<ID>,
    pub manager_name: Option<String>,
    pub status: RecordState,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl DepartmentNode {
    fn from_record(record: DepartmentRecord) -> Self {
        let model = record.department;
        DepartmentNode {
            id: ID(model.id.to_string()),
            name: model.name,
            manager_id: model.manager_id.map(|id| ID(id.to_string())),
            manager_name: record.manager_name,
            status: model.status.into(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DepartmentMemberNode {
    pub id: ID,
    pub full_name: String,
    pub email: String,
    pub status: RecordState,
}

impl DepartmentMemberNode {
    fn from_model(model: employee::Model) -> Self {
        DepartmentMemberNode {
            id: ID(model.id.to_string()),
            full_name: model.full_name(),
            email: model.email,
            status: model.status.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DepartmentDetailPayload {
    pub department: DepartmentNode,
    pub members: Vec<DepartmentMemberNode>,
}

impl DepartmentDetailPayload {
    fn from_detail(detail: DepartmentDetail) -> Self {
        let department = DepartmentNode::from_record(DepartmentRecord {
            department: detail.department,
            manager_name: detail.manager_name,
        });
        DepartmentDetailPayload {
            department,
            members: detail
                .members
                .into_iter()
                .map(DepartmentMemberNode::from_model)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub account_id: ID,
    pub employee: Option<EmployeeNode>,
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AuthPayload {
    pub ok: bool,
    pub account_id: Option<ID>,
    pub roles: Vec<String>,
    pub error: Option<String>,
}

impl AuthPayload {
    fn rejected(message: &str) -> Self {
        AuthPayload {
            ok: false,
            account_id: None,
            roles: vec![],
            error: Some(message.to_string()),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CreateEmployeePayload {
    pub employee: EmployeeNode,
    /// Set when the employee was saved but account provisioning failed.
    pub warning: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DeleteEmployeePayload {
    pub ok: bool,
    pub managed_departments: u64,
    pub subordinates: u64,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AssignEmployeesPayload {
    pub created: u64,
    pub reactivated: u64,
    pub deactivated: u64,
}

#[derive(InputObject, Debug)]
pub struct EmployeeInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub manager_id: Option<ID>,
}

#[derive(InputObject, Debug)]
pub struct EmployeeUpdateInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub manager_id: Option<ID>,
    pub status: RecordState,
}

#[derive(InputObject, Debug)]
pub struct DepartmentInput {
    pub name: String,
    pub manager_id: Option<ID>,
}

#[derive(InputObject, Debug)]
pub struct DepartmentUpdateInput {
    pub name: String,
    pub manager_id: Option<ID>,
    pub status: RecordState,
}

#[Object]
impl HrQuery {
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let employee = match caller.employee_id {
            None => None,
            Some(id) => {
                let model = employee::Entity::find_by_id(id)
                    .one(db.as_ref())
                    .await
                    .map_err(|err| graphql_error(err.into()))?;
                match model {
                    None => None,
                    Some(model) => {
                        // The caller's own record is always visible to them,
                        // whatever their role set resolves to.
                        let manager_name = match model.manager_id {
                            None => None,
                            Some(mid) => employees::manager_names(db.as_ref(), &[mid])
                                .await
                                .map_err(graphql_error)?
                                .get(&mid)
                                .cloned(),
                        };
                        Some(EmployeeNode::from_record(EmployeeRecord {
                            employee: model,
                            manager_name,
                        }))
                    }
                }
            }
        };
        Ok(MePayload {
            account_id: ID(caller.account_id.to_string()),
            employee,
            roles: caller.roles.iter().map(|r| r.as_str().to_string()).collect(),
        })
    }

    async fn employees(
        &self,
        ctx: &Context<'_>,
        status: Option<RecordState>,
    ) -> async_graphql::Result<Vec<EmployeeNode>> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let records = employees::list(db.as_ref(), &caller, status.map(Into::into))
            .await
            .map_err(graphql_error)?;
        Ok(records.into_iter().map(EmployeeNode::from_record).collect())
    }

    async fn employee(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<EmployeeNode> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let record = employees::get(db.as_ref(), &caller, parse_uuid(&id)?)
            .await
            .map_err(graphql_error)?;
        Ok(EmployeeNode::from_record(record))
    }

    async fn departments(
        &self,
        ctx: &Context<'_>,
        status: Option<RecordState>,
    ) -> async_graphql::Result<Vec<DepartmentNode>> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let records = departments::list(db.as_ref(), &caller, status.map(Into::into))
            .await
            .map_err(graphql_error)?;
        Ok(records
            .into_iter()
            .map(DepartmentNode::from_record)
            .collect())
    }

    async fn department(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<DepartmentDetailPayload> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let detail = departments::get(db.as_ref(), &caller, parse_uuid(&id)?)
            .await
            .map_err(graphql_error)?;
        Ok(DepartmentDetailPayload::from_detail(detail))
    }
}

#[Object]
impl HrMutation {
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        let auth = auth_config(ctx)?;
        let db = database(ctx)?;
        let normalized = employees::normalize_email(&email).map_err(graphql_error)?;
        let account = identity::find_account_by_email(db.as_ref(), &normalized)
            .await
            .map_err(graphql_error)?;
        let Some(account) = account else {
            return Ok(AuthPayload::rejected("Invalid credentials"));
        };
        if identity::is_locked(&account) {
            return Ok(AuthPayload::rejected("Account is locked"));
        }
        let secret = account_secret::Entity::find_by_id(account.id)
            .one(db.as_ref())
            .await
            .map_err(|err| graphql_error(err.into()))?;
        let Some(secret) = secret else {
            return Ok(AuthPayload::rejected("Invalid credentials"));
        };
        if !identity::verify_password(&password, &secret.password_hash) {
            return Ok(AuthPayload::rejected("Invalid credentials"));
        }
        let roles = identity::load_roles(db.as_ref(), account.id)
            .await
            .map_err(graphql_error)?;
        let token = issue_token(account.id, &roles, &auth)
            .map_err(|_| error_with_code("INTERNAL", "Failed to issue session token"))?;
        append_session_cookie(ctx, &token, auth.session_ttl_minutes);
        Ok(AuthPayload {
            ok: true,
            account_id: Some(ID(account.id.to_string())),
            roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
            error: None,
        })
    }

    async fn logout(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        append_session_cookie(ctx, "", -1);
        Ok(true)
    }

    async fn create_employee(
        &self,
        ctx: &Context<'_>,
        input: EmployeeInput,
    ) -> async_graphql::Result<CreateEmployeePayload> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let new_employee = NewEmployee {
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            manager_id: parse_optional_id(&input.manager_id)?,
        };
        let (record, warning) = employees::create(db.as_ref(), &caller, new_employee)
            .await
            .map_err(graphql_error)?;
        Ok(CreateEmployeePayload {
            employee: EmployeeNode::from_record(record),
            warning,
        })
    }

    async fn update_employee(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: EmployeeUpdateInput,
    ) -> async_graphql::Result<EmployeeNode> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let update = UpdateEmployee {
            id: parse_uuid(&id)?,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            manager_id: parse_optional_id(&input.manager_id)?,
            status: input.status.into(),
        };
        let record = employees::update(db.as_ref(), &caller, update)
            .await
            .map_err(graphql_error)?;
        Ok(EmployeeNode::from_record(record))
    }

    async fn delete_employee(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<DeleteEmployeePayload> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let report = employees::soft_delete(db.as_ref(), &caller, parse_uuid(&id)?)
            .await
            .map_err(graphql_error)?;
        Ok(DeleteEmployeePayload {
            ok: true,
            managed_departments: report.managed_departments,
            subordinates: report.subordinates,
        })
    }

    async fn reset_employee_password(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<bool> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        employees::reset_password(db.as_ref(), &caller, parse_uuid(&id)?)
            .await
            .map_err(graphql_error)?;
        Ok(true)
    }

    async fn create_department(
        &self,
        ctx: &Context<'_>,
        input: DepartmentInput,
    ) -> async_graphql::Result<DepartmentNode> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let new_department = NewDepartment {
            name: input.name,
            manager_id: parse_optional_id(&input.manager_id)?,
        };
        let record = departments::create(db.as_ref(), &caller, new_department)
            .await
            .map_err(graphql_error)?;
        Ok(DepartmentNode::from_record(record))
    }

    async fn update_department(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: DepartmentUpdateInput,
    ) -> async_graphql::Result<DepartmentNode> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let update = UpdateDepartment {
            id: parse_uuid(&id)?,
            name: input.name,
            manager_id: parse_optional_id(&input.manager_id)?,
            status: input.status.into(),
        };
        let record = departments::update(db.as_ref(), &caller, update)
            .await
            .map_err(graphql_error)?;
        Ok(DepartmentNode::from_record(record))
    }

    async fn delete_department(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        departments::soft_delete(db.as_ref(), &caller, parse_uuid(&id)?)
            .await
            .map_err(graphql_error)?;
        Ok(true)
    }

    async fn assign_employees(
        &self,
        ctx: &Context<'_>,
        department_id: ID,
        employee_ids: Vec<ID>,
    ) -> async_graphql::Result<AssignEmployeesPayload> {
        let caller = principal(ctx)?;
        let db = database(ctx)?;
        let mut ids = Vec::with_capacity(employee_ids.len());
        for id in &employee_ids {
            ids.push(parse_uuid(id)?);
        }
        let changes =
            departments::assign_employees(db.as_ref(), &caller, parse_uuid(&department_id)?, &ids)
                .await
                .map_err(graphql_error)?;
        Ok(AssignEmployeesPayload {
            created: changes.created,
            reactivated: changes.reactivated,
            deactivated: changes.deactivated,
        })
    }
}

fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Missing database connection"))
}

fn auth_config(ctx: &Context<'_>) -> async_graphql::Result<Arc<AuthConfig>> {
    ctx.data::<Arc<AuthConfig>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Missing auth configuration"))
}

fn principal(ctx: &Context<'_>) -> async_graphql::Result<Principal> {
    ctx.data::<Principal>()
        .cloned()
        .map_err(|_| error_with_code("UNAUTHENTICATED", "Login required"))
}

fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| error_with_code("BAD_REQUEST", "Invalid ID"))
}

fn parse_optional_id(value: &Option<ID>) -> async_graphql::Result<Option<Uuid>> {
    match value {
        None => Ok(None),
        Some(id) => parse_uuid(id).map(Some),
    }
}

fn graphql_error(err: HrError) -> Error {
    let code = err.code();
    Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}

fn error_with_code(code: &'static str, message: impl Into<String>) -> Error {
    Error::new(message).extend_with(|_, e| e.set("code", code))
}

fn append_session_cookie(ctx: &Context<'_>, token: &str, ttl_minutes: i64) {
    let max_age = (ttl_minutes.max(0) * 60).to_string();
    let cookie = if ttl_minutes < 0 {
        format!(
            "{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE
        )
    } else {
        format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, token, max_age
        )
    };
    ctx.append_http_header("Set-Cookie", cookie);
}
