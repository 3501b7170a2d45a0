//! Identity/account operations backed by the account tables.
//!
//! Every function is generic over [`ConnectionTrait`] so callers can run it
//! inside their own transaction; record mutations and the role
//! reconciliation they trigger commit or roll back as one unit.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Duration, TimeZone, Utc};
use entity::{account, account_role, account_secret};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::auth::Role;
use crate::error::HrError;

/// Default credential assigned to newly provisioned and reset accounts.
/// Preserved verbatim from the system this service replaces; a well-known
/// shared default is a documented anti-pattern, not a recommendation.
pub const DEFAULT_PASSWORD: &str = "Password123#";

const RESET_TOKEN_TTL_HOURS: i64 = 24;
const RESET_TOKEN_LEN: usize = 32;

/// Timestamp used for permanent lockout: the latest value that survives a
/// round trip through every backend we store timestamps in.
pub fn permanent_lockout() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .expect("valid lockout timestamp")
}

pub async fn find_account_by_email<C>(
    conn: &C,
    email: &str,
) -> Result<Option<account::Model>, HrError>
where
    C: ConnectionTrait,
{
    let found = account::Entity::find()
        .filter(account::Column::Email.eq(email))
        .one(conn)
        .await?;
    Ok(found)
}

pub async fn create_account<C>(
    conn: &C,
    email: &str,
    employee_id: Option<Uuid>,
    initial_password: &str,
) -> Result<Uuid, HrError>
where
    C: ConnectionTrait,
{
    if find_account_by_email(conn, email).await?.is_some() {
        return Err(HrError::account(format!(
            "account with email {} already exists",
            email
        )));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let account_id = Uuid::new_v4();
    account::ActiveModel {
        id: Set(account_id),
        email: Set(email.to_string()),
        employee_id: Set(employee_id),
        locked_until: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    account_secret::ActiveModel {
        account_id: Set(account_id),
        password_hash: Set(hash_password(initial_password)?),
        reset_token_hash: Set(None),
        reset_token_expires: Set(None),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(account_id)
}

pub async fn has_role<C>(conn: &C, account_id: Uuid, role: Role) -> Result<bool, HrError>
where
    C: ConnectionTrait,
{
    let count = account_role::Entity::find()
        .filter(account_role::Column::AccountId.eq(account_id))
        .filter(account_role::Column::Role.eq(account_role::Role::from(role)))
        .count(conn)
        .await?;
    Ok(count > 0)
}

pub async fn assign_role<C>(conn: &C, account_id: Uuid, role: Role) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    if has_role(conn, account_id, role).await? {
        return Ok(());
    }
    account_role::ActiveModel {
        account_id: Set(account_id),
        role: Set(account_role::Role::from(role)),
    }
    .insert(conn)
    .await?;
    Ok(())
}

pub async fn remove_role<C>(conn: &C, account_id: Uuid, role: Role) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    account_role::Entity::delete_many()
        .filter(account_role::Column::AccountId.eq(account_id))
        .filter(account_role::Column::Role.eq(account_role::Role::from(role)))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn load_roles<C>(conn: &C, account_id: Uuid) -> Result<Vec<Role>, HrError>
where
    C: ConnectionTrait,
{
    let rows = account_role::Entity::find()
        .filter(account_role::Column::AccountId.eq(account_id))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| Role::from(row.role)).collect())
}

pub async fn lock_account<C>(
    conn: &C,
    account_id: Uuid,
    until: DateTime<Utc>,
) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    let stored = account::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| HrError::account("account to lock does not exist"))?;
    let mut active: account::ActiveModel = stored.into();
    active.locked_until = Set(Some(until.into()));
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

pub fn is_locked(account: &account::Model) -> bool {
    account
        .locked_until
        .map(|until| until > Utc::now())
        .unwrap_or(false)
}

/// Issues a single-use reset token for the account. Only the argon2 hash of
/// the token is stored; the plaintext goes to the caller once.
pub async fn generate_reset_token<C>(conn: &C, account_id: Uuid) -> Result<String, HrError>
where
    C: ConnectionTrait,
{
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect();
    let secret = account_secret::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| HrError::account("account has no credential record"))?;
    let mut active: account_secret::ActiveModel = secret.into();
    active.reset_token_hash = Set(Some(hash_password(&token)?));
    active.reset_token_expires =
        Set(Some((Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS)).into()));
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(token)
}

pub async fn reset_password<C>(
    conn: &C,
    account_id: Uuid,
    token: &str,
    new_password: &str,
) -> Result<(), HrError>
where
    C: ConnectionTrait,
{
    let secret = account_secret::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| HrError::account("account has no credential record"))?;
    let Some(token_hash) = secret.reset_token_hash.clone() else {
        return Err(HrError::account("no reset token has been issued"));
    };
    let expired = secret
        .reset_token_expires
        .map(|at| at < Utc::now())
        .unwrap_or(true);
    if expired || !verify_password(token, &token_hash) {
        return Err(HrError::account("reset token is invalid or expired"));
    }
    let mut active: account_secret::ActiveModel = secret.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.reset_token_hash = Set(None);
    active.reset_token_expires = Set(None);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, HrError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| HrError::account(format!("hash error: {}", err)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
