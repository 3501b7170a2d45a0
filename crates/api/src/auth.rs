use chrono::{Duration, Utc};
use entity::account_role;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "hr_session";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub roles: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

/// HR roles are a plain set, not a hierarchy: an HR administrator is not
/// implicitly a manager and vice versa.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    HrAdministrator,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::HrAdministrator => "HR_ADMINISTRATOR",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "HR_ADMINISTRATOR" => Some(Role::HrAdministrator),
            "MANAGER" => Some(Role::Manager),
            "EMPLOYEE" => Some(Role::Employee),
            _ => None,
        }
    }
}

impl From<account_role::Role> for Role {
    fn from(value: account_role::Role) -> Self {
        match value {
            account_role::Role::HrAdministrator => Role::HrAdministrator,
            account_role::Role::Manager => Role::Manager,
            account_role::Role::Employee => Role::Employee,
        }
    }
}

impl From<Role> for account_role::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::HrAdministrator => account_role::Role::HrAdministrator,
            Role::Manager => account_role::Role::Manager,
            Role::Employee => account_role::Role::Employee,
        }
    }
}

/// The authenticated caller: role set plus the optional employee record the
/// account is linked to. Threaded explicitly into every service call; no
/// service reads the current user from ambient state.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_hr_admin(&self) -> bool {
        self.has_role(Role::HrAdministrator)
    }
}

pub fn issue_token(
    account_id: Uuid,
    roles: &[Role],
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.session_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: account_id,
        roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
}

pub fn decode_token(
    token: &str,
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<SessionClaims> {
    jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &Validation::default())
        .map(|data| data.claims)
}
