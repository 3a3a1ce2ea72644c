use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Header carrying the verified user id, injected by the gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified role claim, injected by the gateway.
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Author,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Author => "AUTHOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role claim '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.strip_prefix("ROLE_").unwrap_or(&normalized) {
            "USER" => Ok(Role::User),
            "AUTHOR" => Ok(Role::Author),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }
}

/// Verified claims about the caller of a request.
///
/// Construction fails closed: anything other than a well-formed user id produces an
/// anonymous identity, and an unrecognized role claim produces no role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    user_id: Option<UserId>,
    role: Option<Role>,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: UserId, role: Option<Role>) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .and_then(|value| value.parse::<UserId>().ok());

        let Some(user_id) = user_id else {
            return Self::anonymous();
        };

        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Role>().ok());

        Self::authenticated(user_id, role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        if self.is_authenticated() {
            self.role
        } else {
            None
        }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(&role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&[Role::Admin])
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Claims projection returned to callers asking who they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerInfo {
    pub user_id: UserId,
    pub role: Option<Role>,
}
