//! Verified identity extraction
//!
//! Authentication happens upstream. The proxy in front of saged sets
//! `x-verified-user` (and optionally `x-verified-name`); requests without it
//! never reach a progress route.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sage_common::{Identity, UserId};

use crate::api_error::ApiError;

pub const USER_HEADER: &str = "x-verified-user";
pub const NAME_HEADER: &str = "x-verified-name";

/// Identity of the caller, taken from the verified headers
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub Identity);

impl VerifiedUser {
    pub fn user_id(&self) -> &UserId {
        &self.0.user_id
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header(parts, USER_HEADER).ok_or(ApiError::Unauthenticated)?;
        let user_id = UserId::new(raw).map_err(|_| ApiError::Unauthenticated)?;

        let mut identity = Identity::new(user_id);
        if let Some(name) = header(parts, NAME_HEADER) {
            identity = identity.with_display_name(name);
        }
        Ok(VerifiedUser(identity))
    }
}
