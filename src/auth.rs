use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use ulid::Ulid;

use crate::engine::{Caller, Engine, EngineError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

/// Turns request headers into an authenticated [`Caller`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, headers: &HeaderMap) -> Result<Caller, EngineError>;
}

/// Trusts an upstream gateway that has already authenticated the user and
/// forwards their id. Role and email always come from the directory, never
/// from the request.
pub struct GatewayIdentity {
    engine: Arc<Engine>,
    token: Option<String>,
}

impl GatewayIdentity {
    pub fn new(engine: Arc<Engine>, token: Option<String>) -> Self {
        Self { engine, token }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

#[async_trait]
impl IdentityProvider for GatewayIdentity {
    async fn identify(&self, headers: &HeaderMap) -> Result<Caller, EngineError> {
        if let Some(expected) = &self.token
            && header(headers, GATEWAY_TOKEN_HEADER) != Some(expected.as_str())
        {
            return Err(EngineError::Unauthenticated("missing or wrong gateway token"));
        }
        let id: Ulid = header(headers, USER_ID_HEADER)
            .ok_or(EngineError::Unauthenticated("missing user id"))?
            .parse()
            .map_err(|_| EngineError::Unauthenticated("malformed user id"))?;
        let user = self
            .engine
            .find_user(&id)
            .ok_or(EngineError::Unauthenticated("unknown user"))?;
        Ok(Caller::from(&user))
    }
}
