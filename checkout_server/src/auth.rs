//! Access tokens.
//!
//! Users sign in with an external identity service, which hands them an HS256-signed JWT. This server only ever
//! validates those tokens with the shared secret in [`AuthConfig`]; it does not manage accounts or passwords.
//! [`TokenIssuer`] exists so that tooling and tests can mint tokens with the same secret.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use checkout_engine::{
    db_types::{Role, UserId},
    gateway::CustomerInfo,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user's id in the identity service.
    pub sub: UserId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Expiry, in seconds since the Unix epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(user_id: UserId, email: &str, name: &str, roles: Vec<Role>) -> Self {
        Self { sub: user_id, email: email.to_string(), name: name.to_string(), phone: None, roles, exp: 0 }
    }

    pub fn user_id(&self) -> UserId {
        self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// The details handed to the payment gateway for this user.
    pub fn customer_info(&self) -> CustomerInfo {
        CustomerInfo { email: self.email.clone(), name: self.name.clone(), phone: self.phone.clone() }
    }
}

/// Handlers can take `JwtClaims` as an argument. The claims are placed in the request by
/// [`crate::middleware::JwtMiddlewareFactory`], so this only succeeds on routes wrapped by it.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
    // Anyone can sign with an empty secret
    has_secret: bool,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal();
        let key = DecodingKey::from_secret(secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation, has_secret: !secret.is_empty() }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        if !self.has_secret {
            return Err(AuthError::ValidationError("No token secret has been configured".into()));
        }
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔐️ Validated access token for user #{}", data.claims.sub);
        Ok(data.claims)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, mut claims: JwtClaims, expiry: DateTime<Utc>) -> Result<String, ServerError> {
        claims.exp = expiry.timestamp();
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| ServerError::BackendError(format!("Could not sign access token. {e}")))
    }
}
