use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::errors::AppError;
use crate::models::User;

/// Signing settings for console session tokens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl SessionConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn encode(&self, user: &User) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user.id.clone(),
            roles: user.roles.clone(),
            permissions: user.direct_permissions().to_vec(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Accepts a raw token or an `Authorization` header value.
    pub fn authenticate(&self, credentials: &str) -> Result<Session, AppError> {
        let token = credentials.strip_prefix("Bearer ").unwrap_or(credentials).trim();
        if token.is_empty() {
            return Err(AppError::unauthorized("session token missing"));
        }

        let claims = self.decode(token)?;
        Ok(Session {
            token: token.to_string(),
            claims,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn user(&self) -> User {
        let user = User::new(self.sub.clone()).with_roles(self.roles.iter().cloned());
        if self.permissions.is_empty() {
            user
        } else {
            user.with_permissions(self.permissions.iter().cloned())
        }
    }
}

/// A signed-in console user.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: Claims,
}

impl Session {
    pub fn user(&self) -> User {
        self.claims.user()
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_user() {
        let config = SessionConfig::new("test-secret", 1);
        let user = User::new("u-7")
            .with_roles(["master_data_editor"])
            .with_permissions(["dashboard.view"]);

        let token = config.encode(&user).expect("encodes");
        let session = config
            .authenticate(&format!("Bearer {token}"))
            .expect("valid session");
        assert_eq!(session.user(), user);
        assert_eq!(session.authorization_header(), format!("Bearer {token}"));
    }

    #[test]
    fn user_without_grants_stays_without_grants() {
        let config = SessionConfig::new("test-secret", 1);
        let user = User::new("u-8").with_roles(["viewer"]);
        let token = config.encode(&user).expect("encodes");
        assert_eq!(config.authenticate(&token).expect("valid").user(), user);
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let ours = SessionConfig::new("ours", 1);
        let theirs = SessionConfig::new("theirs", 1);
        let token = theirs.encode(&User::new("u")).expect("encodes");
        assert!(matches!(ours.authenticate(&token), Err(AppError::Token(_))));

        let expired = SessionConfig::new("ours", -2);
        let token = expired.encode(&User::new("u")).expect("encodes");
        assert!(matches!(ours.authenticate(&token), Err(AppError::Token(_))));

        assert!(matches!(ours.authenticate("Bearer "), Err(AppError::Unauthorized(_))));
    }
}
