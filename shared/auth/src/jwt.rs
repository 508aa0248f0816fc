use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{Duration, Utc};
use mentorbridge_common::{AppError, JwtConfig, Principal, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours as i64);

        Self {
            sub: user_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }

    pub fn principal(&self) -> Result<Principal, AppError> {
        let user_id = Uuid::parse_str(&self.sub)
            .map_err(|e| AppError::Authentication(format!("Invalid user ID in token: {}", e)))?;
        Ok(Principal::new(user_id, self.role))
    }
}

/// Issues and validates the bearer tokens minted by the identity service.
/// The booking service only ever validates; issuing is kept for tooling and tests.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config: config.clone(),
        }
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn issue_for(&self, principal: &Principal) -> Result<String, AppError> {
        let claims = Claims::new(principal.user_id, principal.role, &self.config);
        self.generate_token(&claims)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }

    pub fn principal_from_token(&self, token: &str) -> Result<Principal, AppError> {
        self.validate_token(token)?.principal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 1,
            issuer: "mentorbridge".to_string(),
        }
    }

    #[test]
    fn issued_token_yields_same_principal() {
        let service = JwtService::new(&config());
        let principal = Principal::new(Uuid::new_v4(), UserRole::Mentor);

        let token = service.issue_for(&principal).unwrap();
        assert_eq!(service.principal_from_token(&token).unwrap(), principal);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = JwtService::new(&JwtConfig {
            secret: "another-secret".to_string(),
            ..config()
        });
        let token = issuer
            .issue_for(&Principal::new(Uuid::new_v4(), UserRole::Admin))
            .unwrap();

        let verifier = JwtService::new(&config());
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new(&config());
        let mut claims = Claims::new(Uuid::new_v4(), UserRole::Mentee, &config());
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();

        let token = service.generate_token(&claims).unwrap();
        assert!(service.validate_token(&token).is_err());
    }
}
