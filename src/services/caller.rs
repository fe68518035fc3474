use actix_web::{FromRequest, HttpRequest, dev::Payload, web::Data};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Capability tokens carried by a caller.
pub mod capability {
    pub const REQUEST_CREATE: &str = "time_off_request:create";
    pub const REQUEST_READ_OWN: &str = "time_off_request:read_own";
    pub const REQUEST_READ_TEAM: &str = "time_off_request:read_team";
    pub const REQUEST_READ_ALL: &str = "time_off_request:read_all";
    pub const REQUEST_APPROVE: &str = "time_off_request:approve";
    pub const BALANCE_READ_OWN: &str = "time_off_balance:read_own";
    pub const BALANCE_READ_ALL: &str = "time_off_balance:read_all";
    pub const BALANCE_ADJUST: &str = "time_off_balance:adjust";
    pub const TYPE_READ: &str = "time_off_type:read";
    pub const TYPE_MANAGE: &str = "time_off_type:manage";
}

/// The authenticated caller: an employee id and the capabilities granted to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // employee id
    #[serde(default)]
    pub caps: Vec<String>,
    pub exp: usize,
}

impl Claims {
    pub fn new(employee_id: Uuid, caps: &[&str]) -> Self {
        Self {
            sub: employee_id,
            caps: caps.iter().map(|c| c.to_string()).collect(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        }
    }

    pub fn employee_id(&self) -> Uuid {
        self.sub
    }

    pub fn has(&self, capability: &str) -> bool {
        self.caps.iter().any(|c| c == capability)
    }

    pub fn require(&self, capability: &str) -> Result<(), AppError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "missing capability {capability}"
            )))
        }
    }

    pub fn encode(&self, secret: &str) -> Result<String, AppError> {
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .map_err(|e| AppError::internal_server_error_message(e.to_string()))
    }
}

impl FromRequest for Claims {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let (Some(token), Some(config)) = (token, req.app_data::<Data<Config>>()) else {
            return ready(Err(AppError::Unauthorized));
        };

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            log::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        });

        ready(claims)
    }
}
