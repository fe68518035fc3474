use actix_web::HttpResponse;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self::success(data))
    }

    pub fn created(data: T) -> HttpResponse {
        HttpResponse::Created().json(Self::success(data))
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    pub fn year_or_current(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }
}
