//! Error Handling Module
//!
//! Rejection taxonomy of the redemption validator with HTTP status mapping.
//! Every failure is rendered as `{ valid: false, error, error_code, ...context }`.
//! Infrastructure errors are logged server-side and never leak to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{ErrorCode, FraudSignal};

/// 리딤 검증 에러
///
/// # Design Decision
///
/// - 클라이언트 입력 에러 / 비즈니스 규칙 위반: 4xx, 메시지 그대로 노출 가능
/// - 사기 차단: 403, 직원용 화면을 위해 전체 FraudSignal 포함
/// - 인프라 에러: 500, 일반 메시지만 반환
#[derive(Debug, Error)]
pub enum RedemptionError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("This QR code belongs to a different restaurant")]
    RestaurantMismatch,

    #[error("This deal has already been redeemed")]
    AlreadyRedeemed { redeemed_at: Option<DateTime<Utc>> },

    #[error("This deal has expired")]
    DealExpired { expired_at: Option<DateTime<Utc>> },

    #[error("This deal has reached its redemption limit")]
    RedemptionLimitReached { max_redemptions: i32 },

    // ============ 403 Forbidden ============
    #[error("Redemption blocked: suspicious activity detected")]
    FraudSuspected { fraud_check: FraudSignal },

    // ============ 404 Not Found ============
    #[error("Invalid QR code")]
    QrNotFound,

    // ============ 500 Internal Server Error ============
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl RedemptionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RedemptionError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RedemptionError::RestaurantMismatch => ErrorCode::RestaurantMismatch,
            RedemptionError::AlreadyRedeemed { .. } => ErrorCode::AlreadyRedeemed,
            RedemptionError::DealExpired { .. } => ErrorCode::DealExpired,
            RedemptionError::RedemptionLimitReached { .. } => ErrorCode::RedemptionLimitReached,
            RedemptionError::FraudSuspected { .. } => ErrorCode::FraudSuspected,
            RedemptionError::QrNotFound => ErrorCode::QrNotFound,
            RedemptionError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code().status()
    }
}

/// 실패 응답 구조
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub valid: bool,
    pub error: String,
    pub error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redemptions: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_check: Option<FraudSignal>,
}

impl From<&RedemptionError> for ErrorResponse {
    fn from(err: &RedemptionError) -> Self {
        let mut body = ErrorResponse {
            valid: false,
            error: err.to_string(),
            error_code: err.code(),
            redeemed_at: None,
            expired_at: None,
            max_redemptions: None,
            fraud_check: None,
        };

        match err {
            RedemptionError::AlreadyRedeemed { redeemed_at } => {
                body.redeemed_at = redeemed_at.map(|at| at.to_rfc3339());
            }
            RedemptionError::DealExpired { expired_at } => {
                body.expired_at = expired_at.map(|at| at.to_rfc3339());
            }
            RedemptionError::RedemptionLimitReached { max_redemptions } => {
                body.max_redemptions = Some(*max_redemptions);
            }
            RedemptionError::FraudSuspected { fraud_check } => {
                body.fraud_check = Some(fraud_check.clone());
            }
            RedemptionError::Internal(inner) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!(error = ?inner, "redemption validation failed");
            }
            RedemptionError::InvalidRequest(_)
            | RedemptionError::RestaurantMismatch
            | RedemptionError::QrNotFound => {}
        }

        body
    }
}

impl IntoResponse for RedemptionError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from(&self);
        (self.status(), Json(body)).into_response()
    }
}
