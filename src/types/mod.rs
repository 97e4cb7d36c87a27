//! Common Types Module
//!
//! 검증 응답 전반에서 사용되는 공통 타입 정의

use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// 기계가 읽을 수 있는 거절 사유 코드
///
/// 직렬화 시 `QR_NOT_FOUND` 형태의 SCREAMING_SNAKE_CASE 사용
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    QrNotFound,
    RestaurantMismatch,
    AlreadyRedeemed,
    DealExpired,
    RedemptionLimitReached,
    FraudSuspected,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::QrNotFound => "QR_NOT_FOUND",
            ErrorCode::RestaurantMismatch => "RESTAURANT_MISMATCH",
            ErrorCode::AlreadyRedeemed => "ALREADY_REDEEMED",
            ErrorCode::DealExpired => "DEAL_EXPIRED",
            ErrorCode::RedemptionLimitReached => "REDEMPTION_LIMIT_REACHED",
            ErrorCode::FraudSuspected => "FRAUD_SUSPECTED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP 상태 코드 매핑
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::QrNotFound => StatusCode::NOT_FOUND,
            ErrorCode::FraudSuspected => StatusCode::FORBIDDEN,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InvalidRequest
            | ErrorCode::RestaurantMismatch
            | ErrorCode::AlreadyRedeemed
            | ErrorCode::DealExpired
            | ErrorCode::RedemptionLimitReached => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 한 번의 검증 시도에 대한 위험 평가 결과
///
/// 저장되지 않음. 차단 시 감사 로그에만 기록됨
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudSignal {
    pub is_suspicious: bool,
    /// 발동한 규칙의 설명 (규칙 등록 순서)
    pub reasons: Vec<String>,
    /// 0..=100
    pub risk_score: u8,
}

impl FraudSignal {
    pub fn clean() -> Self {
        Self {
            is_suspicious: false,
            reasons: Vec::new(),
            risk_score: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_names() {
        let json = serde_json::to_string(&ErrorCode::QrNotFound).unwrap();
        assert_eq!(json, "\"QR_NOT_FOUND\"");
        assert_eq!(ErrorCode::RedemptionLimitReached.to_string(), "REDEMPTION_LIMIT_REACHED");
    }

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::QrNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::RestaurantMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AlreadyRedeemed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::DealExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::FraudSuspected.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InternalError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_fraud_signal_serializes_snake_case() {
        let signal = FraudSignal {
            is_suspicious: true,
            reasons: vec!["burst".to_string()],
            risk_score: 70,
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["is_suspicious"], true);
        assert_eq!(value["risk_score"], 70);
        assert_eq!(value["reasons"][0], "burst");
    }
}
