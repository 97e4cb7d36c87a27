//! Redemption Endpoint
//!
//! Restaurant staff scan a customer's QR code; this endpoint authorizes the
//! one-time discount and credits loyalty points.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::RedemptionError,
    services::{RedemptionRequest, RedemptionSuccess},
    types::FraudSignal,
    AppState,
};

// ============ Request/Response Types ============

/// 리딤 검증 요청
///
/// 누락 필드를 INVALID_REQUEST 로 응답하기 위해 모두 Option 으로 받음
#[derive(Debug, Deserialize)]
pub struct ValidateRedemptionRequest {
    /// 스캔된 QR 토큰
    pub qr_code_data: Option<String>,
    /// 스캔한 레스토랑
    pub restaurant_id: Option<String>,
    /// 스캔한 직원 (감사 로그용)
    pub staff_user_id: Option<String>,
}

impl ValidateRedemptionRequest {
    pub fn into_request(self) -> Result<RedemptionRequest, RedemptionError> {
        // 토큰은 불투명 값. 공백만 있는 경우만 거절하고 원문 그대로 조회
        let qr_code_data = self
            .qr_code_data
            .filter(|qr| !qr.trim().is_empty())
            .ok_or_else(|| RedemptionError::InvalidRequest("qr_code_data is required".to_string()))?;

        let restaurant_id = self
            .restaurant_id
            .ok_or_else(|| RedemptionError::InvalidRequest("restaurant_id is required".to_string()))?;
        let restaurant_id = parse_id("restaurant_id", &restaurant_id)?;

        let staff_user_id = self
            .staff_user_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| parse_id("staff_user_id", &id))
            .transpose()?;

        Ok(RedemptionRequest {
            qr_code_data,
            restaurant_id,
            staff_user_id,
        })
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, RedemptionError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| RedemptionError::InvalidRequest(format!("{} must be a UUID", field)))
}

/// 리딤 성공 응답
#[derive(Debug, Serialize)]
pub struct ValidateRedemptionResponse {
    pub valid: bool,
    pub redemption_id: Uuid,
    pub deal: DealSummary,
    pub user: UserSummary,
    pub redeemed_at: String,
    /// 차단되지 않은 경우에도 검토용으로 포함
    pub fraud_check: FraudSignal,
    pub badge_awarded: bool,
}

#[derive(Debug, Serialize)]
pub struct DealSummary {
    pub title: String,
    pub discount_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub points_earned: i32,
}

impl From<RedemptionSuccess> for ValidateRedemptionResponse {
    fn from(success: RedemptionSuccess) -> Self {
        Self {
            valid: true,
            redemption_id: success.redemption_id,
            deal: DealSummary {
                title: success.deal_title,
                discount_percent: success.discount_percent,
            },
            user: UserSummary {
                name: success.user_name,
                points_earned: success.points_earned,
            },
            redeemed_at: success.redeemed_at.to_rfc3339(),
            fraud_check: success.fraud_check,
            badge_awarded: success.badge_awarded,
        }
    }
}

// ============ Handlers ============

/// POST /validate-redemption
///
/// # Flow
///
/// 1. 요청 파싱 (실패 시 INVALID_REQUEST)
/// 2. `RedemptionValidator` 파이프라인 실행
/// 3. 성공 200 / 거절 4xx / 내부 오류 500 (모두 JSON)
///
/// # Response
///
/// ```json
/// {
///   "valid": true,
///   "redemption_id": "5b0c...",
///   "deal": { "title": "Tteokbokki combo", "discount_percent": 25.0 },
///   "user": { "name": "Jiwoo", "points_earned": 50 },
///   "redeemed_at": "2024-05-01T12:00:00+00:00",
///   "fraud_check": { "is_suspicious": false, "reasons": [], "risk_score": 0 },
///   "badge_awarded": true
/// }
/// ```
pub async fn validate_redemption(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRedemptionRequest>, JsonRejection>,
) -> Result<Json<ValidateRedemptionResponse>, RedemptionError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "malformed redemption request");
        RedemptionError::InvalidRequest(rejection.body_text())
    })?;
    let req = body.into_request()?;

    let result = state.validator.validate(&req).await;
    if let Err(err) = &result {
        tracing::info!(error_code = %err.code(), qr_code = %req.qr_code_data, "redemption rejected");
    }

    Ok(Json(result?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(qr: Option<&str>, restaurant: Option<&str>, staff: Option<&str>) -> ValidateRedemptionRequest {
        ValidateRedemptionRequest {
            qr_code_data: qr.map(str::to_string),
            restaurant_id: restaurant.map(str::to_string),
            staff_user_id: staff.map(str::to_string),
        }
    }

    const RESTAURANT: &str = "0d9f3a7e-8a52-4d8c-9f0e-3c1b2a4d5e6f";

    #[test]
    fn test_valid_request() {
        let req = body(Some("QR-123"), Some(RESTAURANT), None).into_request().unwrap();
        assert_eq!(req.qr_code_data, "QR-123");
        assert_eq!(req.restaurant_id.to_string(), RESTAURANT);
        assert!(req.staff_user_id.is_none());
    }

    #[test]
    fn test_qr_code_is_not_normalized() {
        let req = body(Some(" QR-123 "), Some(RESTAURANT), None).into_request().unwrap();
        assert_eq!(req.qr_code_data, " QR-123 ");
    }

    #[test]
    fn test_missing_or_empty_qr_code() {
        assert!(matches!(
            body(None, Some(RESTAURANT), None).into_request(),
            Err(RedemptionError::InvalidRequest(_))
        ));
        assert!(matches!(
            body(Some("   "), Some(RESTAURANT), None).into_request(),
            Err(RedemptionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_bad_ids() {
        assert!(body(Some("QR"), None, None).into_request().is_err());
        assert!(body(Some("QR"), Some("restaurant-7"), None).into_request().is_err());
        assert!(body(Some("QR"), Some(RESTAURANT), Some("staff")).into_request().is_err());
        // 빈 staff_user_id 는 없는 것으로 취급
        assert!(body(Some("QR"), Some(RESTAURANT), Some("")).into_request().is_ok());
    }
}
