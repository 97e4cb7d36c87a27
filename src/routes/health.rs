//! Health Check Endpoint
//!
//! 스캐너 앱과 배포 환경이 리딤 저장소까지 닿는지 확인하는 용도.
//! 저장소가 응답하지 않아도 200 을 돌려주고 `status: "degraded"` 로 표시함.
//! 이 상태에서 `/validate-redemption` 은 INTERNAL_ERROR 를 반환하게 됨.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// GET /health 응답
#[derive(Serialize)]
pub struct HealthResponse {
    /// "healthy" | "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub environment: &'static str,
    pub database: StoreStatus,
    /// 적용 중인 차단 임계값 (스캐너 운영 화면 표시용)
    pub fraud_block_threshold: u8,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = std::time::Instant::now();
    let database = match state.store.health_check().await {
        Ok(()) => StoreStatus {
            connected: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(err) => {
            tracing::warn!(error = ?err, "redemption store unreachable");
            StoreStatus {
                connected: false,
                latency_ms: None,
            }
        }
    };

    Json(HealthResponse {
        status: if database.connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.as_str(),
        database,
        fraud_block_threshold: state.config.fraud_block_threshold,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
