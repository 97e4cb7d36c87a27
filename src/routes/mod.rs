//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//!
//! ```text
//! GET  /health               - 서버 및 DB 상태 확인
//! POST /validate-redemption  - QR 스캔 리딤 검증
//! ```

pub mod health;
pub mod redemption;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// 라우터 생성
///
/// CORS 는 모든 origin 허용. 스캐너 앱이 여러 도메인에서 호출함.
/// OPTIONS preflight 는 CorsLayer 가 빈 200 으로 응답
///
/// CorsLayer 는 Allow-Headers 를 preflight 에만 붙이므로 일반 응답에는
/// SetResponseHeaderLayer 로 같은 목록을 추가
pub fn create_router(state: AppState) -> Router {
    let allowed_headers = [
        header::AUTHORIZATION,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
        header::CONTENT_TYPE,
    ];
    let allowed_headers_value = HeaderValue::from_static("authorization, x-client-info, apikey, content-type");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Redemption
        .route("/validate-redemption", post(redemption::validate_redemption))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            allowed_headers_value,
        ))

        // 상태 주입
        .with_state(state)
}
