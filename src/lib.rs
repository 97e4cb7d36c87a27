//! Deal Redemption API Library
//!
//! # Overview
//!
//! 레스토랑 딜 QR 리딤 검증 및 사기 점수 계산 백엔드.
//! 스캔된 QR 토큰을 검증해 일회성 할인을 승인하고, 로열티 포인트를
//! 정확히 한 번 적립하며, 첫 리딤 배지를 부여함.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌──────────────────────┐  ┌─────────┐     │
//! │  │ Routes  │─►│ Services             │─►│   DB    │     │
//! │  │         │  │ RedemptionValidator  │  │ PgStore │     │
//! │  │         │  │ FraudDetector        │  │ Memory  │     │
//! │  └─────────┘  └──────────────────────┘  └─────────┘     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 거절 사유 및 HTTP 매핑
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (검증 파이프라인, 사기 점수)
//! - `db`: 저장소 인터페이스 및 구현
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use deal_redemption_api::{routes, AppState, Config, Database};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let app = routes::create_router(AppState::new(Arc::new(db), config));
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::RedemptionError;
pub use db::{Database, MemoryStore, RedemptionStore};
pub use services::{FraudDetector, RedemptionValidator, ValidationPolicy};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RedemptionStore>,
    pub validator: Arc<RedemptionValidator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 설정값으로 검증기 구성
    pub fn new(store: Arc<dyn RedemptionStore>, config: Config) -> Self {
        let detector = FraudDetector::new(
            services::fraud::default_rules(),
            config.fraud_suspicious_threshold,
        );
        tracing::info!(
            rules = ?detector.rules().iter().map(|rule| rule.name).collect::<Vec<_>>(),
            suspicious_threshold = config.fraud_suspicious_threshold,
            block_threshold = config.fraud_block_threshold,
            "fraud detector configured"
        );
        let validator = RedemptionValidator::new(
            store.clone(),
            detector,
            ValidationPolicy::from(&config),
        );

        Self {
            store,
            validator: Arc::new(validator),
            config: Arc::new(config),
        }
    }
}
