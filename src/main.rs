//! Deal Redemption API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Restaurant scanner app / staff tools            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  POST /validate-redemption
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │  Routes: /health  /validate-redemption                  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │  Services: RedemptionValidator  FraudDetector           ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │  Data: PostgreSQL (redemptions, users, audit, badges)   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deal_redemption_api::{routes, AppState, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "deal_redemption_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Deal Redemption API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        block_threshold = config.fraud_block_threshold,
        suspicious_threshold = config.fraud_suspicious_threshold,
        enforce_max_redemptions = config.enforce_max_redemptions,
        "Configuration loaded"
    );

    // 데이터베이스 연결
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("Migrations completed");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(Arc::new(db), config);
    let app = routes::create_router(state);

    // 서버 시작
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
