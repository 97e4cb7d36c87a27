//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `FraudDetector`: 규칙 기반 사기 점수 계산
//! - `RedemptionValidator`: QR 리딤 검증 파이프라인

pub mod fraud;
mod validator;

pub use fraud::{FraudContext, FraudDetector, FraudRule};
pub use validator::{
    RedemptionRequest, RedemptionSuccess, RedemptionValidator, ValidationPolicy,
    DEFAULT_BLOCK_THRESHOLD,
};
