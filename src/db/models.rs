//! Database Models
//!
//! Redemption ledger, deals and loyalty accounts as seen by the validator.
//! Redemptions are created elsewhere (deal claim flow); this service only
//! moves them from `pending` to `redeemed`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// 할인율이 비어 있는 딜의 기본 할인율 (%)
pub const DEFAULT_DISCOUNT_PERCENT: f64 = 10.0;

/// 첫 리딤 배지 이름
pub const FIRST_REDEMPTION_BADGE: &str = "first_redemption";

/// 첫 리딤 배지에 기록되는 보너스 포인트
///
/// 배지 레코드에만 기록되고 사용자 잔액에는 더해지지 않음
pub const FIRST_REDEMPTION_BONUS: i32 = 50;

/// 리딤 상태
///
/// pending → redeemed, pending → expired 만 허용. redeemed/expired 는 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionStatus {
    Pending,
    Redeemed,
    Expired,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Redeemed => "redeemed",
            RedemptionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RedemptionStatus::Pending)
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown redemption status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RedemptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RedemptionStatus::Pending),
            "redeemed" => Ok(RedemptionStatus::Redeemed),
            "expired" => Ok(RedemptionStatus::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// 딜 리딤 레코드 (QR 토큰 1개당 1행)
#[derive(Debug, Clone)]
pub struct Redemption {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub user_id: Uuid,
    pub status: RedemptionStatus,
    pub claimed_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
    /// 스캔 토큰. 발급 후 변경 불가, 전역 유일
    pub qr_code_data: String,
}

/// 레스토랑이 발행한 기간 한정 할인
#[derive(Debug, Clone)]
pub struct Deal {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub title: String,
    /// 0..=100, 없으면 10%
    pub discount_percent: Option<f64>,
    /// 없으면 만료 없음
    pub expiry_datetime: Option<DateTime<Utc>>,
    pub max_redemptions: Option<i32>,
}

impl Deal {
    /// 실제 적용되는 할인율
    pub fn effective_discount(&self) -> f64 {
        self.discount_percent
            .unwrap_or(DEFAULT_DISCOUNT_PERCENT)
            .clamp(0.0, 100.0)
    }

    /// 적립 포인트 = floor(할인율 × 2)
    pub fn points_earned(&self) -> i32 {
        (self.effective_discount() * 2.0).floor() as i32
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_datetime.is_some_and(|expiry| expiry < now)
    }
}

/// 로열티 계정
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub points: i32,
    pub streak_count: i32,
    pub created_at: DateTime<Utc>,
}

/// QR 토큰으로 조회한 리딤 + 딜 + 사용자 조인 결과
#[derive(Debug, Clone)]
pub struct RedemptionContext {
    pub redemption: Redemption,
    pub deal: Deal,
    pub user: UserAccount,
}

/// 감사 로그 항목 (append-only)
#[derive(Debug, Clone)]
pub struct NewAdminAction {
    pub admin_id: Uuid,
    pub action_type: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub details: serde_json::Value,
}

/// 배지 부여 기록. (user_id, badge_name) 유일
#[derive(Debug, Clone)]
pub struct Badge {
    pub user_id: Uuid,
    pub badge_name: String,
    pub points_awarded: i32,
    pub granted_at: DateTime<Utc>,
}
