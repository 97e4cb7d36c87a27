//! Repository Interface
//!
//! 검증기가 소비하는 저장소 인터페이스. PostgreSQL 구현은 `db/mod.rs`의
//! `Database`, 테스트/로컬용 구현은 `db/memory.rs`의 `MemoryStore`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{NewAdminAction, RedemptionContext, RedemptionStatus};

/// 사기 점수 계산에 필요한 사용자 활동 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    /// `since` 이후 redeemed_at 이 찍힌 리딤 수
    pub redeemed_since: i64,
    /// 같은 딜에 대한 리딤 행 수 (상태 무관, 현재 건 포함)
    pub same_deal_claims: i64,
    /// `since` 이후 claimed_at 기준 서로 다른 레스토랑 수
    pub restaurants_claimed_since: i64,
}

/// 상태 전이(compare-and-swap) 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// pending → redeemed 전이 성공, 포인트 적립 완료
    Committed { redeemed_at: DateTime<Utc> },
    /// 다른 요청이 먼저 상태를 바꿈. 아무 것도 쓰지 않음
    Conflict {
        status: RedemptionStatus,
        redeemed_at: Option<DateTime<Utc>>,
    },
    /// 딜 상한 도달. 롤백됨
    LimitReached { max_redemptions: i32 },
}

/// commit 입력
#[derive(Debug, Clone, Copy)]
pub struct PendingCommit {
    pub redemption_id: Uuid,
    pub deal_id: Uuid,
    pub user_id: Uuid,
    pub points: i32,
    /// Some 이면 같은 트랜잭션 안에서 딜의 redeemed 건수를 상한과 비교
    pub max_redemptions: Option<i32>,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait RedemptionStore: Send + Sync {
    async fn health_check(&self) -> Result<()>;

    /// QR 토큰으로 리딤 + 딜 + 사용자 조회
    async fn find_by_qr_code(&self, qr_code_data: &str) -> Result<Option<RedemptionContext>>;

    async fn activity_snapshot(
        &self,
        user_id: Uuid,
        deal_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<ActivitySnapshot>;

    /// 딜의 redeemed 건수 (maxRedemptions 검사용)
    async fn count_redeemed_for_deal(&self, deal_id: Uuid) -> Result<i64>;

    async fn record_admin_action(&self, action: &NewAdminAction) -> Result<()>;

    /// `status = 'pending'` 일 때만 redeemed 로 바꾸고 같은 트랜잭션에서 포인트 적립.
    /// 상한이 주어지면 딜 단위로 직렬화한 뒤 검사
    async fn commit_redemption(&self, commit: &PendingCommit) -> Result<CommitOutcome>;

    /// 배지가 없을 때만 부여. 동시 삽입 충돌은 no-op. 새로 부여했으면 true
    async fn grant_badge_once(
        &self,
        user_id: Uuid,
        badge_name: &str,
        points_awarded: i32,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}
