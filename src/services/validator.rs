//! Redemption Validator
//!
//! Resolves a scanned QR token, enforces eligibility, scores fraud and commits
//! the one-time redemption.
//!
//! # Pipeline
//!
//! ```text
//! lookup ─► restaurant ─► already redeemed ─► expiry ─► (cap) ─► fraud ─► commit
//!   404        400              400             400       400     403
//! ```
//!
//! 앞 단계가 실패하면 즉시 반환. commit 전까지 어떤 쓰기도 하지 않음
//! (사기 차단 시 감사 로그 append 만 예외).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{
    CommitOutcome, NewAdminAction, PendingCommit, RedemptionContext, RedemptionStatus,
    RedemptionStore, FIRST_REDEMPTION_BADGE, FIRST_REDEMPTION_BONUS,
};
use crate::error::RedemptionError;
use crate::services::fraud::{FraudContext, FraudDetector};
use crate::types::FraudSignal;

/// 기본 차단 임계값. suspicious 이고 이 값을 초과하면 차단
pub const DEFAULT_BLOCK_THRESHOLD: u8 = 80;

const FRAUD_ACTION_TYPE: &str = "fraud_detection";
const FRAUD_TARGET_TYPE: &str = "deal_redemption";

/// 검증 정책
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub block_threshold: u8,
    pub enforce_max_redemptions: bool,
    pub system_actor_id: Uuid,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            enforce_max_redemptions: false,
            system_actor_id: Uuid::nil(),
        }
    }
}

impl From<&Config> for ValidationPolicy {
    fn from(config: &Config) -> Self {
        Self {
            block_threshold: config.fraud_block_threshold,
            enforce_max_redemptions: config.enforce_max_redemptions,
            system_actor_id: config.system_actor_id,
        }
    }
}

/// 파싱이 끝난 검증 요청
#[derive(Debug, Clone)]
pub struct RedemptionRequest {
    pub qr_code_data: String,
    pub restaurant_id: Uuid,
    pub staff_user_id: Option<Uuid>,
}

/// 검증 성공 결과
#[derive(Debug, Clone)]
pub struct RedemptionSuccess {
    pub redemption_id: Uuid,
    pub deal_title: String,
    pub discount_percent: f64,
    pub user_name: String,
    pub points_earned: i32,
    pub redeemed_at: DateTime<Utc>,
    /// 차단 임계값 이하의 참고용 평가
    pub fraud_check: FraudSignal,
    pub badge_awarded: bool,
}

pub struct RedemptionValidator {
    store: Arc<dyn RedemptionStore>,
    detector: FraudDetector,
    policy: ValidationPolicy,
}

impl RedemptionValidator {
    pub fn new(
        store: Arc<dyn RedemptionStore>,
        detector: FraudDetector,
        policy: ValidationPolicy,
    ) -> Self {
        Self {
            store,
            detector,
            policy,
        }
    }

    pub async fn validate(
        &self,
        req: &RedemptionRequest,
    ) -> Result<RedemptionSuccess, RedemptionError> {
        self.validate_at(req, Utc::now()).await
    }

    /// `now` 기준으로 검증 (만료/버스트 윈도우 계산에 사용)
    #[tracing::instrument(skip(self, req, now), fields(qr_code = %req.qr_code_data, restaurant_id = %req.restaurant_id))]
    pub async fn validate_at(
        &self,
        req: &RedemptionRequest,
        now: DateTime<Utc>,
    ) -> Result<RedemptionSuccess, RedemptionError> {
        // 1. Lookup
        let ctx = self
            .store
            .find_by_qr_code(&req.qr_code_data)
            .await?
            .ok_or(RedemptionError::QrNotFound)?;

        // 2. Restaurant match
        if ctx.deal.restaurant_id != req.restaurant_id {
            tracing::info!(deal_restaurant = %ctx.deal.restaurant_id, "restaurant mismatch");
            return Err(RedemptionError::RestaurantMismatch);
        }

        // 3. Already redeemed / 4. Expired
        match ctx.redemption.status {
            RedemptionStatus::Redeemed => {
                return Err(RedemptionError::AlreadyRedeemed {
                    redeemed_at: ctx.redemption.redeemed_at,
                });
            }
            RedemptionStatus::Expired => {
                return Err(RedemptionError::DealExpired {
                    expired_at: ctx.deal.expiry_datetime,
                });
            }
            RedemptionStatus::Pending => {}
        }
        if ctx.deal.is_expired_at(now) {
            return Err(RedemptionError::DealExpired {
                expired_at: ctx.deal.expiry_datetime,
            });
        }

        // 4b. Redemption cap (opt-in). 여기서는 조기 거절만, 최종 판정은 commit 에서
        let max_redemptions = if self.policy.enforce_max_redemptions {
            ctx.deal.max_redemptions
        } else {
            None
        };
        if let Some(max_redemptions) = max_redemptions {
            let redeemed = self.store.count_redeemed_for_deal(ctx.deal.id).await?;
            if redeemed >= i64::from(max_redemptions) {
                return Err(RedemptionError::RedemptionLimitReached { max_redemptions });
            }
        }

        // 5. Fraud
        let fraud_check = self.assess_fraud(&ctx, now).await?;
        if fraud_check.is_suspicious && fraud_check.risk_score > self.policy.block_threshold {
            tracing::warn!(
                redemption_id = %ctx.redemption.id,
                risk_score = fraud_check.risk_score,
                reasons = ?fraud_check.reasons,
                "redemption blocked by fraud check"
            );
            self.record_fraud_block(&ctx, req, &fraud_check).await;
            return Err(RedemptionError::FraudSuspected { fraud_check });
        }

        // 6. Commit
        let points_earned = ctx.deal.points_earned();
        let commit = PendingCommit {
            redemption_id: ctx.redemption.id,
            deal_id: ctx.deal.id,
            user_id: ctx.user.id,
            points: points_earned,
            max_redemptions,
            now,
        };
        let redeemed_at = match self.store.commit_redemption(&commit).await? {
            CommitOutcome::Committed { redeemed_at } => redeemed_at,
            CommitOutcome::LimitReached { max_redemptions } => {
                tracing::info!(deal_id = %ctx.deal.id, max_redemptions, "deal cap reached at commit");
                return Err(RedemptionError::RedemptionLimitReached { max_redemptions });
            }
            CommitOutcome::Conflict {
                status: RedemptionStatus::Expired,
                ..
            } => {
                return Err(RedemptionError::DealExpired {
                    expired_at: ctx.deal.expiry_datetime,
                });
            }
            CommitOutcome::Conflict { redeemed_at, .. } => {
                tracing::info!(redemption_id = %ctx.redemption.id, "lost redemption race");
                return Err(RedemptionError::AlreadyRedeemed { redeemed_at });
            }
        };

        // 포인트는 이미 커밋됨. 배지 실패로 전체 결과를 뒤집지 않음
        let badge_awarded = match self
            .store
            .grant_badge_once(ctx.user.id, FIRST_REDEMPTION_BADGE, FIRST_REDEMPTION_BONUS, now)
            .await
        {
            Ok(granted) => granted,
            Err(err) => {
                tracing::error!(user_id = %ctx.user.id, error = ?err, "failed to grant first redemption badge");
                false
            }
        };

        tracing::info!(
            redemption_id = %ctx.redemption.id,
            user_id = %ctx.user.id,
            points_earned,
            badge_awarded,
            risk_score = fraud_check.risk_score,
            "redemption committed"
        );

        Ok(RedemptionSuccess {
            redemption_id: ctx.redemption.id,
            deal_title: ctx.deal.title.clone(),
            discount_percent: ctx.deal.effective_discount(),
            user_name: ctx.user.name.clone(),
            points_earned,
            redeemed_at,
            fraud_check,
            badge_awarded,
        })
    }

    async fn assess_fraud(
        &self,
        ctx: &RedemptionContext,
        now: DateTime<Utc>,
    ) -> anyhow::Result<FraudSignal> {
        let activity = self
            .store
            .activity_snapshot(ctx.user.id, ctx.deal.id, FraudContext::window_start(now))
            .await?;

        Ok(self.detector.assess(&FraudContext {
            now,
            account_created_at: ctx.user.created_at,
            discount_percent: ctx.deal.effective_discount(),
            activity,
        }))
    }

    /// 감사 로그 기록. 실패해도 차단은 유지
    async fn record_fraud_block(
        &self,
        ctx: &RedemptionContext,
        req: &RedemptionRequest,
        fraud_check: &FraudSignal,
    ) {
        let action = NewAdminAction {
            admin_id: req.staff_user_id.unwrap_or(self.policy.system_actor_id),
            action_type: FRAUD_ACTION_TYPE.to_string(),
            target_type: FRAUD_TARGET_TYPE.to_string(),
            target_id: ctx.redemption.id,
            details: json!({
                "reasons": fraud_check.reasons,
                "risk_score": fraud_check.risk_score,
                "qr_code_data": ctx.redemption.qr_code_data,
            }),
        };

        if let Err(err) = self.store.record_admin_action(&action).await {
            tracing::error!(
                redemption_id = %ctx.redemption.id,
                error = ?err,
                "failed to write fraud audit entry"
            );
        }
    }
}
