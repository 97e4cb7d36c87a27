//! Fraud Scoring Service
//!
//! # Interview Q&A
//!
//! Q: 왜 ML 이 아닌 규칙 기반인가?
//! A: 설명 가능성
//!    - 매장 직원이 차단 사유를 바로 이해할 수 있어야 함
//!    - 각 규칙이 자기 이름과 설명을 결과에 남김
//!    - 결정적(deterministic): 같은 입력이면 같은 점수
//!
//! Q: 새 규칙은 어떻게 추가하는가?
//! A: `FraudRule` 을 레지스트리에 등록
//!
//!    ```rust,ignore
//!    let detector = FraudDetector::default()
//!        .with_rule(FraudRule::new("late_night", 15, |ctx| ...));
//!    ```
//!
//!    검증 파이프라인 코드는 건드리지 않음
//!
//! # Default Rules
//!
//! | Rule | Condition | Score |
//! |---|---|---|
//! | burst_redemptions | 최근 60분 redeemed ≥ 3 | +30 |
//! | duplicate_deal_claims | 같은 딜 리딤 행 > 1 | +40 |
//! | new_account_high_value | 가입 24시간 미만 && 할인율 > 30 | +25 |
//! | cross_restaurant_burst | 최근 60분 claimed 레스토랑 ≥ 3 | +20 |

use chrono::{DateTime, Duration, Utc};

use crate::db::ActivitySnapshot;
use crate::types::FraudSignal;

/// 버스트 판정 윈도우
pub const ACTIVITY_WINDOW_MINUTES: i64 = 60;

/// 신규 계정 판정 기준
pub const NEW_ACCOUNT_HOURS: i64 = 24;

/// 이 점수를 초과하면 is_suspicious
pub const DEFAULT_SUSPICIOUS_THRESHOLD: u8 = 40;

const MAX_RISK_SCORE: u32 = 100;

/// 규칙 평가 입력
#[derive(Debug, Clone)]
pub struct FraudContext {
    pub now: DateTime<Utc>,
    pub account_created_at: DateTime<Utc>,
    pub discount_percent: f64,
    pub activity: ActivitySnapshot,
}

impl FraudContext {
    pub fn account_age(&self) -> Duration {
        self.now - self.account_created_at
    }

    /// 활동 집계 시작 시각
    pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(ACTIVITY_WINDOW_MINUTES)
    }
}

/// 발동 시 사유 문자열을 돌려주는 판정 함수
pub type RulePredicate = fn(&FraudContext) -> Option<String>;

/// (name, predicate, weight)
#[derive(Clone)]
pub struct FraudRule {
    pub name: &'static str,
    pub weight: u8,
    predicate: RulePredicate,
}

impl FraudRule {
    pub fn new(name: &'static str, weight: u8, predicate: RulePredicate) -> Self {
        Self {
            name,
            weight,
            predicate,
        }
    }

    pub fn evaluate(&self, ctx: &FraudContext) -> Option<String> {
        (self.predicate)(ctx)
    }
}

impl std::fmt::Debug for FraudRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FraudRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

fn burst_redemptions(ctx: &FraudContext) -> Option<String> {
    (ctx.activity.redeemed_since >= 3).then(|| {
        format!(
            "High frequency: {} redemptions in the last hour",
            ctx.activity.redeemed_since
        )
    })
}

fn duplicate_deal_claims(ctx: &FraudContext) -> Option<String> {
    (ctx.activity.same_deal_claims > 1).then(|| {
        format!(
            "Duplicate claims: {} redemptions of the same deal",
            ctx.activity.same_deal_claims
        )
    })
}

fn new_account_high_value(ctx: &FraudContext) -> Option<String> {
    let is_new = ctx.account_age() < Duration::hours(NEW_ACCOUNT_HOURS);
    (is_new && ctx.discount_percent > 30.0).then(|| {
        format!(
            "New account redeeming high-value deal ({}% off)",
            ctx.discount_percent
        )
    })
}

fn cross_restaurant_burst(ctx: &FraudContext) -> Option<String> {
    (ctx.activity.restaurants_claimed_since >= 3).then(|| {
        format!(
            "Deals claimed at {} different restaurants in the last hour",
            ctx.activity.restaurants_claimed_since
        )
    })
}

/// 기본 규칙 레지스트리
pub fn default_rules() -> Vec<FraudRule> {
    vec![
        FraudRule::new("burst_redemptions", 30, burst_redemptions),
        FraudRule::new("duplicate_deal_claims", 40, duplicate_deal_claims),
        FraudRule::new("new_account_high_value", 25, new_account_high_value),
        FraudRule::new("cross_restaurant_burst", 20, cross_restaurant_burst),
    ]
}

/// 규칙 레지스트리를 평가해 FraudSignal 을 만드는 순수 함수 집합
#[derive(Debug, Clone)]
pub struct FraudDetector {
    rules: Vec<FraudRule>,
    suspicious_threshold: u8,
}

impl Default for FraudDetector {
    fn default() -> Self {
        Self::new(default_rules(), DEFAULT_SUSPICIOUS_THRESHOLD)
    }
}

impl FraudDetector {
    pub fn new(rules: Vec<FraudRule>, suspicious_threshold: u8) -> Self {
        Self {
            rules,
            suspicious_threshold,
        }
    }

    pub fn with_rule(mut self, rule: FraudRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FraudRule] {
        &self.rules
    }

    /// 모든 규칙을 독립적으로 평가하고 가중치를 합산 (0..=100 으로 clamp)
    pub fn assess(&self, ctx: &FraudContext) -> FraudSignal {
        let mut score: u32 = 0;
        let mut reasons = Vec::new();

        for rule in &self.rules {
            if let Some(reason) = rule.evaluate(ctx) {
                tracing::debug!(rule = rule.name, weight = rule.weight, "fraud rule triggered");
                score += u32::from(rule.weight);
                reasons.push(reason);
            }
        }

        let risk_score = score.min(MAX_RISK_SCORE) as u8;

        FraudSignal {
            is_suspicious: risk_score > self.suspicious_threshold,
            reasons,
            risk_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FraudContext {
        let now = Utc::now();
        FraudContext {
            now,
            account_created_at: now - Duration::days(90),
            discount_percent: 25.0,
            activity: ActivitySnapshot {
                redeemed_since: 0,
                same_deal_claims: 1,
                restaurants_claimed_since: 1,
            },
        }
    }

    #[test]
    fn test_clean_history_scores_zero() {
        let signal = FraudDetector::default().assess(&ctx());
        assert_eq!(signal, FraudSignal::clean());
    }

    #[test]
    fn test_burst_redemptions() {
        let mut c = ctx();
        c.activity.redeemed_since = 2;
        assert_eq!(FraudDetector::default().assess(&c).risk_score, 0);

        c.activity.redeemed_since = 3;
        let signal = FraudDetector::default().assess(&c);
        assert_eq!(signal.risk_score, 30);
        assert!(!signal.is_suspicious);
        assert_eq!(signal.reasons.len(), 1);
    }

    #[test]
    fn test_duplicate_claims_alone_is_suspicious() {
        let mut c = ctx();
        c.activity.same_deal_claims = 2;
        let signal = FraudDetector::default().assess(&c);
        assert_eq!(signal.risk_score, 40);
        // 40 은 "초과" 가 아니므로 suspicious 아님
        assert!(!signal.is_suspicious);

        c.activity.redeemed_since = 3;
        let signal = FraudDetector::default().assess(&c);
        assert_eq!(signal.risk_score, 70);
        assert!(signal.is_suspicious);
    }

    #[test]
    fn test_new_account_needs_high_discount() {
        let mut c = ctx();
        c.account_created_at = c.now - Duration::hours(2);
        assert_eq!(FraudDetector::default().assess(&c).risk_score, 0);

        c.discount_percent = 31.0;
        assert_eq!(FraudDetector::default().assess(&c).risk_score, 25);

        c.account_created_at = c.now - Duration::hours(25);
        assert_eq!(FraudDetector::default().assess(&c).risk_score, 0);
    }

    #[test]
    fn test_cross_restaurant_burst() {
        let mut c = ctx();
        c.activity.restaurants_claimed_since = 3;
        assert_eq!(FraudDetector::default().assess(&c).risk_score, 20);
    }

    #[test]
    fn test_all_signals_clamped_to_100() {
        let mut c = ctx();
        c.activity = ActivitySnapshot {
            redeemed_since: 5,
            same_deal_claims: 3,
            restaurants_claimed_since: 4,
        };
        c.account_created_at = c.now - Duration::hours(1);
        c.discount_percent = 50.0;

        let signal = FraudDetector::default().assess(&c);
        assert_eq!(signal.risk_score, 100);
        assert!(signal.is_suspicious);
        assert_eq!(signal.reasons.len(), 4);
        assert!(signal.reasons[0].contains("5 redemptions"));
    }

    #[test]
    fn test_score_monotonic_per_signal() {
        let detector = FraudDetector::default();
        let base = ctx();
        let base_score = detector.assess(&base).risk_score;

        let mut variants = Vec::new();
        let mut c = base.clone();
        c.activity.redeemed_since = 10;
        variants.push(c);
        let mut c = base.clone();
        c.activity.same_deal_claims = 4;
        variants.push(c);
        let mut c = base.clone();
        c.account_created_at = c.now;
        c.discount_percent = 80.0;
        variants.push(c);
        let mut c = base.clone();
        c.activity.restaurants_claimed_since = 6;
        variants.push(c);

        for variant in &variants {
            assert!(detector.assess(variant).risk_score >= base_score);
        }
    }

    #[test]
    fn test_custom_rule_registration() {
        fn always(_: &FraudContext) -> Option<String> {
            Some("always".to_string())
        }

        let detector = FraudDetector::default().with_rule(FraudRule::new("always", 45, always));
        assert_eq!(detector.rules().len(), 5);

        let signal = detector.assess(&ctx());
        assert_eq!(signal.risk_score, 45);
        assert!(signal.is_suspicious);
        assert_eq!(signal.reasons, vec!["always".to_string()]);
    }
}
