//! In-memory `RedemptionStore`
//!
//! 단일 RwLock 아래에서 모든 테이블을 다루므로 조건부 업데이트와 배지 삽입이
//! PostgreSQL 구현과 같은 원자성을 가짐. 테스트와 로컬 실행용.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{
    Badge, Deal, NewAdminAction, Redemption, RedemptionContext, RedemptionStatus, UserAccount,
};
use super::repository::{ActivitySnapshot, CommitOutcome, PendingCommit, RedemptionStore};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserAccount>,
    deals: HashMap<Uuid, Deal>,
    redemptions: Vec<Redemption>,
    admin_actions: Vec<NewAdminAction>,
    badges: Vec<Badge>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// true 면 모든 호출이 실패 (DB 장애 시뮬레이션)
    unavailable: AtomicBool,
    /// true 면 감사 로그 쓰기만 실패
    audit_unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        self.tables.read().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        self.tables.write().map_err(|_| anyhow!("store lock poisoned"))
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_audit_unavailable(&self, unavailable: bool) {
        self.audit_unavailable.store(unavailable, Ordering::SeqCst);
    }

    // ============ Seeding ============

    pub fn insert_user(&self, user: UserAccount) -> Result<()> {
        self.write()?.users.insert(user.id, user);
        Ok(())
    }

    pub fn insert_deal(&self, deal: Deal) -> Result<()> {
        self.write()?.deals.insert(deal.id, deal);
        Ok(())
    }

    /// (qr_code_data) 와 (deal_id, user_id, qr_code_data) 유일성 검사
    pub fn insert_redemption(&self, redemption: Redemption) -> Result<()> {
        let mut tables = self.write()?;
        if tables
            .redemptions
            .iter()
            .any(|r| r.qr_code_data == redemption.qr_code_data)
        {
            bail!("duplicate qr_code_data: {}", redemption.qr_code_data);
        }
        tables.redemptions.push(redemption);
        Ok(())
    }

    // ============ Inspection ============

    pub fn user(&self, id: Uuid) -> Option<UserAccount> {
        self.read().ok()?.users.get(&id).cloned()
    }

    pub fn redemption(&self, id: Uuid) -> Option<Redemption> {
        self.read().ok()?.redemptions.iter().find(|r| r.id == id).cloned()
    }

    pub fn admin_actions(&self) -> Vec<NewAdminAction> {
        self.read().map(|t| t.admin_actions.clone()).unwrap_or_default()
    }

    pub fn badges_for(&self, user_id: Uuid) -> Vec<Badge> {
        self.read()
            .map(|t| t.badges.iter().filter(|b| b.user_id == user_id).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RedemptionStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    async fn find_by_qr_code(&self, qr_code_data: &str) -> Result<Option<RedemptionContext>> {
        let tables = self.read()?;
        let Some(redemption) = tables
            .redemptions
            .iter()
            .find(|r| r.qr_code_data == qr_code_data)
        else {
            return Ok(None);
        };

        let deal = tables
            .deals
            .get(&redemption.deal_id)
            .ok_or_else(|| anyhow!("deal {} missing", redemption.deal_id))?;
        let user = tables
            .users
            .get(&redemption.user_id)
            .ok_or_else(|| anyhow!("user {} missing", redemption.user_id))?;

        Ok(Some(RedemptionContext {
            redemption: redemption.clone(),
            deal: deal.clone(),
            user: user.clone(),
        }))
    }

    async fn activity_snapshot(
        &self,
        user_id: Uuid,
        deal_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<ActivitySnapshot> {
        let tables = self.read()?;
        let own = || tables.redemptions.iter().filter(move |r| r.user_id == user_id);

        let redeemed_since = own()
            .filter(|r| r.redeemed_at.is_some_and(|at| at >= since))
            .count() as i64;
        let same_deal_claims = own().filter(|r| r.deal_id == deal_id).count() as i64;

        let mut restaurants: Vec<Uuid> = own()
            .filter(|r| r.claimed_at >= since)
            .filter_map(|r| tables.deals.get(&r.deal_id).map(|d| d.restaurant_id))
            .collect();
        restaurants.sort();
        restaurants.dedup();

        Ok(ActivitySnapshot {
            redeemed_since,
            same_deal_claims,
            restaurants_claimed_since: restaurants.len() as i64,
        })
    }

    async fn count_redeemed_for_deal(&self, deal_id: Uuid) -> Result<i64> {
        let tables = self.read()?;
        Ok(tables
            .redemptions
            .iter()
            .filter(|r| r.deal_id == deal_id && r.status == RedemptionStatus::Redeemed)
            .count() as i64)
    }

    async fn record_admin_action(&self, action: &NewAdminAction) -> Result<()> {
        if self.audit_unavailable.load(Ordering::SeqCst) {
            bail!("admin_actions table unavailable");
        }
        self.write()?.admin_actions.push(action.clone());
        Ok(())
    }

    async fn commit_redemption(&self, commit: &PendingCommit) -> Result<CommitOutcome> {
        let mut tables = self.write()?;

        if !tables.users.contains_key(&commit.user_id) {
            bail!("user {} not found", commit.user_id);
        }

        let redeemed_for_deal = tables
            .redemptions
            .iter()
            .filter(|r| r.deal_id == commit.deal_id && r.status == RedemptionStatus::Redeemed)
            .count() as i64;

        let redemption = tables
            .redemptions
            .iter_mut()
            .find(|r| r.id == commit.redemption_id)
            .ok_or_else(|| anyhow!("redemption {} not found", commit.redemption_id))?;

        if redemption.status.is_terminal() {
            return Ok(CommitOutcome::Conflict {
                status: redemption.status,
                redeemed_at: redemption.redeemed_at,
            });
        }
        if let Some(max_redemptions) = commit.max_redemptions {
            if redeemed_for_deal >= i64::from(max_redemptions) {
                return Ok(CommitOutcome::LimitReached { max_redemptions });
            }
        }
        redemption.status = RedemptionStatus::Redeemed;
        redemption.redeemed_at = Some(commit.now);

        if let Some(user) = tables.users.get_mut(&commit.user_id) {
            user.points += commit.points;
        }

        Ok(CommitOutcome::Committed { redeemed_at: commit.now })
    }

    async fn grant_badge_once(
        &self,
        user_id: Uuid,
        badge_name: &str,
        points_awarded: i32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.write()?;
        if tables
            .badges
            .iter()
            .any(|b| b.user_id == user_id && b.badge_name == badge_name)
        {
            return Ok(false);
        }

        tables.badges.push(Badge {
            user_id,
            badge_name: badge_name.to_string(),
            points_awarded,
            granted_at: now,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seed(store: &MemoryStore) -> (UserAccount, Deal, Redemption) {
        let now = Utc::now();
        let user = UserAccount {
            id: Uuid::new_v4(),
            name: "Mina".to_string(),
            email: "mina@example.com".to_string(),
            points: 0,
            streak_count: 0,
            created_at: now - Duration::days(30),
        };
        let deal = Deal {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            title: "Half-price bibimbap".to_string(),
            discount_percent: Some(50.0),
            expiry_datetime: None,
            max_redemptions: None,
        };
        let redemption = Redemption {
            id: Uuid::new_v4(),
            deal_id: deal.id,
            user_id: user.id,
            status: RedemptionStatus::Pending,
            claimed_at: now,
            redeemed_at: None,
            qr_code_data: "QR-1".to_string(),
        };
        store.insert_user(user.clone()).unwrap();
        store.insert_deal(deal.clone()).unwrap();
        store.insert_redemption(redemption.clone()).unwrap();
        (user, deal, redemption)
    }

    fn commit_of(redemption: &Redemption, max_redemptions: Option<i32>, now: DateTime<Utc>) -> PendingCommit {
        PendingCommit {
            redemption_id: redemption.id,
            deal_id: redemption.deal_id,
            user_id: redemption.user_id,
            points: 100,
            max_redemptions,
            now,
        }
    }

    fn redemption_of(deal: &Deal, user: &UserAccount, claimed_at: DateTime<Utc>, redeemed_at: Option<DateTime<Utc>>) -> Redemption {
        Redemption {
            id: Uuid::new_v4(),
            deal_id: deal.id,
            user_id: user.id,
            status: if redeemed_at.is_some() {
                RedemptionStatus::Redeemed
            } else {
                RedemptionStatus::Pending
            },
            claimed_at,
            redeemed_at,
            qr_code_data: format!("QR-{}", Uuid::new_v4()),
        }
    }

    fn deal_at_new_restaurant(store: &MemoryStore) -> Deal {
        let deal = Deal {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            title: "Mandu set".to_string(),
            discount_percent: Some(15.0),
            expiry_datetime: None,
            max_redemptions: None,
        };
        store.insert_deal(deal.clone()).unwrap();
        deal
    }

    #[tokio::test]
    async fn test_commit_is_compare_and_swap() {
        let store = MemoryStore::new();
        let (user, _, redemption) = seed(&store);
        let now = Utc::now();

        let first = store.commit_redemption(&commit_of(&redemption, None, now)).await.unwrap();
        assert_eq!(first, CommitOutcome::Committed { redeemed_at: now });

        let second = store.commit_redemption(&commit_of(&redemption, None, now)).await.unwrap();
        assert_eq!(
            second,
            CommitOutcome::Conflict {
                status: RedemptionStatus::Redeemed,
                redeemed_at: Some(now),
            }
        );

        // 두 번째 시도는 포인트를 더하지 않음
        assert_eq!(store.user(user.id).unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_commit_enforces_deal_cap() {
        let store = MemoryStore::new();
        let (user, deal, first) = seed(&store);
        let second = redemption_of(&deal, &user, Utc::now(), None);
        store.insert_redemption(second.clone()).unwrap();
        let now = Utc::now();

        let a = store.commit_redemption(&commit_of(&first, Some(1), now)).await.unwrap();
        assert_eq!(a, CommitOutcome::Committed { redeemed_at: now });

        let b = store.commit_redemption(&commit_of(&second, Some(1), now)).await.unwrap();
        assert_eq!(b, CommitOutcome::LimitReached { max_redemptions: 1 });
        assert_eq!(store.redemption(second.id).unwrap().status, RedemptionStatus::Pending);
        assert_eq!(store.user(user.id).unwrap().points, 100);

        // 이미 redeemed 인 건은 상한보다 충돌이 우선
        let again = store.commit_redemption(&commit_of(&first, Some(1), now)).await.unwrap();
        assert!(matches!(again, CommitOutcome::Conflict { status: RedemptionStatus::Redeemed, .. }));
    }

    #[tokio::test]
    async fn test_activity_restaurants_counted_by_claimed_at() {
        let store = MemoryStore::new();
        let (user, deal, _) = seed(&store);
        let now = Utc::now();
        let since = now - Duration::minutes(60);

        for _ in 0..3 {
            let other = deal_at_new_restaurant(&store);
            store
                .insert_redemption(redemption_of(&other, &user, now - Duration::minutes(10), None))
                .unwrap();
        }

        let snapshot = store.activity_snapshot(user.id, deal.id, since).await.unwrap();
        // seed 의 리딤(방금 claim) 포함 4곳
        assert_eq!(snapshot.restaurants_claimed_since, 4);
        assert_eq!(snapshot.redeemed_since, 0);
        assert_eq!(snapshot.same_deal_claims, 1);
    }

    #[tokio::test]
    async fn test_activity_old_claims_recently_redeemed() {
        let store = MemoryStore::new();
        let (user, _, _) = seed(&store);
        let now = Utc::now();
        let since = now - Duration::minutes(60);

        let mut deals = Vec::new();
        for _ in 0..3 {
            let other = deal_at_new_restaurant(&store);
            store
                .insert_redemption(redemption_of(
                    &other,
                    &user,
                    now - Duration::hours(2),
                    Some(now - Duration::minutes(5)),
                ))
                .unwrap();
            deals.push(other);
        }

        let snapshot = store.activity_snapshot(user.id, deals[0].id, since).await.unwrap();
        // claimed_at 이 윈도우 밖이면 레스토랑 수에 안 들어감 (seed 의 1곳만)
        assert_eq!(snapshot.restaurants_claimed_since, 1);
        assert_eq!(snapshot.redeemed_since, 3);
    }

    #[tokio::test]
    async fn test_activity_burst_window_excludes_older_redemptions() {
        let store = MemoryStore::new();
        let (user, deal, _) = seed(&store);
        let now = Utc::now();
        let since = now - Duration::minutes(60);

        for minutes in [61, 90, 30] {
            store
                .insert_redemption(redemption_of(
                    &deal,
                    &user,
                    now - Duration::hours(3),
                    Some(now - Duration::minutes(minutes)),
                ))
                .unwrap();
        }

        let snapshot = store.activity_snapshot(user.id, deal.id, since).await.unwrap();
        assert_eq!(snapshot.redeemed_since, 1);
        // 같은 딜은 상태/시간 무관 (seed 1 + 3)
        assert_eq!(snapshot.same_deal_claims, 4);
    }

    #[tokio::test]
    async fn test_badge_granted_once() {
        let store = MemoryStore::new();
        let (user, _, _) = seed(&store);
        let now = Utc::now();

        assert!(store.grant_badge_once(user.id, "first_redemption", 50, now).await.unwrap());
        assert!(!store.grant_badge_once(user.id, "first_redemption", 50, now).await.unwrap());
        assert_eq!(store.badges_for(user.id).len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_qr_code_rejected() {
        let store = MemoryStore::new();
        let (_, _, mut redemption) = seed(&store);
        redemption.id = Uuid::new_v4();
        assert!(store.insert_redemption(redemption).is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.health_check().await.is_err());
        assert!(store.find_by_qr_code("QR-1").await.is_err());
    }
}
