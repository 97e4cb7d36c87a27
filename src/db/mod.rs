//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 같은 QR 코드가 동시에 두 번 스캔되면?
//! A: 상태 확인과 상태 변경을 하나의 조건부 UPDATE 로 처리
//!
//!    ```sql
//!    UPDATE deal_redemptions SET status = 'redeemed', redeemed_at = $2
//!    WHERE id = $1 AND status = 'pending'
//!    ```
//!
//!    - rows_affected == 0 이면 다른 요청이 먼저 처리한 것
//!    - 포인트 적립도 같은 트랜잭션 안에서 수행 (부분 커밋 없음)
//!
//! Q: maxRedemptions 상한은 어떻게 지키는가?
//! A: commit 트랜잭션 안에서 `SELECT ... FROM deals WHERE id = $1 FOR UPDATE`
//!    - 같은 딜의 commit 이 직렬화됨
//!    - 상태 변경 후 redeemed 건수가 상한을 넘으면 롤백
//!
//! Q: 배지 중복 부여는 어떻게 막는가?
//! A: (user_id, badge_name) UNIQUE 제약 + `ON CONFLICT DO NOTHING`
//!    - 존재 확인 후 삽입, 동시 삽입 충돌은 무시
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최대 10, 최소 1 커넥션
//!    - acquire_timeout 3초 (무한 대기 없음)

pub mod memory;
mod models;
mod repository;

pub use memory::MemoryStore;
pub use models::*;
pub use repository::{ActivitySnapshot, CommitOutcome, PendingCommit, RedemptionStore};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use uuid::Uuid;

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3초
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

fn context_from_row(row: &PgRow) -> Result<RedemptionContext> {
    let status: String = row.try_get("status")?;

    Ok(RedemptionContext {
        redemption: Redemption {
            id: row.try_get("id")?,
            deal_id: row.try_get("deal_id")?,
            user_id: row.try_get("user_id")?,
            status: status.parse()?,
            claimed_at: row.try_get("claimed_at")?,
            redeemed_at: row.try_get("redeemed_at")?,
            qr_code_data: row.try_get("qr_code_data")?,
        },
        deal: Deal {
            id: row.try_get("deal_id")?,
            restaurant_id: row.try_get("restaurant_id")?,
            title: row.try_get("deal_title")?,
            discount_percent: row.try_get("discount_percent")?,
            expiry_datetime: row.try_get("expiry_datetime")?,
            max_redemptions: row.try_get("max_redemptions")?,
        },
        user: UserAccount {
            id: row.try_get("user_id")?,
            name: row.try_get("user_name")?,
            email: row.try_get("user_email")?,
            points: row.try_get("user_points")?,
            streak_count: row.try_get("user_streak_count")?,
            created_at: row.try_get("user_created_at")?,
        },
    })
}

#[async_trait]
impl RedemptionStore for Database {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_qr_code(&self, qr_code_data: &str) -> Result<Option<RedemptionContext>> {
        let row = sqlx::query(
            r#"
            SELECT
                r.id,
                r.deal_id,
                r.user_id,
                r.status,
                r.claimed_at,
                r.redeemed_at,
                r.qr_code_data,
                d.restaurant_id,
                d.title AS deal_title,
                d.discount_percent,
                d.expiry_datetime,
                d.max_redemptions,
                u.name AS user_name,
                u.email AS user_email,
                u.points AS user_points,
                u.streak_count AS user_streak_count,
                u.created_at AS user_created_at
            FROM deal_redemptions r
            JOIN deals d ON d.id = r.deal_id
            JOIN users u ON u.id = r.user_id
            WHERE r.qr_code_data = $1
            "#
        )
        .bind(qr_code_data)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(context_from_row).transpose()
    }

    async fn activity_snapshot(
        &self,
        user_id: Uuid,
        deal_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<ActivitySnapshot> {
        let (redeemed_since, same_deal_claims, restaurants_claimed_since): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM deal_redemptions
                      WHERE user_id = $1 AND redeemed_at >= $3),
                    (SELECT COUNT(*) FROM deal_redemptions
                      WHERE user_id = $1 AND deal_id = $2),
                    (SELECT COUNT(DISTINCT d.restaurant_id)
                       FROM deal_redemptions r
                       JOIN deals d ON d.id = r.deal_id
                      WHERE r.user_id = $1 AND r.claimed_at >= $3)
                "#
            )
            .bind(user_id)
            .bind(deal_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(ActivitySnapshot {
            redeemed_since,
            same_deal_claims,
            restaurants_claimed_since,
        })
    }

    async fn count_redeemed_for_deal(&self, deal_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM deal_redemptions WHERE deal_id = $1 AND status = 'redeemed'"
        )
        .bind(deal_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn record_admin_action(&self, action: &NewAdminAction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_actions (admin_id, action_type, target_type, target_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#
        )
        .bind(action.admin_id)
        .bind(&action.action_type)
        .bind(&action.target_type)
        .bind(action.target_id)
        .bind(&action.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn commit_redemption(&self, commit: &PendingCommit) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        if commit.max_redemptions.is_some() {
            sqlx::query("SELECT id FROM deals WHERE id = $1 FOR UPDATE")
                .bind(commit.deal_id)
                .execute(&mut *tx)
                .await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE deal_redemptions
            SET status = 'redeemed', redeemed_at = $2
            WHERE id = $1 AND status = 'pending'
            "#
        )
        .bind(commit.redemption_id)
        .bind(commit.now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let (status, redeemed_at): (String, Option<DateTime<Utc>>) = sqlx::query_as(
                "SELECT status, redeemed_at FROM deal_redemptions WHERE id = $1"
            )
            .bind(commit.redemption_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Ok(CommitOutcome::Conflict {
                status: status.parse()?,
                redeemed_at,
            });
        }

        if let Some(max_redemptions) = commit.max_redemptions {
            // 방금 바꾼 행 포함
            let (redeemed,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM deal_redemptions WHERE deal_id = $1 AND status = 'redeemed'"
            )
            .bind(commit.deal_id)
            .fetch_one(&mut *tx)
            .await?;

            if redeemed > i64::from(max_redemptions) {
                tx.rollback().await?;
                return Ok(CommitOutcome::LimitReached { max_redemptions });
            }
        }

        let credited = sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
            .bind(commit.user_id)
            .bind(commit.points)
            .execute(&mut *tx)
            .await?;
        if credited.rows_affected() != 1 {
            // 트랜잭션은 drop 시 롤백됨
            anyhow::bail!("user {} vanished while crediting points", commit.user_id);
        }

        tx.commit().await.context("failed to commit redemption")?;

        Ok(CommitOutcome::Committed { redeemed_at: commit.now })
    }

    async fn grant_badge_once(
        &self,
        user_id: Uuid,
        badge_name: &str,
        points_awarded: i32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM user_badges WHERE user_id = $1 AND badge_name = $2"
        )
        .bind(user_id)
        .bind(badge_name)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Ok(false);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge_name, points_awarded, granted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, badge_name) DO NOTHING
            "#
        )
        .bind(user_id)
        .bind(badge_name)
        .bind(points_awarded)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }
}
