use crate::config::PolicyConfig;
use crate::database::DbPool;
use crate::entities::{Reward, Voucher};
use crate::error::{AppError, AppResult};
use crate::models::{PointsResponse, RedeemRewardRequest, RedeemRewardResponse, RewardResponse, VoucherResponse};
use crate::utils::generate_voucher_code;
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Loyalty points and reward redemption. The points decrement is
/// conditional on the current balance and the voucher mint carries the
/// idempotency key, so a redeem settles exactly once.
#[derive(Clone)]
pub struct RewardService {
    pool: DbPool,
    policy: PolicyConfig,
}

impl RewardService {
    pub fn new(pool: DbPool, policy: PolicyConfig) -> Self {
        Self { pool, policy }
    }

    pub async fn points(&self, user_id: &str) -> AppResult<PointsResponse> {
        let points: Option<i64> =
            sqlx::query_scalar("SELECT points FROM student_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(PointsResponse {
            points: points.unwrap_or(0),
        })
    }

    pub async fn catalog(&self) -> AppResult<Vec<RewardResponse>> {
        let rewards = sqlx::query_as::<_, Reward>(
            "SELECT * FROM rewards WHERE is_active = 1 ORDER BY points_required",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rewards.into_iter().map(RewardResponse::from).collect())
    }

    pub async fn redeem(
        &self,
        user_id: &str,
        request: RedeemRewardRequest,
    ) -> AppResult<RedeemRewardResponse> {
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_voucher_by_key(user_id, key).await? {
                let points = self.points(user_id).await?.points;
                return Ok(RedeemRewardResponse {
                    points,
                    voucher: existing.into(),
                    replayed: true,
                });
            }
        }

        let reward = sqlx::query_as::<_, Reward>(
            "SELECT * FROM rewards WHERE id = ? AND is_active = 1",
        )
        .bind(&request.reward_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reward {} not found", request.reward_id)))?;

        let mut tx = self.pool.begin().await?;

        // Points never go negative: the decrement carries its own balance
        // check.
        let spent = sqlx::query(
            "UPDATE student_profiles SET points = points - ?, updated_at = ? WHERE user_id = ? AND points >= ?",
        )
        .bind(reward.points_required)
        .bind(Utc::now())
        .bind(user_id)
        .bind(reward.points_required)
        .execute(&mut *tx)
        .await?;
        if spent.rows_affected() == 0 {
            return Err(AppError::ValidationError(format!(
                "Not enough points for {}",
                reward.name
            )));
        }

        let voucher_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let insert = sqlx::query(
            r#"
            INSERT INTO vouchers (
                id, user_id, reward_id, code, discount_amount, expires_at,
                used, idempotency_key, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&voucher_id)
        .bind(user_id)
        .bind(&reward.id)
        .bind(generate_voucher_code())
        .bind(reward.discount_amount)
        .bind(now + Duration::days(self.policy.voucher_expiry_days))
        .bind(&request.idempotency_key)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from);

        if let Err(e) = insert {
            if e.is_unique_violation() {
                // Lost the idempotency race; the winner already spent the
                // points and minted the voucher.
                tx.rollback().await?;
                if let Some(key) = request.idempotency_key.as_deref() {
                    if let Some(existing) = self.find_voucher_by_key(user_id, key).await? {
                        let points = self.points(user_id).await?.points;
                        return Ok(RedeemRewardResponse {
                            points,
                            voucher: existing.into(),
                            replayed: true,
                        });
                    }
                }
            }
            return Err(e);
        }

        tx.commit().await?;

        let voucher = sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE id = ?")
            .bind(&voucher_id)
            .fetch_one(&self.pool)
            .await?;
        let points = self.points(user_id).await?.points;

        log::info!("User {user_id} redeemed {} for voucher {}", reward.name, voucher.code);

        Ok(RedeemRewardResponse {
            points,
            voucher: voucher.into(),
            replayed: false,
        })
    }

    pub async fn vouchers(&self, user_id: &str) -> AppResult<Vec<VoucherResponse>> {
        let vouchers = sqlx::query_as::<_, Voucher>(
            "SELECT * FROM vouchers WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vouchers.into_iter().map(VoucherResponse::from).collect())
    }

    async fn find_voucher_by_key(&self, user_id: &str, key: &str) -> AppResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(
            "SELECT * FROM vouchers WHERE user_id = ? AND idempotency_key = ?",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(voucher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    async fn setup() -> (RewardService, crate::database::DbPool, String, String) {
        let pool = mem_pool().await;
        let svc = RewardService::new(pool.clone(), PolicyConfig::default());
        let student = seed_student(&pool).await;

        let reward_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO rewards (id, name, points_required, discount_amount, created_at) VALUES (?, 'Free Drink', 50, 5000, ?)",
        )
        .bind(&reward_id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        (svc, pool, student, reward_id)
    }

    async fn set_points(pool: &crate::database::DbPool, user_id: &str, points: i64) {
        sqlx::query("UPDATE student_profiles SET points = ? WHERE user_id = ?")
            .bind(points)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redeem_spends_points_and_mints_voucher() {
        let (svc, pool, student, reward_id) = setup().await;
        set_points(&pool, &student, 60).await;

        let response = svc
            .redeem(
                &student,
                RedeemRewardRequest {
                    reward_id,
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.points, 10);
        assert_eq!(response.voucher.discount_amount, 5000);
        assert!(!response.voucher.used);
        assert!(response.voucher.code.starts_with("VCH-"));
    }

    #[tokio::test]
    async fn test_redeem_with_insufficient_points_fails_cleanly() {
        let (svc, pool, student, reward_id) = setup().await;
        set_points(&pool, &student, 20).await;

        let result = svc
            .redeem(
                &student,
                RedeemRewardRequest {
                    reward_id,
                    idempotency_key: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(svc.points(&student).await.unwrap().points, 20);
    }

    #[tokio::test]
    async fn test_redeem_replay_mints_single_voucher() {
        let (svc, pool, student, reward_id) = setup().await;
        set_points(&pool, &student, 100).await;

        let request = || RedeemRewardRequest {
            reward_id: reward_id.clone(),
            idempotency_key: Some("redeem-1".to_string()),
        };

        let first = svc.redeem(&student, request()).await.unwrap();
        assert!(!first.replayed);
        let second = svc.redeem(&student, request()).await.unwrap();
        assert!(second.replayed);
        assert_eq!(first.voucher.id, second.voucher.id);

        // Points were only spent once.
        assert_eq!(svc.points(&student).await.unwrap().points, 50);
        let vouchers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vouchers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(vouchers, 1);
    }

    #[tokio::test]
    async fn test_catalog_hides_inactive_rewards() {
        let (svc, pool, _, reward_id) = setup().await;
        assert_eq!(svc.catalog().await.unwrap().len(), 1);

        sqlx::query("UPDATE rewards SET is_active = 0 WHERE id = ?")
            .bind(&reward_id)
            .execute(&pool)
            .await
            .unwrap();
        assert!(svc.catalog().await.unwrap().is_empty());
    }
}
