use crate::config::PolicyConfig;
use crate::database::DbPool;
use crate::entities::{Transaction, Wallet};
use crate::error::{AppError, AppResult};
use crate::external::PaymentsService;
use crate::models::{
    ConfirmTopUpResponse, PayRequest, PayResponse, PaymentWebhookEvent, TopUpRequest,
    TopUpResponse, TransactionResponse, WalletResponse,
};
use crate::utils::generate_reference_code;
use chrono::Utc;
use uuid::Uuid;

/// Stored-value wallet over an append-only transaction ledger. Every
/// balance change happens inside a database transaction paired with a
/// ledger row, and every conditional update treats zero affected rows as
/// "someone else got there first".
#[derive(Clone)]
pub struct WalletService {
    pool: DbPool,
    payments: PaymentsService,
    policy: PolicyConfig,
}

impl WalletService {
    pub fn new(pool: DbPool, payments: PaymentsService, policy: PolicyConfig) -> Self {
        Self {
            pool,
            payments,
            policy,
        }
    }

    /// Fetches the caller's wallet, creating it lazily on first touch.
    pub async fn get_or_create_wallet(&self, user_id: &str) -> AppResult<Wallet> {
        if let Some(wallet) = self.find_wallet(user_id).await? {
            return Ok(wallet);
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let insert = sqlx::query(
            "INSERT INTO wallets (id, user_id, balance, created_at, updated_at) VALUES (?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from);

        match insert {
            Ok(_) => {}
            // Raced with another first-touch request; the existing row wins.
            Err(e) if e.is_unique_violation() => {}
            Err(e) => return Err(e),
        }

        self.find_wallet(user_id)
            .await?
            .ok_or_else(|| AppError::InternalError("Wallet creation did not persist".to_string()))
    }

    pub async fn get_balance(&self, user_id: &str) -> AppResult<WalletResponse> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        Ok(WalletResponse {
            id: wallet.id,
            balance: wallet.balance,
        })
    }

    /// Starts a top-up: records a pending credit and asks the payment
    /// provider for a checkout redirect. Nothing is credited until the
    /// payment is confirmed.
    pub async fn top_up(&self, user_id: &str, request: TopUpRequest) -> AppResult<TopUpResponse> {
        if request.amount < self.policy.topup_min || request.amount > self.policy.topup_max {
            return Err(AppError::ValidationError(format!(
                "Top-up amount must be between {} and {} centavos",
                self.policy.topup_min, self.policy.topup_max
            )));
        }

        let wallet = self.get_or_create_wallet(user_id).await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(&wallet.id, key).await? {
                return Ok(TopUpResponse {
                    transaction: existing.into(),
                    redirect_url: None,
                    replayed: true,
                });
            }
        }

        let reference = generate_reference_code("TOPUP");
        let method = request
            .payment_method
            .unwrap_or_else(|| "gcash".to_string());
        let description = request
            .description
            .unwrap_or_else(|| "Wallet top-up".to_string());

        let tx_id = Uuid::new_v4().to_string();
        let insert = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, tx_type, amount, description, payment_method,
                status, idempotency_key, provider_reference, transaction_date
            ) VALUES (?, ?, 'credit', ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(&tx_id)
        .bind(&wallet.id)
        .bind(request.amount)
        .bind(&description)
        .bind(&method)
        .bind(&request.idempotency_key)
        .bind(&reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(AppError::from);

        if let Err(e) = insert {
            if e.is_unique_violation() {
                // A concurrent request with the same key won the insert.
                if let Some(key) = request.idempotency_key.as_deref() {
                    if let Some(existing) = self.find_by_idempotency_key(&wallet.id, key).await? {
                        return Ok(TopUpResponse {
                            transaction: existing.into(),
                            redirect_url: None,
                            replayed: true,
                        });
                    }
                }
            }
            return Err(e);
        }

        let session = match self
            .payments
            .create_checkout(&reference, request.amount, &method, &description)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                // The pending row must not stay redeemable without a
                // provider session behind it.
                self.mark_top_up_failed(&reference).await?;
                return Err(e);
            }
        };

        let transaction = self.require_transaction(&tx_id).await?;
        log::info!("Top-up {reference} created for wallet {}", wallet.id);

        Ok(TopUpResponse {
            transaction: transaction.into(),
            redirect_url: Some(session.checkout_url),
            replayed: false,
        })
    }

    /// Confirms a pending top-up on behalf of its owner. The flip from
    /// pending to completed and the balance credit commit together.
    pub async fn confirm_top_up(
        &self,
        user_id: &str,
        reference: &str,
    ) -> AppResult<ConfirmTopUpResponse> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        let transaction = self
            .find_top_up(reference)
            .await?
            .filter(|t| t.wallet_id == wallet.id)
            .ok_or_else(|| AppError::NotFound(format!("Top-up {reference} not found")))?;

        self.settle_top_up(transaction).await
    }

    /// Webhook-driven settlement; trusts the already-verified event.
    pub async fn apply_webhook_event(&self, event: &PaymentWebhookEvent) -> AppResult<()> {
        match event.event_type.as_str() {
            "payment.succeeded" => {
                let transaction = self
                    .find_top_up(&event.reference)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Top-up {} not found", event.reference))
                    })?;
                if let Some(amount) = event.amount {
                    if amount != transaction.amount {
                        return Err(AppError::ValidationError(format!(
                            "Webhook amount {amount} does not match transaction {}",
                            transaction.amount
                        )));
                    }
                }
                self.settle_top_up(transaction).await?;
                Ok(())
            }
            "payment.failed" => self.mark_top_up_failed(&event.reference).await,
            other => {
                log::warn!("Ignoring unknown webhook event type {other}");
                Ok(())
            }
        }
    }

    async fn settle_top_up(&self, transaction: Transaction) -> AppResult<ConfirmTopUpResponse> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE transactions SET status = 'completed' WHERE id = ? AND status = 'pending'",
        )
        .bind(&transaction.id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            // Already settled (or failed); never credit twice.
            return Err(AppError::Conflict(format!(
                "Top-up {} is not pending",
                transaction.id
            )));
        }

        sqlx::query("UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?")
            .bind(transaction.amount)
            .bind(Utc::now())
            .bind(&transaction.wallet_id)
            .execute(&mut *tx)
            .await?;

        let new_balance: i64 = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = ?")
            .bind(&transaction.wallet_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!(
            "Top-up {} completed, wallet {} balance {new_balance}",
            transaction.id,
            transaction.wallet_id
        );

        let settled = self.require_transaction(&transaction.id).await?;
        Ok(ConfirmTopUpResponse {
            transaction: settled.into(),
            new_balance,
        })
    }

    pub async fn mark_top_up_failed(&self, reference: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET status = 'failed'
            WHERE (provider_reference = ? OR id = ?) AND status = 'pending'
            "#,
        )
        .bind(reference)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            log::info!("Top-up {reference} marked failed");
        }
        Ok(())
    }

    /// Spends from the wallet. The balance check and decrement are one
    /// conditional update, so concurrent debits cannot overdraw.
    pub async fn debit(&self, user_id: &str, request: PayRequest) -> AppResult<PayResponse> {
        if request.amount <= 0 {
            return Err(AppError::ValidationError(
                "Debit amount must be positive".to_string(),
            ));
        }
        if request.amount > self.policy.debit_ceiling {
            return Err(AppError::ValidationError(format!(
                "Debit amount exceeds the {} centavo ceiling",
                self.policy.debit_ceiling
            )));
        }

        let wallet = self.get_or_create_wallet(user_id).await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(&wallet.id, key).await? {
                let balance = self.current_balance(&wallet.id).await?;
                return Ok(PayResponse {
                    transaction: existing.into(),
                    new_balance: balance,
                    replayed: true,
                });
            }
        }

        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            "UPDATE wallets SET balance = balance - ?, updated_at = ? WHERE id = ? AND balance >= ?",
        )
        .bind(request.amount)
        .bind(Utc::now())
        .bind(&wallet.id)
        .bind(request.amount)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            return Err(AppError::InsufficientFunds);
        }

        let tx_id = Uuid::new_v4().to_string();
        let insert = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, tx_type, amount, description, payment_method,
                status, order_id, idempotency_key, transaction_date
            ) VALUES (?, ?, 'debit', ?, ?, 'wallet', 'completed', ?, ?, ?)
            "#,
        )
        .bind(&tx_id)
        .bind(&wallet.id)
        .bind(request.amount)
        .bind(&request.description)
        .bind(&request.order_id)
        .bind(&request.idempotency_key)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(AppError::from);

        if let Err(e) = insert {
            if e.is_unique_violation() {
                // Lost the idempotency race; roll back our debit and replay
                // the winner.
                tx.rollback().await?;
                if let Some(key) = request.idempotency_key.as_deref() {
                    if let Some(existing) = self.find_by_idempotency_key(&wallet.id, key).await? {
                        let balance = self.current_balance(&wallet.id).await?;
                        return Ok(PayResponse {
                            transaction: existing.into(),
                            new_balance: balance,
                            replayed: true,
                        });
                    }
                }
            }
            return Err(e);
        }

        let new_balance: i64 = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = ?")
            .bind(&wallet.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let transaction = self.require_transaction(&tx_id).await?;
        Ok(PayResponse {
            transaction: transaction.into(),
            new_balance,
            replayed: false,
        })
    }

    /// Credits a refund back to the user's wallet: balance bump plus a
    /// completed ledger row in one database transaction.
    pub async fn refund_credit(
        &self,
        user_id: &str,
        amount: i64,
        order_id: &str,
        description: &str,
    ) -> AppResult<Transaction> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "Refund credit must be positive".to_string(),
            ));
        }

        let wallet = self.get_or_create_wallet(user_id).await?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?")
            .bind(amount)
            .bind(Utc::now())
            .bind(&wallet.id)
            .execute(&mut *tx)
            .await?;

        let tx_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, tx_type, amount, description, payment_method,
                status, order_id, transaction_date
            ) VALUES (?, ?, 'credit', ?, ?, 'refund', 'completed', ?, ?)
            "#,
        )
        .bind(&tx_id)
        .bind(&wallet.id)
        .bind(amount)
        .bind(description)
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.require_transaction(&tx_id).await
    }

    pub async fn transactions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<TransactionResponse>> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        let limit = limit.unwrap_or(50).clamp(1, 200);

        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = ?
            ORDER BY transaction_date DESC
            LIMIT ?
            "#,
        )
        .bind(&wallet.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TransactionResponse::from).collect())
    }

    async fn find_wallet(&self, user_id: &str) -> AppResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }

    async fn current_balance(&self, wallet_id: &str) -> AppResult<i64> {
        let balance = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = ?")
            .bind(wallet_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(balance)
    }

    /// Looks a top-up transaction up by provider reference or by id; the
    /// client-facing confirm endpoint accepts either.
    async fn find_top_up(&self, reference: &str) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE (provider_reference = ? OR id = ?) AND tx_type = 'credit'",
        )
        .bind(reference)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    async fn find_by_idempotency_key(
        &self,
        wallet_id: &str,
        key: &str,
    ) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE wallet_id = ? AND idempotency_key = ?",
        )
        .bind(wallet_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    async fn require_transaction(&self, id: &str) -> AppResult<Transaction> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    async fn service() -> (WalletService, crate::database::DbPool) {
        let pool = mem_pool().await;
        let svc = WalletService::new(pool.clone(), payments_stub(), PolicyConfig::default());
        (svc, pool)
    }

    async fn seed_pending_top_up(
        pool: &crate::database::DbPool,
        wallet_id: &str,
        amount: i64,
        reference: &str,
    ) {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, tx_type, amount, payment_method, status,
                provider_reference, transaction_date
            ) VALUES (?, ?, 'credit', ?, 'gcash', 'pending', ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(wallet_id)
        .bind(amount)
        .bind(reference)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wallet_created_lazily_once() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        let first = svc.get_or_create_wallet(&user).await.unwrap();
        let second = svc.get_or_create_wallet(&user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.balance, 0);
    }

    #[tokio::test]
    async fn test_top_up_amount_limits() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;

        let too_small = svc
            .top_up(
                &user,
                TopUpRequest {
                    amount: 10_00,
                    payment_method: None,
                    description: None,
                    idempotency_key: None,
                },
            )
            .await;
        assert!(matches!(too_small, Err(AppError::ValidationError(_))));

        let too_large = svc
            .top_up(
                &user,
                TopUpRequest {
                    amount: 20_000_00,
                    payment_method: None,
                    description: None,
                    idempotency_key: None,
                },
            )
            .await;
        assert!(matches!(too_large, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_confirm_credits_exactly_once() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        let wallet_id = seed_wallet(&pool, &user, 0).await;
        seed_pending_top_up(&pool, &wallet_id, 500_00, "TOPUP-A").await;

        let confirmed = svc.confirm_top_up(&user, "TOPUP-A").await.unwrap();
        assert_eq!(confirmed.new_balance, 500_00);
        assert_eq!(confirmed.transaction.status, "completed");

        // Second settlement attempt conflicts and does not credit again.
        let replay = svc.confirm_top_up(&user, "TOPUP-A").await;
        assert!(matches!(replay, Err(AppError::Conflict(_))));
        assert_eq!(balance_of(&pool, &user).await, 500_00);
    }

    #[tokio::test]
    async fn test_webhook_settles_and_rejects_amount_mismatch() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        let wallet_id = seed_wallet(&pool, &user, 0).await;
        seed_pending_top_up(&pool, &wallet_id, 300_00, "TOPUP-B").await;

        let bad = svc
            .apply_webhook_event(&PaymentWebhookEvent {
                event_type: "payment.succeeded".to_string(),
                reference: "TOPUP-B".to_string(),
                amount: Some(999_00),
            })
            .await;
        assert!(matches!(bad, Err(AppError::ValidationError(_))));
        assert_eq!(balance_of(&pool, &user).await, 0);

        svc.apply_webhook_event(&PaymentWebhookEvent {
            event_type: "payment.succeeded".to_string(),
            reference: "TOPUP-B".to_string(),
            amount: Some(300_00),
        })
        .await
        .unwrap();
        assert_eq!(balance_of(&pool, &user).await, 300_00);
    }

    #[tokio::test]
    async fn test_webhook_failure_marks_pending_failed() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        let wallet_id = seed_wallet(&pool, &user, 0).await;
        seed_pending_top_up(&pool, &wallet_id, 300_00, "TOPUP-C").await;

        svc.apply_webhook_event(&PaymentWebhookEvent {
            event_type: "payment.failed".to_string(),
            reference: "TOPUP-C".to_string(),
            amount: None,
        })
        .await
        .unwrap();

        let confirm = svc.confirm_top_up(&user, "TOPUP-C").await;
        assert!(matches!(confirm, Err(AppError::Conflict(_))));
        assert_eq!(balance_of(&pool, &user).await, 0);
    }

    #[tokio::test]
    async fn test_debit_insufficient_funds_leaves_balance() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        seed_wallet(&pool, &user, 100_00).await;

        let result = svc
            .debit(
                &user,
                PayRequest {
                    amount: 150_00,
                    description: None,
                    order_id: None,
                    idempotency_key: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InsufficientFunds)));
        assert_eq!(balance_of(&pool, &user).await, 100_00);
    }

    #[tokio::test]
    async fn test_debit_idempotent_replay_single_ledger_row() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        seed_wallet(&pool, &user, 500_00).await;

        let request = || PayRequest {
            amount: 200_00,
            description: Some("snack".to_string()),
            order_id: None,
            idempotency_key: Some("key-1".to_string()),
        };

        let first = svc.debit(&user, request()).await.unwrap();
        assert!(!first.replayed);
        assert_eq!(first.new_balance, 300_00);

        let second = svc.debit(&user, request()).await.unwrap();
        assert!(second.replayed);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(second.new_balance, 300_00);

        let rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE idempotency_key = 'key-1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_refund_credit_adds_ledger_row() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        let vendor = seed_vendor(&pool).await;
        seed_wallet(&pool, &user, 0).await;

        let order_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_code, user_id, restaurant_id, items, total,
                payment_method, status, created_at, updated_at
            ) VALUES (?, 'BB-REFUND01', ?, ?, '[]', 15000, 'wallet', 'REJECTED', ?, ?)
            "#,
        )
        .bind(&order_id)
        .bind(&user)
        .bind(&vendor)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let tx = svc
            .refund_credit(&user, 150_00, &order_id, "Refund for order BB-REFUND01")
            .await
            .unwrap();
        assert_eq!(tx.tx_type, "credit");
        assert_eq!(tx.status, "completed");
        assert_eq!(balance_of(&pool, &user).await, 150_00);
    }

    #[tokio::test]
    async fn test_transactions_listing_clamped_and_ordered() {
        let (svc, pool) = service().await;
        let user = seed_student(&pool).await;
        seed_wallet(&pool, &user, 1_000_00).await;

        for i in 0..3 {
            svc.debit(
                &user,
                PayRequest {
                    amount: 10_00,
                    description: Some(format!("debit {i}")),
                    order_id: None,
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();
        }

        let all = svc.transactions(&user, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let limited = svc.transactions(&user, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        // Nonsense limits clamp instead of failing.
        let clamped = svc.transactions(&user, Some(-5)).await.unwrap();
        assert_eq!(clamped.len(), 1);
    }
}
