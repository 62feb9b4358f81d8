use crate::config::PolicyConfig;
use crate::database::DbPool;
use crate::domain::{
    evaluate_refund, CancellationInitiator, ClaimedItem, RefundInput, RefundIssue, RefundType,
};
use crate::entities::{Order, Refund};
use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::{OrderItem, RefundRecordResponse, RefundRequest, RefundResponse};
use crate::services::NotificationService;
use chrono::Utc;
use uuid::Uuid;

/// Applies the refund-eligibility rules to a claim, records the audit row
/// and credits the wallet when the decision auto-approves. The credit and
/// the audit row commit in one database transaction.
#[derive(Clone)]
pub struct RefundService {
    pool: DbPool,
    notifications: NotificationService,
    policy: PolicyConfig,
}

impl RefundService {
    pub fn new(pool: DbPool, notifications: NotificationService, policy: PolicyConfig) -> Self {
        Self {
            pool,
            notifications,
            policy,
        }
    }

    pub async fn request_refund(
        &self,
        caller: &AuthUser,
        order_id: &str,
        request: RefundRequest,
    ) -> AppResult<RefundResponse> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

        if order.user_id != caller.user_id {
            return Err(AppError::Forbidden("Not your order".to_string()));
        }

        // One open claim per order.
        let open_claims: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM refunds WHERE order_id = ? AND status != 'REJECTED'",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        if open_claims > 0 {
            return Err(AppError::Conflict(format!(
                "A refund claim already exists for order {order_id}"
            )));
        }

        let issue: RefundIssue = request
            .issue
            .parse()
            .map_err(AppError::ValidationError)?;

        let order_status = order
            .status
            .parse()
            .map_err(AppError::InternalError)?;
        let items: Vec<OrderItem> = serde_json::from_str(&order.items).unwrap_or_default();
        let input = RefundInput {
            issue,
            order_status,
            order_total: order.total,
            order_items: items
                .iter()
                .map(|i| ClaimedItem {
                    name: i.item_name.clone(),
                    price: i.price,
                    quantity: i.quantity,
                })
                .collect(),
            claimed_item_names: request.items.clone(),
            delay_minutes: request.delay_minutes.unwrap_or(0),
            has_evidence: !request.evidence.is_empty(),
            initiator: request
                .initiated_by
                .as_deref()
                .map(CancellationInitiator::parse)
                .unwrap_or(CancellationInitiator::Customer),
        };

        let decision = evaluate_refund(&self.policy, &input);

        // Cash orders never auto-credit; the claim goes to manual review.
        let credited = decision.auto_approved
            && decision.approved_amount > 0
            && order.payment_method == "wallet";

        let status = if credited {
            "APPROVED"
        } else if decision.approved_amount == 0 && decision.refund_type != RefundType::Voucher {
            if !decision.auto_approved {
                "REJECTED"
            } else {
                "PENDING"
            }
        } else {
            "PENDING"
        };

        let refund_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let evidence_json = if request.evidence.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&request.evidence)?)
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, order_id, user_id, vendor_id, reason, amount, refund_type,
                status, evidence, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&refund_id)
        .bind(order_id)
        .bind(&order.user_id)
        .bind(&order.restaurant_id)
        .bind(request.issue.to_ascii_uppercase())
        .bind(decision.approved_amount)
        .bind(decision.refund_type.as_str())
        .bind(status)
        .bind(&evidence_json)
        .bind(&request.description)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if credited {
            let wallet_id: Option<String> =
                sqlx::query_scalar("SELECT id FROM wallets WHERE user_id = ?")
                    .bind(&order.user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let wallet_id = wallet_id.ok_or_else(|| {
                AppError::InternalError("Wallet order has no wallet".to_string())
            })?;

            sqlx::query("UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?")
                .bind(decision.approved_amount)
                .bind(now)
                .bind(&wallet_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO transactions (
                    id, wallet_id, tx_type, amount, description, payment_method,
                    status, order_id, transaction_date
                ) VALUES (?, ?, 'credit', ?, ?, 'refund', 'completed', ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&wallet_id)
            .bind(decision.approved_amount)
            .bind(format!("Refund for order {}", order.order_code))
            .bind(order_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        log::info!(
            "Refund {refund_id} for order {} decided: {} centavos, {}, credited={credited}",
            order.order_code,
            decision.approved_amount,
            decision.refund_type.as_str()
        );

        let body = if credited {
            format!(
                "{} centavos were credited back to your wallet",
                decision.approved_amount
            )
        } else if status == "PENDING" {
            "Your refund claim is under review".to_string()
        } else {
            "Your refund claim was not approved".to_string()
        };
        self.notifications
            .notify(
                &order.user_id,
                "student",
                "refund_decision",
                "Refund claim processed",
                &body,
                Some(serde_json::json!({ "order_id": order_id, "refund_id": refund_id })),
            )
            .await?;

        Ok(RefundResponse::from_decision(&decision, credited))
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<RefundRecordResponse>> {
        let rows = sqlx::query_as::<_, Refund>(
            "SELECT * FROM refunds WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefundRecordResponse::from).collect())
    }

    pub async fn list_pending(&self) -> AppResult<Vec<RefundRecordResponse>> {
        let rows = sqlx::query_as::<_, Refund>(
            "SELECT * FROM refunds WHERE status = 'PENDING' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefundRecordResponse::from).collect())
    }

    /// Manual review of a PENDING claim. Approval credits the wallet for
    /// wallet orders; the status flip is conditional so a claim settles
    /// exactly once.
    pub async fn process_refund(
        &self,
        admin_id: &str,
        refund_id: &str,
        approve: bool,
    ) -> AppResult<RefundRecordResponse> {
        let refund = sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?")
            .bind(refund_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Refund {refund_id} not found")))?;

        let next_status = if approve { "APPROVED" } else { "REJECTED" };

        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE refunds SET status = ?, processed_by = ?, updated_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(next_status)
        .bind(admin_id)
        .bind(Utc::now())
        .bind(refund_id)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Refund {refund_id} is not pending"
            )));
        }

        if approve && refund.amount > 0 {
            let payment_method: String =
                sqlx::query_scalar("SELECT payment_method FROM orders WHERE id = ?")
                    .bind(&refund.order_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if payment_method == "wallet" {
                let wallet_id: Option<String> =
                    sqlx::query_scalar("SELECT id FROM wallets WHERE user_id = ?")
                        .bind(&refund.user_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if let Some(wallet_id) = wallet_id {
                    sqlx::query(
                        "UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?",
                    )
                    .bind(refund.amount)
                    .bind(Utc::now())
                    .bind(&wallet_id)
                    .execute(&mut *tx)
                    .await?;
                    sqlx::query(
                        r#"
                        INSERT INTO transactions (
                            id, wallet_id, tx_type, amount, description, payment_method,
                            status, order_id, transaction_date
                        ) VALUES (?, ?, 'credit', ?, ?, 'refund', 'completed', ?, ?)
                        "#,
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&wallet_id)
                    .bind(refund.amount)
                    .bind("Refund approved after review")
                    .bind(&refund.order_id)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        self.notifications
            .notify(
                &refund.user_id,
                "student",
                "refund_decision",
                if approve { "Refund approved" } else { "Refund rejected" },
                &format!("Your refund claim for order {} was reviewed", refund.order_id),
                Some(serde_json::json!({ "refund_id": refund_id })),
            )
            .await?;

        let updated = sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?")
            .bind(refund_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(RefundRecordResponse::from(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::services::test_support::*;
    use crate::utils::generate_order_code;

    async fn setup() -> (RefundService, crate::database::DbPool, AuthUser, String) {
        let pool = mem_pool().await;
        let svc = RefundService::new(
            pool.clone(),
            NotificationService::new(pool.clone()),
            PolicyConfig::default(),
        );
        let student = seed_student(&pool).await;
        let vendor = seed_vendor(&pool).await;
        seed_wallet(&pool, &student, 0).await;
        let caller = AuthUser {
            user_id: student,
            role: Role::Student,
        };
        (svc, pool, caller, vendor)
    }

    async fn seed_order(
        pool: &crate::database::DbPool,
        user_id: &str,
        vendor_id: &str,
        status: &str,
        payment_method: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let items = serde_json::json!([
            { "item_id": null, "item_name": "Sisig Rice", "quantity": 1, "price": 30000 },
            { "item_id": null, "item_name": "Iced Tea", "quantity": 2, "price": 10000 }
        ]);
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_code, user_id, restaurant_id, items, total, payment_method, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 50000, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(generate_order_code())
        .bind(user_id)
        .bind(vendor_id)
        .bind(items.to_string())
        .bind(payment_method)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    fn claim(issue: &str) -> RefundRequest {
        RefundRequest {
            issue: issue.to_string(),
            description: None,
            delay_minutes: None,
            evidence: Vec::new(),
            items: Vec::new(),
            initiated_by: None,
        }
    }

    #[tokio::test]
    async fn test_late_40_minutes_credits_30_percent() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "DELIVERED", "wallet").await;

        let mut request = claim("LATE");
        request.delay_minutes = Some(40);
        let response = svc.request_refund(&caller, &order, request).await.unwrap();

        assert_eq!(response.approved_amount, 15000);
        assert_eq!(response.status, "APPROVED");
        assert_eq!(response.method.as_deref(), Some("wallet"));
        assert_eq!(balance_of(&pool, &caller.user_id).await, 15000);
    }

    #[tokio::test]
    async fn test_late_10_minutes_credits_nothing() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "DELIVERED", "wallet").await;

        let mut request = claim("LATE");
        request.delay_minutes = Some(10);
        let response = svc.request_refund(&caller, &order, request).await.unwrap();

        assert_eq!(response.approved_amount, 0);
        assert_ne!(response.status, "APPROVED");
        assert_eq!(balance_of(&pool, &caller.user_id).await, 0);
    }

    #[tokio::test]
    async fn test_not_delivered_before_handoff_is_full_refund() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "PREPARING", "wallet").await;

        let response = svc
            .request_refund(&caller, &order, claim("NOT_DELIVERED"))
            .await
            .unwrap();

        assert_eq!(response.approved_amount, 50000);
        assert_eq!(response.status, "APPROVED");
        assert_eq!(balance_of(&pool, &caller.user_id).await, 50000);
    }

    #[tokio::test]
    async fn test_missing_items_credits_claimed_lines_only() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "DELIVERED", "wallet").await;

        let mut request = claim("MISSING_ITEMS");
        request.items = vec!["Iced Tea".to_string()];
        let response = svc.request_refund(&caller, &order, request).await.unwrap();

        // Two iced teas at 100 pesos each.
        assert_eq!(response.approved_amount, 20000);
        assert_eq!(balance_of(&pool, &caller.user_id).await, 20000);
    }

    #[tokio::test]
    async fn test_second_claim_for_same_order_conflicts() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "PREPARING", "wallet").await;

        svc.request_refund(&caller, &order, claim("NOT_DELIVERED"))
            .await
            .unwrap();
        let second = svc
            .request_refund(&caller, &order, claim("NOT_DELIVERED"))
            .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(balance_of(&pool, &caller.user_id).await, 50000);
    }

    #[tokio::test]
    async fn test_cash_order_goes_to_manual_review() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "PREPARING", "cash").await;

        let response = svc
            .request_refund(&caller, &order, claim("NOT_DELIVERED"))
            .await
            .unwrap();
        assert_eq!(response.status, "PENDING");
        assert_eq!(balance_of(&pool, &caller.user_id).await, 0);
    }

    #[tokio::test]
    async fn test_manual_review_settles_exactly_once() {
        let (svc, pool, caller, vendor) = setup().await;
        let order = seed_order(&pool, &caller.user_id, &vendor, "DELIVERED", "wallet").await;

        // Quality claim without evidence parks nothing; use a voucher-band
        // late claim to get a PENDING row.
        let mut request = claim("LATE");
        request.delay_minutes = Some(20);
        let response = svc.request_refund(&caller, &order, request).await.unwrap();
        assert_eq!(response.status, "PENDING");

        let pending = svc.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        let refund_id = pending[0].id.clone();

        let processed = svc.process_refund("admin-1", &refund_id, false).await.unwrap();
        assert_eq!(processed.status, "REJECTED");

        let again = svc.process_refund("admin-1", &refund_id, true).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(balance_of(&pool, &caller.user_id).await, 0);
    }
}
