use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{AdminStatsResponse, VendorApplicationResponse};
use crate::services::NotificationService;
use chrono::Utc;

#[derive(Clone)]
pub struct AdminService {
    pool: DbPool,
    notifications: NotificationService,
}

impl AdminService {
    pub fn new(pool: DbPool, notifications: NotificationService) -> Self {
        Self {
            pool,
            notifications,
        }
    }

    pub async fn pending_vendor_applications(&self) -> AppResult<Vec<VendorApplicationResponse>> {
        let rows: Vec<(
            String,
            String,
            String,
            String,
            Option<String>,
            String,
            chrono::DateTime<Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.full_name, vp.business_name, vp.business_address,
                   vp.approval_status, vp.created_at
            FROM vendor_profiles vp
            JOIN users u ON u.id = vp.user_id
            WHERE vp.approval_status = 'pending'
            ORDER BY vp.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, email, full_name, business_name, business_address, approval_status, created_at)| {
                    VendorApplicationResponse {
                        user_id,
                        email,
                        full_name,
                        business_name,
                        business_address,
                        approval_status,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// Settles a vendor application. Approval also flips the user's role so
    /// their next token refresh carries vendor authority.
    pub async fn review_vendor_application(
        &self,
        vendor_user_id: &str,
        approve: bool,
    ) -> AppResult<VendorApplicationResponse> {
        let next_status = if approve { "approved" } else { "rejected" };
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE vendor_profiles SET approval_status = ?, updated_at = ?
            WHERE user_id = ? AND approval_status = 'pending'
            "#,
        )
        .bind(next_status)
        .bind(now)
        .bind(vendor_user_id)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "No pending application for user {vendor_user_id}"
            )));
        }

        if approve {
            sqlx::query(
                "UPDATE users SET role = 'vendor', updated_at = ? WHERE id = ? AND role = 'pending_vendor'",
            )
            .bind(now)
            .bind(vendor_user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.notifications
            .notify(
                vendor_user_id,
                "vendor",
                "vendor_application",
                if approve {
                    "Application approved"
                } else {
                    "Application rejected"
                },
                if approve {
                    "Your vendor application was approved. Sign in again to start selling."
                } else {
                    "Your vendor application was rejected."
                },
                None,
            )
            .await?;

        let row: (
            String,
            String,
            String,
            String,
            Option<String>,
            String,
            chrono::DateTime<Utc>,
        ) = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.full_name, vp.business_name, vp.business_address,
                   vp.approval_status, vp.created_at
            FROM vendor_profiles vp
            JOIN users u ON u.id = vp.user_id
            WHERE vp.user_id = ?
            "#,
        )
        .bind(vendor_user_id)
        .fetch_one(&self.pool)
        .await?;

        log::info!("Vendor application for {vendor_user_id} {next_status}");

        Ok(VendorApplicationResponse {
            user_id: row.0,
            email: row.1,
            full_name: row.2,
            business_name: row.3,
            business_address: row.4,
            approval_status: row.5,
            created_at: row.6,
        })
    }

    pub async fn stats(&self) -> AppResult<AdminStatsResponse> {
        let total_students: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'student'")
                .fetch_one(&self.pool)
                .await?;
        let total_vendors: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'vendor'")
                .fetch_one(&self.pool)
                .await?;
        let pending_vendor_applications: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vendor_profiles WHERE approval_status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        let completed_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE status IN ('COMPLETED', 'RATING_PENDING')",
        )
        .fetch_one(&self.pool)
        .await?;
        let gross_revenue: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status != 'REJECTED'",
        )
        .fetch_one(&self.pool)
        .await?;
        let refunds_approved: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM refunds WHERE status = 'APPROVED'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStatsResponse {
            total_students,
            total_vendors,
            pending_vendor_applications,
            total_orders,
            completed_orders,
            gross_revenue,
            refunds_approved,
        })
    }
}
