use crate::config::PolicyConfig;
use crate::database::DbPool;
use crate::domain::{transition_allowed, OrderStatus, Role};
use crate::entities::{Order, Transaction};
use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::{
    CreateOrderRequest, DeliveryOrderResponse, DeliveryStaffInfo, OrderItem, OrderListQuery,
    OrderPromos, OrderResponse, RateOrderRequest,
};
use crate::realtime::{OrderEvent, RealtimeHub};
use crate::services::NotificationService;
use crate::utils::generate_order_code;
use chrono::Utc;
use uuid::Uuid;

/// Order lifecycle: creation with atomic wallet charge, the role-gated
/// status machine, courier assignment and rating. Status moves are
/// compare-and-set on the current status so a stale client loses with a
/// conflict instead of rewinding the order.
#[derive(Clone)]
pub struct OrderService {
    pool: DbPool,
    notifications: NotificationService,
    hub: RealtimeHub,
    policy: PolicyConfig,
}

impl OrderService {
    pub fn new(
        pool: DbPool,
        notifications: NotificationService,
        hub: RealtimeHub,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            pool,
            notifications,
            hub,
            policy,
        }
    }

    /// Places an order. For wallet payment the order insert, the balance
    /// decrement and the ledger row commit in one database transaction;
    /// an idempotency-key replay returns the original order unchanged.
    pub async fn create_order(
        &self,
        user_id: &str,
        request: CreateOrderRequest,
    ) -> AppResult<OrderResponse> {
        if request.items.is_empty() {
            return Err(AppError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }

        let payment_method = request
            .payment_method
            .clone()
            .unwrap_or_else(|| "wallet".to_string());
        if payment_method != "wallet" && payment_method != "cash" {
            return Err(AppError::ValidationError(format!(
                "Unsupported payment method: {payment_method}"
            )));
        }

        self.require_approved_vendor(&request.restaurant_id).await?;

        // Replay: the charge ledger row remembers which order a key made.
        if payment_method == "wallet" {
            if let Some(key) = request.idempotency_key.as_deref() {
                if let Some(existing) = self.find_charge_by_key(user_id, key).await? {
                    if let Some(order_id) = existing.order_id {
                        let order = self.require_order(&order_id).await?;
                        return Ok(OrderResponse::from_entity(order));
                    }
                }
            }
        }

        // Totals are computed here from the item lines; the client never
        // supplies a total.
        let mut items: Vec<OrderItem> = Vec::with_capacity(request.items.len());
        let mut subtotal: i64 = 0;
        for line in &request.items {
            if line.price < 0 || line.quantity <= 0 {
                return Err(AppError::ValidationError(
                    "Item lines must have non-negative price and positive quantity".to_string(),
                ));
            }
            subtotal = line
                .price
                .checked_mul(line.quantity)
                .and_then(|line_total| subtotal.checked_add(line_total))
                .ok_or_else(|| {
                    AppError::ValidationError("Order total is out of range".to_string())
                })?;
            items.push(OrderItem {
                item_id: line.id.clone(),
                item_name: line.name.clone(),
                quantity: line.quantity,
                price: line.price,
                customizations: line.customizations.clone(),
            });
        }

        let mut discount = request.discount_amount.unwrap_or(0).max(0);

        let mut tx = self.pool.begin().await?;

        // A voucher is consumed exactly once; the conditional flip loses
        // to any earlier redemption.
        if let Some(code) = request.voucher_code.as_deref() {
            let voucher_discount: Option<i64> = sqlx::query_scalar(
                "SELECT discount_amount FROM vouchers WHERE code = ? AND user_id = ?",
            )
            .bind(code)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
            let voucher_discount = voucher_discount
                .ok_or_else(|| AppError::NotFound(format!("Voucher {code} not found")))?;

            let now = Utc::now();
            let used = sqlx::query(
                "UPDATE vouchers SET used = 1, used_at = ? WHERE code = ? AND used = 0 AND expires_at > ?",
            )
            .bind(now)
            .bind(code)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            if used.rows_affected() == 0 {
                return Err(AppError::Conflict(format!(
                    "Voucher {code} is already used or expired"
                )));
            }
            discount += voucher_discount;
        }

        let discount = discount.min(subtotal);
        let total = subtotal - discount;

        let order_id = Uuid::new_v4().to_string();
        let order_code = generate_order_code();
        let now = Utc::now();
        let promos = OrderPromos {
            applied_deal_id: request.applied_deal_id.clone(),
            voucher_code: request.voucher_code.clone(),
            discount_amount: discount,
            original_subtotal: subtotal,
            fulfillment: request.service_type.clone(),
            payment_method: payment_method.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_code, user_id, restaurant_id, items, total,
                payment_method, status, promos, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING_CONFIRMATION', ?, ?, ?)
            "#,
        )
        .bind(&order_id)
        .bind(&order_code)
        .bind(user_id)
        .bind(&request.restaurant_id)
        .bind(serde_json::to_string(&items)?)
        .bind(total)
        .bind(&payment_method)
        .bind(serde_json::to_string(&promos)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if payment_method == "wallet" && total > 0 {
            if total > self.policy.debit_ceiling {
                return Err(AppError::ValidationError(format!(
                    "Order total exceeds the {} centavo wallet ceiling",
                    self.policy.debit_ceiling
                )));
            }

            let wallet_id: Option<String> =
                sqlx::query_scalar("SELECT id FROM wallets WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let wallet_id = wallet_id.ok_or(AppError::InsufficientFunds)?;

            let debited = sqlx::query(
                "UPDATE wallets SET balance = balance - ?, updated_at = ? WHERE id = ? AND balance >= ?",
            )
            .bind(total)
            .bind(now)
            .bind(&wallet_id)
            .bind(total)
            .execute(&mut *tx)
            .await?;
            if debited.rows_affected() == 0 {
                return Err(AppError::InsufficientFunds);
            }

            let insert = sqlx::query(
                r#"
                INSERT INTO transactions (
                    id, wallet_id, tx_type, amount, description, payment_method,
                    status, order_id, idempotency_key, transaction_date
                ) VALUES (?, ?, 'debit', ?, ?, 'wallet', 'completed', ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&wallet_id)
            .bind(total)
            .bind(format!("Order {order_code}"))
            .bind(&order_id)
            .bind(&request.idempotency_key)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from);

            if let Err(e) = insert {
                if e.is_unique_violation() {
                    // A concurrent request with the same key already placed
                    // and charged this order.
                    tx.rollback().await?;
                    if let Some(key) = request.idempotency_key.as_deref() {
                        if let Some(existing) = self.find_charge_by_key(user_id, key).await? {
                            if let Some(existing_order) = existing.order_id {
                                let order = self.require_order(&existing_order).await?;
                                return Ok(OrderResponse::from_entity(order));
                            }
                        }
                    }
                }
                return Err(e);
            }
        }

        tx.commit().await?;

        let order = self.require_order(&order_id).await?;
        log::info!("Order {order_code} created for {total} centavos ({payment_method})");

        self.notifications
            .notify(
                &request.restaurant_id,
                Role::Vendor.as_str(),
                "order_created",
                "New order",
                &format!("Order {order_code} is waiting for confirmation"),
                Some(serde_json::json!({ "order_id": order_id })),
            )
            .await?;
        self.publish_event("order_created", &order, None).await;

        Ok(OrderResponse::from_entity(order))
    }

    /// Moves an order along the status machine on behalf of the caller.
    /// `requested` accepts both the internal vocabulary and the simplified
    /// client one.
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        order_id: &str,
        requested: &str,
    ) -> AppResult<OrderResponse> {
        let order = self.require_order(order_id).await?;
        self.authorize_party(caller, &order).await?;

        let next = parse_requested_status(requested).ok_or_else(|| {
            AppError::ValidationError(format!("Unknown status: {requested}"))
        })?;

        self.transition(caller, order, next).await
    }

    /// Courier-facing status words map onto the internal machine before
    /// the same transition rules apply.
    pub async fn update_delivery_status(
        &self,
        caller: &AuthUser,
        order_id: &str,
        requested: &str,
    ) -> AppResult<OrderResponse> {
        let next = match requested {
            "picked-up" | "picked_up" => OrderStatus::OnTheWay,
            "arriving" => OrderStatus::ArrivingSoon,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            other => {
                return Err(AppError::ValidationError(format!(
                    "Unknown delivery status: {other}"
                )))
            }
        };

        let order = self.require_order(order_id).await?;
        self.authorize_party(caller, &order).await?;
        self.transition(caller, order, next).await
    }

    async fn transition(
        &self,
        caller: &AuthUser,
        order: Order,
        next: OrderStatus,
    ) -> AppResult<OrderResponse> {
        let current: OrderStatus = order
            .status
            .parse()
            .map_err(AppError::InternalError)?;
        let staff_assigned = order.assigned_staff_id.is_some();

        if !transition_allowed(caller.role, current, next, staff_assigned) {
            return Err(AppError::Forbidden(format!(
                "{} may not move order from {current} to {next}",
                caller.role
            )));
        }

        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now())
        .bind(&order.id)
        .bind(current.as_str())
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Order {} is no longer {current}",
                order.id
            )));
        }

        // First arrival at DELIVERED awards loyalty points. The CAS above
        // guarantees this block runs once per order.
        let mut reward_points = None;
        if next == OrderStatus::Delivered && self.policy.points_award_divisor > 0 {
            let points = order.total / self.policy.points_award_divisor;
            if points > 0 {
                sqlx::query(
                    "UPDATE student_profiles SET points = points + ?, updated_at = ? WHERE user_id = ?",
                )
                .bind(points)
                .bind(Utc::now())
                .bind(&order.user_id)
                .execute(&mut *tx)
                .await?;
                reward_points = Some(points);
            }
        }

        tx.commit().await?;

        // A wallet order rejected by the vendor is credited back in full.
        if next == OrderStatus::Rejected && order.payment_method == "wallet" && order.total > 0 {
            self.credit_rejected_order(&order).await?;
        }

        let updated = self.require_order(&order.id).await?;
        log::info!(
            "Order {} moved {current} -> {next} by {} ({})",
            order.order_code,
            caller.user_id,
            caller.role
        );

        // The status is committed; a failed notification write must not
        // turn a successful transition into a client-visible error.
        if let Err(e) = self.notify_status_change(&updated, next, reward_points).await {
            log::error!(
                "Status notification for order {} failed: {e}",
                updated.order_code
            );
        }
        self.publish_event("order_status_changed", &updated, reward_points)
            .await;

        Ok(OrderResponse::from_entity(updated))
    }

    async fn credit_rejected_order(&self, order: &Order) -> AppResult<()> {
        let wallet_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM wallets WHERE user_id = ?")
                .bind(&order.user_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(wallet_id) = wallet_id else {
            log::error!("Order {} has wallet payment but no wallet", order.id);
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?")
            .bind(order.total)
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
        .bind(order.total)
        .bind(format!("Refund for rejected order {}", order.order_code))
        .bind(&order.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Claims an order for delivery. The NULL check in the update makes
    /// the claim first-wins under concurrency.
    pub async fn accept_order(&self, caller: &AuthUser, order_id: &str) -> AppResult<OrderResponse> {
        if !caller.role.is_courier() {
            return Err(AppError::Forbidden(
                "Only delivery staff may accept orders".to_string(),
            ));
        }

        let staff_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM delivery_staff WHERE user_id = ?")
                .bind(&caller.user_id)
                .fetch_optional(&self.pool)
                .await?;
        let staff_id = staff_id.ok_or_else(|| {
            AppError::NotFound("No delivery staff profile for caller".to_string())
        })?;

        let claimed = sqlx::query(
            r#"
            UPDATE orders SET assigned_staff_id = ?, updated_at = ?
            WHERE id = ? AND assigned_staff_id IS NULL AND status = 'READY_FOR_PICKUP'
            "#,
        )
        .bind(&staff_id)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Order {order_id} is not available for pickup"
            )));
        }

        let order = self.require_order(order_id).await?;
        log::info!("Order {} claimed by staff {staff_id}", order.order_code);
        self.publish_event("order_assigned", &order, None).await;

        Ok(OrderResponse::from_entity(order))
    }

    /// Records the customer's rating and parks the order in RATING_PENDING.
    pub async fn rate_order(
        &self,
        caller: &AuthUser,
        order_id: &str,
        request: RateOrderRequest,
    ) -> AppResult<OrderResponse> {
        if !(1..=5).contains(&request.rating) {
            return Err(AppError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let order = self.require_order(order_id).await?;
        if order.user_id != caller.user_id {
            return Err(AppError::Forbidden("Not your order".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let rated = sqlx::query(
            r#"
            UPDATE orders SET rating = ?, status = 'RATING_PENDING', updated_at = ?
            WHERE id = ? AND rating IS NULL AND status IN ('DELIVERED', 'COMPLETED')
            "#,
        )
        .bind(request.rating)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
        if rated.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Order {order_id} cannot be rated"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO vendor_reviews (id, vendor_id, user_id, order_id, rating, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&order.restaurant_id)
        .bind(&caller.user_id)
        .bind(order_id)
        .bind(request.rating)
        .bind(&request.comment)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.notifications
            .notify(
                &order.restaurant_id,
                Role::Vendor.as_str(),
                "order_rated",
                "Order rated",
                &format!("Order {} received a {}-star rating", order.order_code, request.rating),
                Some(serde_json::json!({ "order_id": order_id })),
            )
            .await?;

        let updated = self.require_order(order_id).await?;
        self.publish_event("order_rated", &updated, None).await;
        Ok(OrderResponse::from_entity(updated))
    }

    pub async fn get_order(&self, caller: &AuthUser, order_id: &str) -> AppResult<OrderResponse> {
        let order = self.require_order(order_id).await?;
        self.authorize_party(caller, &order).await?;

        let staff = self.staff_info(order.assigned_staff_id.as_deref()).await?;
        let mut response = OrderResponse::from_entity(order);
        response.delivery_staff = staff;
        Ok(response)
    }

    pub async fn list_for_customer(
        &self,
        user_id: &str,
        query: &OrderListQuery,
    ) -> AppResult<Vec<OrderResponse>> {
        let orders = self
            .list_filtered("user_id", user_id, query.status.as_deref())
            .await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let staff = self.staff_info(order.assigned_staff_id.as_deref()).await?;
            let mut response = OrderResponse::from_entity(order);
            response.delivery_staff = staff;
            responses.push(response);
        }
        Ok(responses)
    }

    pub async fn list_for_vendor(
        &self,
        vendor_id: &str,
        query: &OrderListQuery,
    ) -> AppResult<Vec<DeliveryOrderResponse>> {
        let orders = self
            .list_filtered("restaurant_id", vendor_id, query.status.as_deref())
            .await?;
        self.to_delivery_responses(orders).await
    }

    /// Orders visible to a courier: unclaimed ready orders plus their own
    /// active deliveries.
    pub async fn list_for_courier(&self, staff_user_id: &str) -> AppResult<Vec<DeliveryOrderResponse>> {
        let staff_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM delivery_staff WHERE user_id = ?")
                .bind(staff_user_id)
                .fetch_optional(&self.pool)
                .await?;
        let staff_id = staff_id.ok_or_else(|| {
            AppError::NotFound("No delivery staff profile for caller".to_string())
        })?;

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE (status = 'READY_FOR_PICKUP' AND assigned_staff_id IS NULL)
               OR (assigned_staff_id = ? AND status IN ('READY_FOR_PICKUP', 'ON_THE_WAY', 'ARRIVING_SOON', 'DELIVERED'))
            ORDER BY created_at ASC
            "#,
        )
        .bind(&staff_id)
        .fetch_all(&self.pool)
        .await?;

        self.to_delivery_responses(orders).await
    }

    async fn list_filtered(
        &self,
        owner_column: &str,
        owner_id: &str,
        ui_status: Option<&str>,
    ) -> AppResult<Vec<Order>> {
        // owner_column is a compile-time constant from the callers above,
        // never request input.
        let mut sql = format!("SELECT * FROM orders WHERE {owner_column} = ?");
        let statuses = match ui_status {
            Some(s) => {
                let ui: crate::domain::UiStatus = s
                    .parse()
                    .map_err(|_| AppError::ValidationError(format!("Unknown status filter: {s}")))?;
                let db = ui.db_statuses();
                let placeholders = vec!["?"; db.len()].join(", ");
                sql.push_str(&format!(" AND status IN ({placeholders})"));
                db.iter().map(|s| s.as_str()).collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, Order>(&sql).bind(owner_id);
        for status in statuses {
            query = query.bind(status);
        }
        let orders = query.fetch_all(&self.pool).await?;
        Ok(orders)
    }

    async fn to_delivery_responses(
        &self,
        orders: Vec<Order>,
    ) -> AppResult<Vec<DeliveryOrderResponse>> {
        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let customer_name: Option<String> =
                sqlx::query_scalar("SELECT full_name FROM users WHERE id = ?")
                    .bind(&order.user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            let vendor: Option<(String, Option<String>)> = sqlx::query_as(
                "SELECT business_name, business_address FROM vendor_profiles WHERE user_id = ?",
            )
            .bind(&order.restaurant_id)
            .fetch_optional(&self.pool)
            .await?;
            let (restaurant_name, pickup_address) = match vendor {
                Some((name, address)) => (Some(name), address),
                None => (None, None),
            };

            let status: OrderStatus = order
                .status
                .parse()
                .unwrap_or(OrderStatus::PendingConfirmation);
            let items: Vec<OrderItem> = serde_json::from_str(&order.items).unwrap_or_default();

            responses.push(DeliveryOrderResponse {
                id: order.id,
                order_code: order.order_code,
                status,
                ui_status: status.ui_status(),
                total: order.total,
                items,
                customer_name,
                restaurant_name,
                pickup_address,
                delivery_address: None,
                assigned_staff_id: order.assigned_staff_id,
                created_at: order.created_at,
                updated_at: order.updated_at,
            });
        }
        Ok(responses)
    }

    /// A caller may act on an order only as one of its parties: the
    /// customer, the restaurant, the assigned courier, or an admin.
    async fn authorize_party(&self, caller: &AuthUser, order: &Order) -> AppResult<()> {
        let allowed = match caller.role {
            Role::Admin => true,
            Role::Student => order.user_id == caller.user_id,
            Role::Vendor => order.restaurant_id == caller.user_id,
            Role::DeliveryStaff | Role::Rider => match order.assigned_staff_id.as_deref() {
                Some(staff_id) => {
                    let staff_user: Option<String> =
                        sqlx::query_scalar("SELECT user_id FROM delivery_staff WHERE id = ?")
                            .bind(staff_id)
                            .fetch_optional(&self.pool)
                            .await?;
                    staff_user.as_deref() == Some(caller.user_id.as_str())
                }
                None => false,
            },
            Role::PendingVendor => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not a party to this order".to_string()))
        }
    }

    async fn require_approved_vendor(&self, vendor_id: &str) -> AppResult<()> {
        let approved: Option<String> = sqlx::query_scalar(
            "SELECT approval_status FROM vendor_profiles WHERE user_id = ?",
        )
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await?;

        match approved.as_deref() {
            Some("approved") => Ok(()),
            Some(_) => Err(AppError::Forbidden(
                "Vendor is not approved to take orders".to_string(),
            )),
            None => Err(AppError::NotFound(format!("Vendor {vendor_id} not found"))),
        }
    }

    async fn staff_info(&self, staff_id: Option<&str>) -> AppResult<Option<DeliveryStaffInfo>> {
        let Some(staff_id) = staff_id else {
            return Ok(None);
        };
        let info: Option<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT u.full_name, ds.phone, ds.profile_photo_url
            FROM delivery_staff ds
            JOIN users u ON u.id = ds.user_id
            WHERE ds.id = ?
            "#,
        )
        .bind(staff_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(info.map(|(full_name, phone, profile_photo_url)| DeliveryStaffInfo {
            full_name,
            phone,
            profile_photo_url,
        }))
    }

    async fn find_charge_by_key(&self, user_id: &str, key: &str) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT t.* FROM transactions t
            JOIN wallets w ON w.id = t.wallet_id
            WHERE w.user_id = ? AND t.idempotency_key = ?
            "#,
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    pub(crate) async fn require_order(&self, order_id: &str) -> AppResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        order.ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    async fn notify_status_change(
        &self,
        order: &Order,
        next: OrderStatus,
        reward_points: Option<i64>,
    ) -> AppResult<()> {
        let (title, body) = match next {
            OrderStatus::Confirmed => ("Order confirmed", "Your order was accepted".to_string()),
            OrderStatus::Preparing => ("Order preparing", "Your order is being prepared".to_string()),
            OrderStatus::ReadyForPickup => ("Order ready", "Your order is ready for pickup".to_string()),
            OrderStatus::OnTheWay => ("Order on the way", "Your order is on its way".to_string()),
            OrderStatus::ArrivingSoon => ("Arriving soon", "Your order is arriving soon".to_string()),
            OrderStatus::Delivered => match reward_points {
                Some(points) => (
                    "Order delivered",
                    format!("Your order was delivered. You earned {points} points"),
                ),
                None => ("Order delivered", "Your order was delivered".to_string()),
            },
            OrderStatus::Rejected => ("Order cancelled", "Your order was cancelled".to_string()),
            _ => return Ok(()),
        };

        self.notifications
            .notify(
                &order.user_id,
                Role::Student.as_str(),
                "order_status",
                title,
                &body,
                Some(serde_json::json!({
                    "order_id": order.id,
                    "status": next.as_str(),
                })),
            )
            .await
    }

    /// Broadcasts an order event to its vendor, customer and, when a
    /// courier holds the claim, the courier's own feed. Fan-out is
    /// best-effort; a failed staff lookup drops that audience, never the
    /// event.
    async fn publish_event(&self, event_type: &str, order: &Order, reward_points: Option<i64>) {
        let staff_user_id = match order.assigned_staff_id.as_deref() {
            Some(staff_id) => {
                match sqlx::query_scalar::<_, String>(
                    "SELECT user_id FROM delivery_staff WHERE id = ?",
                )
                .bind(staff_id)
                .fetch_optional(&self.pool)
                .await
                {
                    Ok(user_id) => user_id,
                    Err(e) => {
                        log::error!("Staff lookup for order {} event failed: {e}", order.id);
                        None
                    }
                }
            }
            None => None,
        };

        let status: OrderStatus = order
            .status
            .parse()
            .unwrap_or(OrderStatus::PendingConfirmation);
        self.hub.publish(&OrderEvent {
            event_type: event_type.to_string(),
            order_id: order.id.clone(),
            order_code: order.order_code.clone(),
            status,
            ui_status: status.ui_status(),
            vendor_id: order.restaurant_id.clone(),
            user_id: order.user_id.clone(),
            staff_user_id,
            reward_points,
        });
    }
}

/// Accepts the internal SCREAMING_SNAKE vocabulary as well as the client
/// one and maps each onto a target machine status.
fn parse_requested_status(requested: &str) -> Option<OrderStatus> {
    if let Ok(status) = requested.parse::<OrderStatus>() {
        return Some(status);
    }
    match requested.to_ascii_lowercase().as_str() {
        "pending" => Some(OrderStatus::PendingConfirmation),
        "confirmed" => Some(OrderStatus::Confirmed),
        "preparing" => Some(OrderStatus::Preparing),
        "ready" => Some(OrderStatus::ReadyForPickup),
        "in_progress" | "in-progress" => Some(OrderStatus::OnTheWay),
        "delivered" => Some(OrderStatus::Delivered),
        "completed" => Some(OrderStatus::Completed),
        "cancelled" | "canceled" | "rejected" => Some(OrderStatus::Rejected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requested_status_accepts_both_vocabularies() {
        assert_eq!(
            parse_requested_status("PREPARING"),
            Some(OrderStatus::Preparing)
        );
        assert_eq!(
            parse_requested_status("ready"),
            Some(OrderStatus::ReadyForPickup)
        );
        assert_eq!(
            parse_requested_status("cancelled"),
            Some(OrderStatus::Rejected)
        );
        assert_eq!(parse_requested_status("bogus"), None);
    }

    use crate::models::CreateOrderItem;
    use crate::services::test_support::*;
    use crate::services::NotificationService;

    async fn setup() -> (OrderService, crate::database::DbPool, String, String) {
        let pool = mem_pool().await;
        let svc = OrderService::new(
            pool.clone(),
            NotificationService::new(pool.clone()),
            RealtimeHub::new(),
            PolicyConfig::default(),
        );
        let student = seed_student(&pool).await;
        let vendor = seed_vendor(&pool).await;
        (svc, pool, student, vendor)
    }

    fn order_request(vendor: &str, key: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            restaurant_id: vendor.to_string(),
            items: vec![CreateOrderItem {
                id: None,
                name: "Sisig Rice".to_string(),
                quantity: 2,
                price: 250_00,
                customizations: None,
            }],
            payment_method: Some("wallet".to_string()),
            idempotency_key: key.map(str::to_string),
            applied_deal_id: None,
            discount_amount: None,
            voucher_code: None,
            service_type: Some("delivery".to_string()),
        }
    }

    fn as_user(id: &str, role: Role) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_wallet_order_charges_and_awards_points_on_delivery() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let (_, mut events) = svc
            .hub
            .subscribe(&[RealtimeHub::user_key(&student)]);

        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();
        assert_eq!(order.total, 500_00);
        assert_eq!(order.status, OrderStatus::PendingConfirmation);
        assert_eq!(balance_of(&pool, &student).await, 500_00);
        let created = events.try_recv().unwrap();
        assert!(created.contains("order_created"));

        // Vendor walks the forward chain.
        let vendor_user = as_user(&vendor, Role::Vendor);
        for step in ["CONFIRMED", "PAYMENT_PROCESSING", "preparing", "ready"] {
            svc.update_status(&vendor_user, &order.id, step).await.unwrap();
        }

        let (staff_user_id, _) = seed_staff(&pool).await;
        let courier = as_user(&staff_user_id, Role::DeliveryStaff);
        svc.accept_order(&courier, &order.id).await.unwrap();
        svc.update_delivery_status(&courier, &order.id, "picked-up")
            .await
            .unwrap();
        let delivered = svc
            .update_delivery_status(&courier, &order.id, "delivered")
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.ui_status, crate::domain::UiStatus::Completed);

        // 500 pesos at one point per 100 pesos.
        let points: i64 =
            sqlx::query_scalar("SELECT points FROM student_profiles WHERE user_id = ?")
                .bind(&student)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(points, 5);

        let mut saw_points_event = false;
        while let Ok(payload) = events.try_recv() {
            if payload.contains("\"reward_points\":5") {
                saw_points_event = true;
            }
        }
        assert!(saw_points_event);
    }

    #[tokio::test]
    async fn test_create_order_replays_on_same_idempotency_key() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;

        let first = svc
            .create_order(&student, order_request(&vendor, Some("order-key")))
            .await
            .unwrap();
        let second = svc
            .create_order(&student, order_request(&vendor, Some("order-key")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(balance_of(&pool, &student).await, 500_00);
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orders, 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_order_behind() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 100_00).await;

        let result = svc.create_order(&student, order_request(&vendor, None)).await;
        assert!(matches!(result, Err(AppError::InsufficientFunds)));
        assert_eq!(balance_of(&pool, &student).await, 100_00);
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orders, 0);
    }

    #[tokio::test]
    async fn test_vendor_cannot_close_out_assigned_delivery() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();

        let vendor_user = as_user(&vendor, Role::Vendor);
        for step in ["CONFIRMED", "PAYMENT_PROCESSING", "preparing", "ready"] {
            svc.update_status(&vendor_user, &order.id, step).await.unwrap();
        }

        let (staff_user_id, _) = seed_staff(&pool).await;
        let courier = as_user(&staff_user_id, Role::DeliveryStaff);
        svc.accept_order(&courier, &order.id).await.unwrap();

        let result = svc.update_status(&vendor_user, &order.id, "completed").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_pickup_order_closed_by_vendor_when_unassigned() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();

        let vendor_user = as_user(&vendor, Role::Vendor);
        for step in ["CONFIRMED", "PAYMENT_PROCESSING", "preparing", "ready", "completed"] {
            svc.update_status(&vendor_user, &order.id, step).await.unwrap();
        }

        let closed = svc.require_order(&order.id).await.unwrap();
        assert_eq!(closed.status, "COMPLETED");
    }

    #[tokio::test]
    async fn test_student_cancel_refunds_wallet() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();
        assert_eq!(balance_of(&pool, &student).await, 500_00);

        let student_user = as_user(&student, Role::Student);
        let cancelled = svc
            .update_status(&student_user, &order.id, "cancelled")
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Rejected);
        assert_eq!(balance_of(&pool, &student).await, 1_000_00);
    }

    #[tokio::test]
    async fn test_accept_order_is_first_wins() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();
        let vendor_user = as_user(&vendor, Role::Vendor);
        for step in ["CONFIRMED", "PAYMENT_PROCESSING", "preparing", "ready"] {
            svc.update_status(&vendor_user, &order.id, step).await.unwrap();
        }

        let (first_staff, _) = seed_staff(&pool).await;
        let (second_staff, _) = seed_staff(&pool).await;
        svc.accept_order(&as_user(&first_staff, Role::DeliveryStaff), &order.id)
            .await
            .unwrap();
        let second = svc
            .accept_order(&as_user(&second_staff, Role::Rider), &order.id)
            .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rate_order_once_and_parks_in_rating_pending() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();
        sqlx::query("UPDATE orders SET status = 'DELIVERED' WHERE id = ?")
            .bind(&order.id)
            .execute(&pool)
            .await
            .unwrap();

        let student_user = as_user(&student, Role::Student);
        let rated = svc
            .rate_order(
                &student_user,
                &order.id,
                RateOrderRequest {
                    rating: 4,
                    comment: Some("solid".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(rated.status, OrderStatus::RatingPending);

        let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vendor_reviews WHERE order_id = ?")
            .bind(&order.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(reviews, 1);

        let again = svc
            .rate_order(
                &student_user,
                &order.id,
                RateOrderRequest {
                    rating: 5,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_voucher_consumed_exactly_once() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 2_000_00).await;

        let reward_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO rewards (id, name, points_required, discount_amount, created_at) VALUES (?, 'Treat', 10, 5000, ?)",
        )
        .bind(&reward_id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO vouchers (id, user_id, reward_id, code, discount_amount, expires_at, used, created_at)
            VALUES (?, ?, ?, 'VCH-TEST', 5000, ?, 0, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&student)
        .bind(&reward_id)
        .bind(Utc::now() + chrono::Duration::days(7))
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let mut request = order_request(&vendor, None);
        request.voucher_code = Some("VCH-TEST".to_string());
        let order = svc.create_order(&student, request).await.unwrap();
        assert_eq!(order.total, 450_00);
        assert_eq!(balance_of(&pool, &student).await, 1_550_00);

        let mut replay = order_request(&vendor, None);
        replay.voucher_code = Some("VCH-TEST".to_string());
        let second = svc.create_order(&student, replay).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_assigned_courier_receives_delivery_events() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();
        let vendor_user = as_user(&vendor, Role::Vendor);
        for step in ["CONFIRMED", "PAYMENT_PROCESSING", "preparing", "ready"] {
            svc.update_status(&vendor_user, &order.id, step).await.unwrap();
        }

        let (staff_user_id, _) = seed_staff(&pool).await;
        let (_, mut events) = svc
            .hub
            .subscribe(&[RealtimeHub::staff_key(&staff_user_id)]);

        let courier = as_user(&staff_user_id, Role::DeliveryStaff);
        svc.accept_order(&courier, &order.id).await.unwrap();
        svc.update_delivery_status(&courier, &order.id, "picked-up")
            .await
            .unwrap();
        svc.update_delivery_status(&courier, &order.id, "delivered")
            .await
            .unwrap();

        let mut saw_delivered = false;
        while let Ok(payload) = events.try_recv() {
            if payload.contains("order_status_changed") && payload.contains("DELIVERED") {
                saw_delivered = true;
            }
        }
        assert!(saw_delivered);
    }

    #[tokio::test]
    async fn test_order_total_overflow_rejected() {
        let (svc, _pool, student, vendor) = setup().await;

        let mut request = order_request(&vendor, None);
        request.payment_method = Some("cash".to_string());
        request.items = vec![CreateOrderItem {
            id: None,
            name: "Sisig Rice".to_string(),
            quantity: 2,
            price: i64::MAX,
            customizations: None,
        }];

        let result = svc.create_order(&student, request).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_status_commit_survives_notification_failure() {
        let (svc, pool, student, vendor) = setup().await;
        seed_wallet(&pool, &student, 1_000_00).await;
        let order = svc
            .create_order(&student, order_request(&vendor, None))
            .await
            .unwrap();

        // With the notifications table gone every notify write errors.
        sqlx::query("DROP TABLE notifications")
            .execute(&pool)
            .await
            .unwrap();

        let vendor_user = as_user(&vendor, Role::Vendor);
        let confirmed = svc
            .update_status(&vendor_user, &order.id, "CONFIRMED")
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
    }
}
