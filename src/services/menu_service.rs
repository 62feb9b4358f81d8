use crate::database::DbPool;
use crate::entities::MenuItem;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateMenuItemRequest, MenuItemResponse, UpdateMenuItemRequest, VendorSummaryResponse,
};
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone)]
pub struct MenuService {
    pool: DbPool,
}

impl MenuService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_item(
        &self,
        vendor_id: &str,
        request: CreateMenuItemRequest,
    ) -> AppResult<MenuItemResponse> {
        if request.price < 0 {
            return Err(AppError::ValidationError(
                "Price must be non-negative".to_string(),
            ));
        }
        if !(0..=100).contains(&request.discount_percentage) {
            return Err(AppError::ValidationError(
                "Discount percentage must be between 0 and 100".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO menu_items (
                id, vendor_id, name, description, price, category, image_url,
                is_available, has_discount, discount_percentage, is_promoted,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(vendor_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.category)
        .bind(&request.image_url)
        .bind(request.is_available)
        .bind(request.has_discount)
        .bind(request.discount_percentage)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let item = self.require_item(&id).await?;
        Ok(item.into())
    }

    pub async fn update_item(
        &self,
        vendor_id: &str,
        item_id: &str,
        request: UpdateMenuItemRequest,
    ) -> AppResult<MenuItemResponse> {
        let item = self.require_owned_item(vendor_id, item_id).await?;

        if let Some(price) = request.price {
            if price < 0 {
                return Err(AppError::ValidationError(
                    "Price must be non-negative".to_string(),
                ));
            }
        }
        if let Some(pct) = request.discount_percentage {
            if !(0..=100).contains(&pct) {
                return Err(AppError::ValidationError(
                    "Discount percentage must be between 0 and 100".to_string(),
                ));
            }
        }

        sqlx::query(
            r#"
            UPDATE menu_items SET
                name = ?, description = ?, price = ?, category = ?, image_url = ?,
                is_available = ?, has_discount = ?, discount_percentage = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(request.name.unwrap_or(item.name))
        .bind(request.description.unwrap_or(item.description))
        .bind(request.price.unwrap_or(item.price))
        .bind(request.category.unwrap_or(item.category))
        .bind(request.image_url.or(item.image_url))
        .bind(request.is_available.unwrap_or(item.is_available))
        .bind(request.has_discount.unwrap_or(item.has_discount))
        .bind(request.discount_percentage.unwrap_or(item.discount_percentage))
        .bind(Utc::now())
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        let updated = self.require_item(item_id).await?;
        Ok(updated.into())
    }

    pub async fn delete_item(&self, vendor_id: &str, item_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = ? AND vendor_id = ?")
            .bind(item_id)
            .bind(vendor_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Menu item {item_id} not found")));
        }
        Ok(())
    }

    /// Promotes one item; at most one per vendor, so the previous promotion
    /// is cleared in the same transaction.
    pub async fn promote_item(&self, vendor_id: &str, item_id: &str) -> AppResult<MenuItemResponse> {
        self.require_owned_item(vendor_id, item_id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE menu_items SET is_promoted = 0 WHERE vendor_id = ? AND is_promoted = 1")
            .bind(vendor_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE menu_items SET is_promoted = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let item = self.require_item(item_id).await?;
        Ok(item.into())
    }

    pub async fn vendor_menu(&self, vendor_id: &str) -> AppResult<Vec<MenuItemResponse>> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT * FROM menu_items WHERE vendor_id = ? ORDER BY category, name",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items.into_iter().map(MenuItemResponse::from).collect())
    }

    /// The customer-facing menu only shows available items.
    pub async fn public_menu(&self, vendor_id: &str) -> AppResult<Vec<MenuItemResponse>> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT * FROM menu_items WHERE vendor_id = ? AND is_available = 1 ORDER BY category, name",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items.into_iter().map(MenuItemResponse::from).collect())
    }

    /// Approved restaurants for browsing.
    pub async fn list_vendors(&self) -> AppResult<Vec<VendorSummaryResponse>> {
        let rows: Vec<(String, String, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT vp.user_id, vp.business_name, vp.business_address, vp.logo_url
            FROM vendor_profiles vp
            WHERE vp.approval_status = 'approved'
            ORDER BY vp.business_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, business_address, logo_url)| VendorSummaryResponse {
                id,
                name,
                description: None,
                business_address,
                logo_url,
            })
            .collect())
    }

    async fn require_item(&self, item_id: &str) -> AppResult<MenuItem> {
        let item = sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items WHERE id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        item.ok_or_else(|| AppError::NotFound(format!("Menu item {item_id} not found")))
    }

    async fn require_owned_item(&self, vendor_id: &str, item_id: &str) -> AppResult<MenuItem> {
        let item = self.require_item(item_id).await?;
        if item.vendor_id != vendor_id {
            return Err(AppError::Forbidden("Not your menu item".to_string()));
        }
        Ok(item)
    }
}
