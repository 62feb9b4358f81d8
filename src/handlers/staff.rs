use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::OrderService;
use actix_web::{web, HttpRequest, HttpResponse};

fn require_courier(user: &AuthUser) -> Result<(), AppError> {
    if user.role.is_courier() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Delivery staff only".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery/orders",
    tag = "delivery",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Unclaimed ready orders and the caller's active deliveries"))
)]
pub async fn list_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_courier(&user)?;
    let orders = order_service.list_for_courier(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/api/v1/delivery/orders/{order_id}/accept",
    tag = "delivery",
    params(("order_id" = String, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order claimed", body = OrderResponse),
        (status = 409, description = "Already claimed or not ready")
    )
)]
pub async fn accept_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_courier(&user)?;
    let order = order_service.accept_order(&user, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/delivery/orders/{order_id}/status",
    tag = "delivery",
    params(("order_id" = String, Path, description = "Order id")),
    request_body = DeliveryStatusUpdateRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order moved", body = OrderResponse),
        (status = 403, description = "Not the assigned courier"),
        (status = 409, description = "Order moved concurrently")
    )
)]
pub async fn update_status(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<DeliveryStatusUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_courier(&user)?;
    let order = order_service
        .update_delivery_status(&user, &path.into_inner(), &request.status)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub fn staff_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/delivery")
            .route("/orders", web::get().to(list_orders))
            .route("/orders/{order_id}/accept", web::post().to(accept_order))
            .route("/orders/{order_id}/status", web::put().to(update_status)),
    );
}
