use crate::domain::Role;
use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::{AuthService, MenuService, OrderService, RefundService};
use actix_web::{web, HttpRequest, HttpResponse};

fn require_student(user: &AuthUser) -> Result<(), AppError> {
    if user.role == Role::Student {
        Ok(())
    } else {
        Err(AppError::Forbidden("Students only".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/vendors",
    tag = "student",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Approved restaurants"))
)]
pub async fn list_vendors(
    menu_service: web::Data<MenuService>,
) -> Result<HttpResponse, AppError> {
    let vendors = menu_service.list_vendors().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(vendors)))
}

#[utoipa::path(
    get,
    path = "/api/v1/vendors/{vendor_id}/menu",
    tag = "student",
    params(("vendor_id" = String, Path, description = "Vendor user id")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Available menu items"))
)]
pub async fn vendor_menu(
    menu_service: web::Data<MenuService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let menu = menu_service.public_menu(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(menu)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "student",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Invalid order or insufficient funds"),
        (status = 403, description = "Vendor not approved")
    )
)]
pub async fn create_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_student(&user)?;
    let order = order_service
        .create_order(&user.user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "student",
    params(("status" = Option<String>, Query, description = "Client-vocabulary status filter")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's orders, newest first"))
)]
pub async fn list_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_student(&user)?;
    let orders = order_service.list_for_customer(&user.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    tag = "student",
    params(("order_id" = String, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order detail", body = OrderResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let order = order_service.get_order(&user, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{order_id}/status",
    tag = "student",
    params(("order_id" = String, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order moved", body = OrderResponse),
        (status = 403, description = "Transition not allowed for caller"),
        (status = 409, description = "Order moved concurrently")
    )
)]
pub async fn update_order_status(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let order = order_service
        .update_status(&user, &path.into_inner(), &request.status)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/rate",
    tag = "student",
    params(("order_id" = String, Path, description = "Order id")),
    request_body = RateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rating recorded", body = OrderResponse),
        (status = 409, description = "Order cannot be rated")
    )
)]
pub async fn rate_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<RateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_student(&user)?;
    let order = order_service
        .rate_order(&user, &path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/refund",
    tag = "student",
    params(("order_id" = String, Path, description = "Order id")),
    request_body = RefundRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Refund decision", body = RefundResponse),
        (status = 409, description = "Claim already filed")
    )
)]
pub async fn request_refund(
    refund_service: web::Data<RefundService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<RefundRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_student(&user)?;
    let decision = refund_service
        .request_refund(&user, &path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(decision)))
}

#[utoipa::path(
    get,
    path = "/api/v1/refunds",
    tag = "student",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's refund claims"))
)]
pub async fn list_refunds(
    refund_service: web::Data<RefundService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let refunds = refund_service.list_for_user(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(refunds)))
}

#[utoipa::path(
    get,
    path = "/api/v1/profile",
    tag = "student",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Points and wallet balance", body = StudentProfileResponse))
)]
pub async fn profile(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_student(&user)?;
    let profile = auth_service.student_profile(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(profile)))
}

pub fn student_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/vendors", web::get().to(list_vendors))
        .route("/vendors/{vendor_id}/menu", web::get().to(vendor_menu))
        .route("/orders", web::post().to(create_order))
        .route("/orders", web::get().to(list_orders))
        .route("/orders/{order_id}", web::get().to(get_order))
        .route("/orders/{order_id}/status", web::put().to(update_order_status))
        .route("/orders/{order_id}/rate", web::post().to(rate_order))
        .route("/orders/{order_id}/refund", web::post().to(request_refund))
        .route("/refunds", web::get().to(list_refunds))
        .route("/profile", web::get().to(profile));
}
