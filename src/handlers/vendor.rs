use crate::domain::Role;
use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::{MenuService, OrderService};
use actix_web::{web, HttpRequest, HttpResponse};

fn require_vendor(user: &AuthUser) -> Result<(), AppError> {
    match user.role {
        Role::Vendor => Ok(()),
        Role::PendingVendor => Err(AppError::Forbidden(
            "Vendor application is still pending".to_string(),
        )),
        _ => Err(AppError::Forbidden("Vendors only".to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/vendor/orders",
    tag = "vendor",
    params(("status" = Option<String>, Query, description = "Client-vocabulary status filter")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Orders for the caller's restaurant"))
)]
pub async fn list_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    let orders = order_service.list_for_vendor(&user.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

#[utoipa::path(
    put,
    path = "/api/v1/vendor/orders/{order_id}/status",
    tag = "vendor",
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
    require_vendor(&user)?;
    let order = order_service
        .update_status(&user, &path.into_inner(), &request.status)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/vendor/menu",
    tag = "vendor",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All menu items including unavailable ones"))
)]
pub async fn my_menu(
    menu_service: web::Data<MenuService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    let menu = menu_service.vendor_menu(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(menu)))
}

#[utoipa::path(
    post,
    path = "/api/v1/vendor/menu",
    tag = "vendor",
    request_body = CreateMenuItemRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Item created", body = MenuItemResponse))
)]
pub async fn create_item(
    menu_service: web::Data<MenuService>,
    req: HttpRequest,
    request: web::Json<CreateMenuItemRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    let item = menu_service
        .create_item(&user.user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(item)))
}

#[utoipa::path(
    put,
    path = "/api/v1/vendor/menu/{item_id}",
    tag = "vendor",
    params(("item_id" = String, Path, description = "Menu item id")),
    request_body = UpdateMenuItemRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Item updated", body = MenuItemResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_item(
    menu_service: web::Data<MenuService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<UpdateMenuItemRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    let item = menu_service
        .update_item(&user.user_id, &path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/vendor/menu/{item_id}",
    tag = "vendor",
    params(("item_id" = String, Path, description = "Menu item id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_item(
    menu_service: web::Data<MenuService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    menu_service.delete_item(&user.user_id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message((), "Deleted".to_string())))
}

#[utoipa::path(
    post,
    path = "/api/v1/vendor/menu/{item_id}/promote",
    tag = "vendor",
    params(("item_id" = String, Path, description = "Menu item id")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Item promoted, replacing any previous promotion", body = MenuItemResponse))
)]
pub async fn promote_item(
    menu_service: web::Data<MenuService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_vendor(&user)?;
    let item = menu_service
        .promote_item(&user.user_id, &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(item)))
}

pub fn vendor_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vendor")
            .route("/orders", web::get().to(list_orders))
            .route("/orders/{order_id}/status", web::put().to(update_order_status))
            .route("/menu", web::get().to(my_menu))
            .route("/menu", web::post().to(create_item))
            .route("/menu/{item_id}", web::put().to(update_item))
            .route("/menu/{item_id}", web::delete().to(delete_item))
            .route("/menu/{item_id}/promote", web::post().to(promote_item)),
    );
}
