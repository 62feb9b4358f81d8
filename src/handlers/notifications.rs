use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::models::*;
use crate::services::NotificationService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(("limit" = Option<i64>, Query, description = "Max rows, clamped to 200")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's notifications, newest first"))
)]
pub async fn list(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    query: web::Query<NotificationsQuery>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let notifications = notification_service.list(&user.user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = String, Path, description = "Notification id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "Not found")
    )
)]
pub async fn mark_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    notification_service.mark_read(&user.user_id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message((), "Marked read".to_string())))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All notifications marked read"))
)]
pub async fn mark_all_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let updated = notification_service.mark_all_read(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "updated": updated }))))
}

pub fn notifications_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(list))
            .route("/{notification_id}/read", web::post().to(mark_read))
            .route("/read-all", web::post().to(mark_all_read)),
    );
}
