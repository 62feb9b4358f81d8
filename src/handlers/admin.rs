use crate::domain::Role;
use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::{AdminService, RefundService};
use actix_web::{web, HttpRequest, HttpResponse};

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admins only".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/vendor-applications",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Pending vendor applications, oldest first"))
)]
pub async fn vendor_applications(
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let applications = admin_service.pending_vendor_applications().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(applications)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/vendor-applications/{user_id}/approve",
    tag = "admin",
    params(("user_id" = String, Path, description = "Applicant user id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Application approved", body = VendorApplicationResponse),
        (status = 409, description = "Not pending")
    )
)]
pub async fn approve_vendor(
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let application = admin_service
        .review_vendor_application(&path.into_inner(), true)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(application)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/vendor-applications/{user_id}/reject",
    tag = "admin",
    params(("user_id" = String, Path, description = "Applicant user id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Application rejected", body = VendorApplicationResponse),
        (status = 409, description = "Not pending")
    )
)]
pub async fn reject_vendor(
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let application = admin_service
        .review_vendor_application(&path.into_inner(), false)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(application)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/refunds",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Refund claims awaiting review"))
)]
pub async fn pending_refunds(
    refund_service: web::Data<RefundService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let refunds = refund_service.list_pending().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(refunds)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/refunds/{refund_id}/approve",
    tag = "admin",
    params(("refund_id" = String, Path, description = "Refund id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Claim approved and credited", body = RefundRecordResponse),
        (status = 409, description = "Not pending")
    )
)]
pub async fn approve_refund(
    refund_service: web::Data<RefundService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let refund = refund_service
        .process_refund(&user.user_id, &path.into_inner(), true)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(refund)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/refunds/{refund_id}/reject",
    tag = "admin",
    params(("refund_id" = String, Path, description = "Refund id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Claim rejected", body = RefundRecordResponse),
        (status = 409, description = "Not pending")
    )
)]
pub async fn reject_refund(
    refund_service: web::Data<RefundService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let refund = refund_service
        .process_refund(&user.user_id, &path.into_inner(), false)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(refund)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Platform totals", body = AdminStatsResponse))
)]
pub async fn stats(
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    require_admin(&user)?;
    let stats = admin_service.stats().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/vendor-applications", web::get().to(vendor_applications))
            .route("/vendor-applications/{user_id}/approve", web::post().to(approve_vendor))
            .route("/vendor-applications/{user_id}/reject", web::post().to(reject_vendor))
            .route("/refunds", web::get().to(pending_refunds))
            .route("/refunds/{refund_id}/approve", web::post().to(approve_refund))
            .route("/refunds/{refund_id}/reject", web::post().to(reject_refund))
            .route("/stats", web::get().to(stats)),
    );
}
