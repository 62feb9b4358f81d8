use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::models::*;
use crate::services::RewardService;
use actix_web::{web, HttpRequest, HttpResponse};

#[utoipa::path(
    get,
    path = "/api/v1/rewards",
    tag = "rewards",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Active reward catalog"))
)]
pub async fn catalog(
    reward_service: web::Data<RewardService>,
) -> Result<HttpResponse, AppError> {
    let rewards = reward_service.catalog().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rewards)))
}

#[utoipa::path(
    get,
    path = "/api/v1/rewards/points",
    tag = "rewards",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's points", body = PointsResponse))
)]
pub async fn points(
    reward_service: web::Data<RewardService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let points = reward_service.points(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(points)))
}

#[utoipa::path(
    post,
    path = "/api/v1/rewards/redeem",
    tag = "rewards",
    request_body = RedeemRewardRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Voucher minted", body = RedeemRewardResponse),
        (status = 400, description = "Not enough points")
    )
)]
pub async fn redeem(
    reward_service: web::Data<RewardService>,
    req: HttpRequest,
    request: web::Json<RedeemRewardRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = reward_service.redeem(&user.user_id, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/rewards/vouchers",
    tag = "rewards",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's vouchers, newest first"))
)]
pub async fn vouchers(
    reward_service: web::Data<RewardService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let vouchers = reward_service.vouchers(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(vouchers)))
}

pub fn rewards_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/rewards")
            .route("", web::get().to(catalog))
            .route("/points", web::get().to(points))
            .route("/redeem", web::post().to(redeem))
            .route("/vouchers", web::get().to(vouchers)),
    );
}
