use crate::error::AppError;
use crate::middlewares::auth::current_user;
use crate::models::*;
use crate::services::WalletService;
use actix_web::{web, HttpRequest, HttpResponse};

#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Wallet balance", body = WalletResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_wallet(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = wallet_service.get_balance(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/wallet/topup",
    tag = "wallet",
    request_body = TopUpRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending top-up with checkout redirect", body = TopUpResponse),
        (status = 400, description = "Amount outside limits"),
        (status = 503, description = "Payment provider unreachable")
    )
)]
pub async fn top_up(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    request: web::Json<TopUpRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = wallet_service.top_up(&user.user_id, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/wallet/topup/confirm",
    tag = "wallet",
    request_body = ConfirmTopUpRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Top-up settled", body = ConfirmTopUpResponse),
        (status = 404, description = "Unknown top-up"),
        (status = 409, description = "Already settled")
    )
)]
pub async fn confirm_top_up(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    request: web::Json<ConfirmTopUpRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = wallet_service
        .confirm_top_up(&user.user_id, &request.reference)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/wallet/pay",
    tag = "wallet",
    request_body = PayRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Debit settled", body = PayResponse),
        (status = 400, description = "Insufficient funds or invalid amount")
    )
)]
pub async fn pay(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    request: web::Json<PayRequest>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = wallet_service.debit(&user.user_id, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions",
    tag = "wallet",
    params(("limit" = Option<i64>, Query, description = "Max rows, clamped to 200")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ledger entries, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn transactions(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    query: web::Query<TransactionsQuery>,
) -> Result<HttpResponse, AppError> {
    let user = current_user(&req)?;
    let response = wallet_service.transactions(&user.user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub fn wallet_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("", web::get().to(get_wallet))
            .route("/topup", web::post().to(top_up))
            .route("/topup/confirm", web::post().to(confirm_top_up))
            .route("/pay", web::post().to(pay))
            .route("/transactions", web::get().to(transactions)),
    );
}
