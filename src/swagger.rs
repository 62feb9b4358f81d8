use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::domain::{OrderStatus, RefundType, Role, UiStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::me,
        handlers::student::list_vendors,
        handlers::student::vendor_menu,
        handlers::student::create_order,
        handlers::student::list_orders,
        handlers::student::get_order,
        handlers::student::update_order_status,
        handlers::student::rate_order,
        handlers::student::request_refund,
        handlers::student::list_refunds,
        handlers::student::profile,
        handlers::vendor::list_orders,
        handlers::vendor::update_order_status,
        handlers::vendor::my_menu,
        handlers::vendor::create_item,
        handlers::vendor::update_item,
        handlers::vendor::delete_item,
        handlers::vendor::promote_item,
        handlers::staff::list_orders,
        handlers::staff::accept_order,
        handlers::staff::update_status,
        handlers::wallet::get_wallet,
        handlers::wallet::top_up,
        handlers::wallet::confirm_top_up,
        handlers::wallet::pay,
        handlers::wallet::transactions,
        handlers::rewards::catalog,
        handlers::rewards::points,
        handlers::rewards::redeem,
        handlers::rewards::vouchers,
        handlers::notifications::list,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::admin::vendor_applications,
        handlers::admin::approve_vendor,
        handlers::admin::reject_vendor,
        handlers::admin::pending_refunds,
        handlers::admin::approve_refund,
        handlers::admin::reject_refund,
        handlers::admin::stats,
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            UiStatus,
            RefundType,
            RegisterRequest,
            LoginRequest,
            RefreshTokenRequest,
            TokenResponse,
            UserResponse,
            AuthResponse,
            StudentProfileResponse,
            VendorApplicationResponse,
            AdminStatsResponse,
            CreateOrderRequest,
            CreateOrderItem,
            OrderItem,
            OrderPromos,
            UpdateOrderStatusRequest,
            DeliveryStatusUpdateRequest,
            RateOrderRequest,
            DeliveryStaffInfo,
            OrderResponse,
            DeliveryOrderResponse,
            WalletResponse,
            TransactionResponse,
            TopUpRequest,
            TopUpResponse,
            ConfirmTopUpRequest,
            ConfirmTopUpResponse,
            PayRequest,
            PayResponse,
            PaymentWebhookEvent,
            RefundRequest,
            RefundResponse,
            RefundRecordResponse,
            CreateMenuItemRequest,
            UpdateMenuItemRequest,
            MenuItemResponse,
            VendorSummaryResponse,
            RewardResponse,
            RedeemRewardRequest,
            RedeemRewardResponse,
            VoucherResponse,
            PointsResponse,
            NotificationResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and tokens"),
        (name = "student", description = "Browsing, ordering, refunds"),
        (name = "vendor", description = "Menu and order management"),
        (name = "delivery", description = "Courier order flow"),
        (name = "wallet", description = "Stored-value wallet"),
        (name = "rewards", description = "Points and vouchers"),
        (name = "notifications", description = "In-app notifications"),
        (name = "admin", description = "Platform administration"),
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
