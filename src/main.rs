use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use bitebay_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::PaymentsService,
    handlers,
    middlewares::{create_cors, AuthMiddleware},
    realtime::RealtimeHub,
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    let payments_service = PaymentsService::new(config.payments.clone());
    let hub = RealtimeHub::new();

    let notification_service = NotificationService::new(pool.clone());
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let wallet_service = WalletService::new(
        pool.clone(),
        payments_service.clone(),
        config.policy.clone(),
    );
    let order_service = OrderService::new(
        pool.clone(),
        notification_service.clone(),
        hub.clone(),
        config.policy.clone(),
    );
    let refund_service = RefundService::new(
        pool.clone(),
        notification_service.clone(),
        config.policy.clone(),
    );
    let menu_service = MenuService::new(pool.clone());
    let reward_service = RewardService::new(pool.clone(), config.policy.clone());
    let admin_service = AdminService::new(pool.clone(), notification_service.clone());

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let bind_addr = (config.server.host.clone(), config.server.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(wallet_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(refund_service.clone()))
            .app_data(web::Data::new(menu_service.clone()))
            .app_data(web::Data::new(reward_service.clone()))
            .app_data(web::Data::new(admin_service.clone()))
            .app_data(web::Data::new(notification_service.clone()))
            .app_data(web::Data::new(payments_service.clone()))
            .app_data(web::Data::new(hub.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .configure(handlers::realtime_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::student_config)
                    .configure(handlers::vendor_config)
                    .configure(handlers::staff_config)
                    .configure(handlers::wallet_config)
                    .configure(handlers::rewards_config)
                    .configure(handlers::notifications_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
