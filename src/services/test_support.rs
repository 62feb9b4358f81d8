use crate::database::DbPool;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

pub(crate) async fn mem_pool() -> DbPool {
    // One connection: every handle sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub(crate) async fn seed_user(pool: &DbPool, role: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, role, status, created_at, updated_at)
        VALUES (?, ?, 'x', 'Test User', ?, 'active', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(format!("{id}@test.local"))
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed user");
    id
}

pub(crate) async fn seed_student(pool: &DbPool) -> String {
    let user_id = seed_user(pool, "student").await;
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO student_profiles (id, user_id, points, created_at, updated_at) VALUES (?, ?, 0, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed student profile");
    user_id
}

pub(crate) async fn seed_vendor(pool: &DbPool) -> String {
    let user_id = seed_user(pool, "vendor").await;
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO vendor_profiles (id, user_id, business_name, approval_status, created_at, updated_at)
        VALUES (?, ?, 'Test Eatery', 'approved', ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed vendor profile");
    user_id
}

/// Returns (user_id, delivery_staff_id).
pub(crate) async fn seed_staff(pool: &DbPool) -> (String, String) {
    let user_id = seed_user(pool, "delivery_staff").await;
    let staff_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO delivery_staff (id, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&staff_id)
        .bind(&user_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("seed delivery staff");
    (user_id, staff_id)
}

pub(crate) async fn seed_wallet(pool: &DbPool, user_id: &str, balance: i64) -> String {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO wallets (id, user_id, balance, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(balance)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed wallet");
    id
}

pub(crate) async fn balance_of(pool: &DbPool, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("wallet balance")
}

pub(crate) fn payments_stub() -> crate::external::PaymentsService {
    crate::external::PaymentsService::new(crate::config::PaymentsConfig {
        base_url: "http://localhost:1".to_string(),
        return_url: "http://localhost/wallet".to_string(),
        webhook_secret: "whsec_test".to_string(),
        request_timeout_secs: 1,
    })
}
