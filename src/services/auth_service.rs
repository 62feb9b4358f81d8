use crate::database::DbPool;
use crate::domain::Role;
use crate::entities::User;
use crate::error::{AppError, AppResult};
use crate::models::{
    AuthResponse, LoginRequest, RegisterRequest, StudentProfileResponse, TokenResponse,
    UserResponse,
};
use crate::utils::{hash_password, validate_password, verify_password, JwtService};
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt: JwtService) -> Self {
        Self { pool, jwt }
    }

    /// Registers a customer or a vendor application. Vendor signups land
    /// with the pending_vendor role until an admin approves them.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_ascii_lowercase();
        if !email.contains('@') {
            return Err(AppError::ValidationError("Invalid email".to_string()));
        }
        validate_password(&request.password)?;
        if request.full_name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Full name is required".to_string(),
            ));
        }

        let role = match request.role.as_str() {
            "student" => Role::Student,
            "vendor" => Role::PendingVendor,
            other => {
                return Err(AppError::ValidationError(format!(
                    "Cannot self-register as {other}"
                )))
            }
        };
        if role == Role::PendingVendor && request.business_name.as_deref().unwrap_or("").is_empty()
        {
            return Err(AppError::ValidationError(
                "Vendor registration requires a business name".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, organization, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(request.full_name.trim())
        .bind(role.as_str())
        .bind(&request.organization)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from);

        if let Err(e) = insert {
            if e.is_unique_violation() {
                return Err(AppError::Conflict("Email is already registered".to_string()));
            }
            return Err(e);
        }

        match role {
            Role::Student => {
                sqlx::query(
                    r#"
                    INSERT INTO student_profiles (id, user_id, organization_name, points, created_at, updated_at)
                    VALUES (?, ?, ?, 0, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&user_id)
                .bind(&request.organization)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            Role::PendingVendor => {
                sqlx::query(
                    r#"
                    INSERT INTO vendor_profiles (id, user_id, business_name, business_address, approval_status, created_at, updated_at)
                    VALUES (?, ?, ?, ?, 'pending', ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&user_id)
                .bind(request.business_name.as_deref().unwrap_or_default())
                .bind(&request.business_address)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            _ => unreachable!("self-registration only creates students and vendor applications"),
        }

        tx.commit().await?;

        let user = self.require_user(&user_id).await?;
        log::info!("Registered {} as {}", user.email, role);
        self.issue_auth_response(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = request.email.trim().to_ascii_lowercase();
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError("Invalid email or password".to_string()));
        }
        if user.status != "active" {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        self.issue_auth_response(user)
    }

    /// Exchanges a refresh token for a new pair. The user's current role is
    /// re-read so an approval that happened since issuance takes effect.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let claims = self.jwt.verify_refresh_token(refresh_token)?;
        let user = self.require_user(&claims.sub).await?;
        if user.status != "active" {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let role: Role = user
            .role
            .parse()
            .map_err(AppError::InternalError)?;
        self.issue_tokens(&user.id, role)
    }

    pub async fn me(&self, user_id: &str) -> AppResult<UserResponse> {
        let user = self.require_user(user_id).await?;
        Ok(UserResponse::from_entity(user))
    }

    pub async fn student_profile(&self, user_id: &str) -> AppResult<StudentProfileResponse> {
        let profile: Option<(Option<String>, i64)> = sqlx::query_as(
            "SELECT organization_name, points FROM student_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        let (organization_name, points) = profile
            .ok_or_else(|| AppError::NotFound("No student profile for caller".to_string()))?;

        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(StudentProfileResponse {
            organization_name,
            points,
            wallet_balance: balance.unwrap_or(0),
        })
    }

    fn issue_auth_response(&self, user: User) -> AppResult<AuthResponse> {
        let role: Role = user
            .role
            .parse()
            .map_err(AppError::InternalError)?;
        let tokens = self.issue_tokens(&user.id, role)?;
        Ok(AuthResponse {
            user: UserResponse::from_entity(user),
            tokens,
        })
    }

    fn issue_tokens(&self, user_id: &str, role: Role) -> AppResult<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.jwt.generate_access_token(user_id, role)?,
            refresh_token: self.jwt.generate_refresh_token(user_id, role)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expires_in(),
        })
    }

    async fn require_user(&self, user_id: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        user.ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::mem_pool;

    async fn setup() -> (AuthService, crate::database::DbPool) {
        let pool = mem_pool().await;
        let svc = AuthService::new(pool.clone(), JwtService::new("test-secret", 3600, 86400));
        (svc, pool)
    }

    fn student_registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "Passw0rd".to_string(),
            full_name: "Maria Santos".to_string(),
            role: "student".to_string(),
            organization: Some("Engineering".to_string()),
            business_name: None,
            business_address: None,
        }
    }

    #[tokio::test]
    async fn test_register_student_creates_profile() {
        let (svc, pool) = setup().await;
        let response = svc.register(student_registration("maria@campus.ph")).await.unwrap();
        assert_eq!(response.user.role, Role::Student);

        let profiles: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM student_profiles WHERE user_id = ?")
                .bind(&response.user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(profiles, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let (svc, _pool) = setup().await;
        svc.register(student_registration("taken@campus.ph")).await.unwrap();
        let second = svc.register(student_registration("taken@campus.ph")).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_vendor_registration_lands_as_pending_application() {
        let (svc, pool) = setup().await;
        let mut request = student_registration("tindahan@campus.ph");
        request.role = "vendor".to_string();
        request.business_name = Some("Tindahan ni Aling Nena".to_string());

        let response = svc.register(request).await.unwrap();
        assert_eq!(response.user.role, Role::PendingVendor);

        let status: String = sqlx::query_scalar(
            "SELECT approval_status FROM vendor_profiles WHERE user_id = ?",
        )
        .bind(&response.user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "pending");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let (svc, _pool) = setup().await;
        svc.register(student_registration("login@campus.ph")).await.unwrap();

        let ok = svc
            .login(LoginRequest {
                email: "login@campus.ph".to_string(),
                password: "Passw0rd".to_string(),
            })
            .await;
        assert!(ok.is_ok());

        let bad = svc
            .login(LoginRequest {
                email: "login@campus.ph".to_string(),
                password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(bad, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_change() {
        let (svc, pool) = setup().await;
        let mut request = student_registration("promo@campus.ph");
        request.role = "vendor".to_string();
        request.business_name = Some("Promo Foods".to_string());
        let registered = svc.register(request).await.unwrap();

        sqlx::query("UPDATE users SET role = 'vendor' WHERE id = ?")
            .bind(&registered.user.id)
            .execute(&pool)
            .await
            .unwrap();

        let tokens = svc.refresh(&registered.tokens.refresh_token).await.unwrap();
        let jwt = JwtService::new("test-secret", 3600, 86400);
        let claims = jwt.verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.role, Role::Vendor);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (svc, _pool) = setup().await;
        let registered = svc.register(student_registration("tok@campus.ph")).await.unwrap();
        let result = svc.refresh(&registered.tokens.access_token).await;
        assert!(result.is_err());
    }
}
