pub mod admin;
pub mod auth;
pub mod notifications;
pub mod realtime;
pub mod rewards;
pub mod staff;
pub mod student;
pub mod vendor;
pub mod wallet;
pub mod webhook;

pub use admin::admin_config;
pub use auth::auth_config;
pub use notifications::notifications_config;
pub use realtime::realtime_config;
pub use rewards::rewards_config;
pub use staff::staff_config;
pub use student::student_config;
pub use vendor::vendor_config;
pub use wallet::wallet_config;
pub use webhook::webhook_config;
