pub mod common;
pub mod menu;
pub mod notification;
pub mod order;
pub mod refund;
pub mod reward;
pub mod user;
pub mod wallet;

pub use common::*;
pub use menu::*;
pub use notification::*;
pub use order::*;
pub use refund::*;
pub use reward::*;
pub use user::*;
pub use wallet::*;
