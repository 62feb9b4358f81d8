pub mod hub;

pub use hub::{OrderEvent, RealtimeHub};
