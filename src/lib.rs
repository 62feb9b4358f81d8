pub mod config;
pub mod database;
pub mod domain;
pub mod entities;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod realtime;
pub mod services;
pub mod swagger;
pub mod utils;
