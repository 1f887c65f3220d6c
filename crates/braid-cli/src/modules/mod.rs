pub mod apikey;
pub mod auth;
pub mod config;
pub mod environment;
pub mod kafka;
pub mod shared;
pub mod system;
