pub mod actions;
pub mod args;

pub use args::{ApiKeyArgs, ApiKeyCommand};
