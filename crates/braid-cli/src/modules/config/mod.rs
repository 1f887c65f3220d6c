pub mod actions;
pub mod args;
pub mod context;
pub mod store;
pub mod types;

pub(crate) use actions::handle_context_command;
pub use context::DEFAULT_ENV_KEY;
pub use store::TEST_CLOUD_URL;
pub use types::*;
