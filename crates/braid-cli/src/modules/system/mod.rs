pub mod analytics;
pub mod update;

pub use analytics::{Analytics, LogAnalytics};
pub use update::{DisabledUpdateClient, HttpUpdateClient, UpdateClient};
