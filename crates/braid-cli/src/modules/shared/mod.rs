pub mod resolve;

pub use resolve::{ContextFlags, DynamicContext};
