#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod store;
pub mod tokens;

pub use crate::store::*;
pub use crate::tokens::*;
