pub mod actions;
pub mod args;

pub use args::{ClusterCommand, KafkaArgs, KafkaCommand};
