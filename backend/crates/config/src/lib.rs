pub mod env;
pub mod tracing_init;

pub use env::{AppConfig, GraderSettings};
pub use tracing_init::init_tracing;
