pub mod error;
pub mod types;

pub use error::{TriageError, TriageResult};
pub use types::RunInfo;
