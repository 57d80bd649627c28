use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TriageResult<T> = Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure_kind() {
        assert_eq!(
            TriageError::Config("weights sum to zero".into()).to_string(),
            "configuration error: weights sum to zero"
        );
        assert_eq!(
            TriageError::Input("bad json".into()).to_string(),
            "invalid input: bad json"
        );
    }
}
