use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use triage_common::error::{TriageError, TriageResult};
use triage_scoring::{ClassifierConfig, Conversation};

/// Accepted input shapes: a bare array of conversations, or the extractor
/// cache object with a `sessions` (or `conversations`) array.
#[derive(Deserialize)]
#[serde(untagged)]
enum InputDocument {
    List(Vec<Conversation>),
    Wrapped {
        #[serde(alias = "sessions")]
        conversations: Vec<Conversation>,
    },
}

pub fn parse_conversations(raw: &str) -> TriageResult<Vec<Conversation>> {
    let document: InputDocument = serde_json::from_str(raw)
        .map_err(|e| TriageError::Input(format!("cannot parse conversations: {e}")))?;

    let conversations = match document {
        InputDocument::List(list) => list,
        InputDocument::Wrapped { conversations } => conversations,
    };

    let mut seen = HashSet::new();
    for conversation in &conversations {
        if !seen.insert(conversation.id.as_str()) {
            tracing::warn!(conversation_id = %conversation.id, "duplicate conversation id in input");
        }
    }

    Ok(conversations)
}

pub fn load_conversations(path: &Path) -> TriageResult<Vec<Conversation>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| TriageError::Input(format!("cannot read {}: {e}", path.display())))?;
    let conversations = parse_conversations(&raw)?;
    tracing::info!(
        path = %path.display(),
        conversations = conversations.len(),
        "loaded conversations"
    );
    Ok(conversations)
}

/// Built-in defaults unless a JSON config path is given.
pub fn load_classifier_config(path: Option<&Path>) -> TriageResult<ClassifierConfig> {
    match path {
        Some(path) => {
            let config = ClassifierConfig::from_path(path)?;
            tracing::info!(
                path = %path.display(),
                config_version = %config.config_version,
                "loaded classifier config"
            );
            Ok(config)
        }
        None => {
            let config = ClassifierConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}
