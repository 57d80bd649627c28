//! Prompt construction and response parsing for the grading rubric.

use crate::grading::{Assessment, GradingError, GradingRequest};
use crate::models::{Conversation, Role};

pub fn format_transcript(conversation: &Conversation) -> String {
    conversation
        .messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::Customer => "Customer",
                Role::Agent => "Agent",
                Role::System => "System",
            };
            format!("{speaker}: {}", m.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(conversation: &Conversation) -> String {
    format!(
        r#"You are reviewing an e-commerce customer support conversation between a customer and an AI support agent.

CONVERSATION:
{transcript}

Assess the conversation:
1. Resolution: was the customer's problem or question resolved?
2. Understanding: did the agent correctly understand the customer's requests?
3. Errors: were there errors, technical failures or misunderstandings by the agent?
4. Quality: overall quality of the service.
5. Score: an ERROR confidence score from 0 to 100:
   - 0-30: excellent service, no problems
   - 31-60: acceptable service, minor problems
   - 61-80: problematic service, significant errors
   - 81-100: failed service, severe errors

Reply ONLY with valid JSON in this exact shape, without markdown:
{{
  "resolved": true,
  "understood": true,
  "had_errors": false,
  "error_description": "errors found or 'none'",
  "quality": "excellent",
  "error_score": 15,
  "reasoning": "short explanation",
  "categories": ["short snake_case error categories, empty if none"]
}}"#,
        transcript = format_transcript(conversation)
    )
}

pub fn build_request(conversation: &Conversation) -> GradingRequest {
    GradingRequest {
        conversation_id: conversation.id.clone(),
        prompt: build_prompt(conversation),
    }
}

/// Pull the JSON object out of a model reply, tolerating code fences and
/// surrounding prose.
fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if open < close => &trimmed[open..=close],
        _ => trimmed,
    }
}

pub fn parse_assessment(reply: &str) -> Result<Assessment, GradingError> {
    let json = extract_json(reply);
    let assessment: Assessment =
        serde_json::from_str(json).map_err(|e| GradingError::Malformed(e.to_string()))?;
    assessment.check_score()?;
    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use crate::scorers::test_support::conversation;

    const REPLY: &str = r#"{"resolved": false, "understood": true, "had_errors": true,
        "error_description": "sent wrong tracking code", "quality": "poor",
        "error_score": 78, "reasoning": "customer repeated the question",
        "categories": ["wismo"]}"#;

    #[test]
    fn parses_plain_json() {
        let a = parse_assessment(REPLY).unwrap();
        assert_eq!(a.error_score, 78.0);
        assert!(a.had_errors);
        assert_eq!(a.categories, vec!["wismo"]);
    }

    #[test]
    fn parses_fenced_json() {
        let fenced = format!("Here is my analysis:\n```json\n{REPLY}\n```\nThanks");
        assert_eq!(parse_assessment(&fenced).unwrap().error_score, 78.0);

        let bare_fence = format!("```\n{REPLY}\n```");
        assert_eq!(parse_assessment(&bare_fence).unwrap().error_score, 78.0);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let a = parse_assessment(r#"{"error_score": 12}"#).unwrap();
        assert!(a.understood);
        assert!(!a.resolved);
        assert!(a.categories.is_empty());
    }

    #[test]
    fn missing_score_is_malformed() {
        let err = parse_assessment(r#"{"resolved": true}"#).unwrap_err();
        assert!(matches!(err, GradingError::Malformed(_)));
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let err = parse_assessment(r#"{"error_score": 250}"#).unwrap_err();
        assert!(matches!(err, GradingError::Malformed(_)));
    }

    #[test]
    fn prose_only_is_malformed() {
        assert!(parse_assessment("I cannot grade this conversation.").is_err());
    }

    #[test]
    fn prompt_embeds_transcript() {
        let conv = conversation(
            "s-9",
            SessionStatus::Completed,
            None,
            &[(Role::Customer, "Cadê meu pedido?"), (Role::Agent, "Já enviamos!")],
            30,
        );
        let request = build_request(&conv);
        assert_eq!(request.conversation_id, "s-9");
        assert!(request
            .prompt
            .contains("Customer: Cadê meu pedido?\n\nAgent: Já enviamos!"));
        assert!(request.prompt.contains("\"error_score\": 15"));
    }
}
