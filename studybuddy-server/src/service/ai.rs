use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::AiConfig;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI upstream is not configured")]
    NotConfigured,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("could not parse model output")]
    BadPayload,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Forwards single-purpose requests to an OpenAI-compatible
/// chat-completions API and normalizes the replies.
pub struct AiProxyService {
    client: reqwest::Client,
    cfg: AiConfig,
}

impl AiProxyService {
    pub fn new(cfg: AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, cfg }
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AiError> {
        let Some(api_key) = &self.cfg.api_key else {
            return Err(AiError::NotConfigured);
        };

        let body = json!({
            "model": self.cfg.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": max_tokens,
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&self.cfg.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::UpstreamStatus(response.status()));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AiError::BadPayload)
    }

    /// Free-form study mentoring; the reply stays plain text.
    pub async fn chat(&self, prompt: &str) -> Result<String, AiError> {
        self.complete(
            "You are a helpful AI study mentor. Provide clear, educational responses \
             to help students learn and understand concepts better. Keep responses \
             concise but informative.",
            prompt,
            500,
        )
        .await
    }

    pub async fn improve_note(&self, title: &str, content: &str) -> Result<Value, AiError> {
        let prompt = format!(
            "Analyze and improve the following study note. Provide:\n\n\
             1. An improved version with better structure, clarity, and completeness\n\
             2. Specific suggestions for what was improved\n\
             3. Constructive feedback on the original note\n\n\
             Note Title: {title}\n\n\
             Original Content:\n{content}\n\n\
             Return a JSON object with:\n\
             {{\n\
               \"improvedText\": \"the improved note content\",\n\
               \"suggestions\": \"list of specific improvements made\",\n\
               \"feedback\": \"constructive feedback for the student\"\n\
             }}\n\n\
             Return only valid JSON."
        );

        let text = self
            .complete(
                "You are an experienced study coach who helps students improve their \
                 note-taking. Always return valid JSON.",
                &prompt,
                2000,
            )
            .await?;

        extract_object(&text).ok_or(AiError::BadPayload)
    }

    pub async fn generate_quiz(
        &self,
        content: &str,
        subject: &str,
        question_count: u32,
        question_types: &[String],
    ) -> Result<Value, AiError> {
        let prompt = format!(
            "Create a quiz with {question_count} questions based on the following \
             content about {subject}.\n\n\
             Question types to include: {}\n\n\
             Note content:\n{content}\n\n\
             Format as a JSON array where each question has:\n\
             - type: \"multiple_choice\" or \"true_false\"\n\
             - question: the question text\n\
             - options: array of options (for multiple choice)\n\
             - correct_answer: the correct answer\n\
             - explanation: brief explanation of why this is correct\n\n\
             Return only the JSON array.",
            question_types.join(", ")
        );

        let text = self
            .complete(
                "You are a helpful assistant that creates educational quiz questions. \
                 Always return valid JSON.",
                &prompt,
                2000,
            )
            .await?;

        extract_array(&text).ok_or(AiError::BadPayload)
    }

    pub async fn generate_exam(
        &self,
        combined_content: &str,
        subject: &str,
        difficulty: &str,
        question_count: u32,
    ) -> Result<Value, AiError> {
        let prompt = format!(
            "Create a comprehensive exam with {question_count} questions for {subject} \
             at {difficulty} difficulty level.\n\n\
             Study materials:\n{combined_content}\n\n\
             Create a mix of:\n\
             - Multiple choice questions (60%)\n\
             - True/False questions (20%)\n\
             - Short answer questions (20%)\n\n\
             Format as JSON array where each question has:\n\
             - type: \"multiple_choice\", \"true_false\", or \"short_answer\"\n\
             - question: the question text\n\
             - options: array of options (for multiple choice)\n\
             - correct_answer: the correct answer\n\
             - points: point value (1-5 based on difficulty)\n\
             - explanation: brief explanation\n\n\
             Return only the JSON array."
        );

        let text = self
            .complete(
                "You are an experienced educator creating comprehensive exam questions. \
                 Always return valid JSON.",
                &prompt,
                3000,
            )
            .await?;

        extract_array(&text).ok_or(AiError::BadPayload)
    }

    pub async fn generate_flashcards(&self, content: &str, count: u32) -> Result<Value, AiError> {
        let prompt = format!(
            "Based on the following note content, generate {count} flashcards for \
             studying. Each flashcard should have a question (front) and answer (back). \
             Format as JSON array with objects containing \"front\" and \"back\" fields. \
             Make questions clear and answers concise.\n\n\
             Note content:\n{content}\n\n\
             Return only the JSON array, no other text."
        );

        let text = self
            .complete(
                "You are a helpful assistant that creates effective study flashcards. \
                 Always return valid JSON.",
                &prompt,
                2000,
            )
            .await?;

        extract_array(&text).ok_or(AiError::BadPayload)
    }
}

/// Direct parse first, then the widest `{...}` span found in the text.
/// Models occasionally wrap the JSON in prose or a code fence.
pub fn extract_object(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str(text) {
        return Some(value);
    }

    let pattern = Regex::new(r"(?s)\{.*\}").expect("valid pattern");
    let found = pattern.find(text)?;
    match serde_json::from_str(found.as_str()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Same fallback strategy for array-shaped replies.
pub fn extract_array(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Array(_)) = serde_json::from_str(text) {
        return Some(value);
    }

    let pattern = Regex::new(r"(?s)\[.*\]").expect("valid pattern");
    let found = pattern.find(text)?;
    match serde_json::from_str(found.as_str()) {
        Ok(value @ Value::Array(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_object_parses_directly() {
        let value = extract_object(r#"{"improvedText": "x", "feedback": "y"}"#).expect("object");
        assert_eq!(value["improvedText"], "x");
    }

    #[test]
    fn object_wrapped_in_prose_is_extracted() {
        let text = "Sure! Here is the result:\n{\"feedback\": \"solid\"}\nHope this helps.";
        let value = extract_object(text).expect("object");
        assert_eq!(value["feedback"], "solid");
    }

    #[test]
    fn array_in_code_fence_is_extracted() {
        let text = "```json\n[{\"front\": \"Q\", \"back\": \"A\"}]\n```";
        let value = extract_array(text).expect("array");
        assert_eq!(value[0]["front"], "Q");
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_object("no json here").is_none());
        assert!(extract_array("still { not json ] at all").is_none());
    }
}
