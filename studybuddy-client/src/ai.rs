use regex::Regex;
use serde_json::{Value, json};

use crate::session::Session;

/// Shown whenever the proxy or the model lets us down; the UI never sees a
/// raw transport error.
pub const AI_FALLBACK_MESSAGE: &str =
    "Undskyld, der opstod en fejl i kommunikationen med AI-assistenten. Prøv venligst igen.";

/// What came back from a proxy function, decided once at this boundary so
/// no caller has to re-sniff the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyReply {
    Text(String),
    Structured(Value),
    Error(String),
}

impl ProxyReply {
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Client for the server-side AI proxy functions. Every call resolves to a
/// `ProxyReply`; nothing here throws past the UI boundary.
pub struct AiClient {
    session: Session,
}

impl AiClient {
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Free-form chat; the reply is plain text.
    pub async fn chat(&self, prompt: &str) -> ProxyReply {
        match self.post("/functions/chat", json!({ "prompt": prompt })).await {
            Ok(body) => body["response"].as_str().map_or_else(
                || ProxyReply::Error(AI_FALLBACK_MESSAGE.to_string()),
                |text| ProxyReply::Text(text.to_string()),
            ),
            Err(reply) => reply,
        }
    }

    /// Improved text plus suggestions and feedback for one note.
    pub async fn improve_note(&self, title: &str, content: &str) -> ProxyReply {
        let body = json!({ "noteTitle": title, "noteContent": content });
        match self.post("/functions/improve-note", body).await {
            Ok(result) => decide(result),
            Err(reply) => reply,
        }
    }

    pub async fn generate_quiz(&self, content: &str, subject: &str, count: u32) -> ProxyReply {
        let body = json!({
            "noteContent": content,
            "subject": subject,
            "questionCount": count,
            "questionTypes": ["multiple_choice", "true_false"],
        });
        match self.post("/functions/generate-quiz", body).await {
            Ok(mut result) => match result.get_mut("questions").map(Value::take) {
                Some(questions) => decide(questions),
                None => ProxyReply::Error(AI_FALLBACK_MESSAGE.to_string()),
            },
            Err(reply) => reply,
        }
    }

    pub async fn generate_exam(
        &self,
        notes: &[(String, String)],
        subject: &str,
        question_count: u32,
    ) -> ProxyReply {
        let notes: Vec<Value> = notes
            .iter()
            .map(|(title, content)| json!({ "title": title, "content": content }))
            .collect();
        let body = json!({
            "notes": notes,
            "subject": subject,
            "questionCount": question_count,
        });
        match self.post("/functions/generate-exam", body).await {
            Ok(result) => decide(result),
            Err(reply) => reply,
        }
    }

    pub async fn generate_flashcards(&self, content: &str, count: u32) -> ProxyReply {
        let body = json!({ "noteContent": content, "count": count });
        match self.post("/functions/generate-flashcards", body).await {
            Ok(mut result) => match result.get_mut("flashcards").map(Value::take) {
                Some(cards) => decide(cards),
                None => ProxyReply::Error(AI_FALLBACK_MESSAGE.to_string()),
            },
            Err(reply) => reply,
        }
    }

    /// One POST per capability; failures come back as the `Err` reply the
    /// caller hands straight to the UI.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ProxyReply> {
        let response = self
            .session
            .http()
            .post(self.session.url(path))
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("AI proxy call to {path} failed: {e}");
                return Err(ProxyReply::Error(AI_FALLBACK_MESSAGE.to_string()));
            }
        };

        if !response.status().is_success() {
            // Proxy functions report errors as an {"error": ...} body.
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| AI_FALLBACK_MESSAGE.to_string());
            return Err(ProxyReply::Error(message));
        }

        response.json::<Value>().await.map_err(|e| {
            tracing::error!("AI proxy reply from {path} was not JSON: {e}");
            ProxyReply::Error(AI_FALLBACK_MESSAGE.to_string())
        })
    }
}

/// Models sometimes hand back JSON as a string, wrapped in prose or a code
/// fence. Decide the final shape here: structured when anything parses,
/// plain text otherwise.
fn decide(value: Value) -> ProxyReply {
    match value {
        Value::String(text) => extract_structured(&text)
            .map_or(ProxyReply::Text(text), ProxyReply::Structured),
        other => ProxyReply::Structured(other),
    }
}

/// Direct parse first, then the widest bracketed span found in the text.
pub fn extract_structured(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    for pattern in [r"(?s)\[.*\]", r"(?s)\{.*\}"] {
        let found = Regex::new(pattern).expect("valid pattern").find(text);
        if let Some(found) = found {
            if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_parses_directly() {
        let value = extract_structured(r#"[{"front": "Q", "back": "A"}]"#).expect("array");
        assert_eq!(value[0]["front"], "Q");
    }

    #[test]
    fn json_wrapped_in_prose_still_parses() {
        let text = "Here are your flashcards!\n[{\"front\": \"Q\", \"back\": \"A\"}]\nGood luck!";
        let value = extract_structured(text).expect("array");
        assert_eq!(value[0]["back"], "A");
    }

    #[test]
    fn object_in_a_code_fence_still_parses() {
        let text = "```json\n{\"improvedText\": \"bedre\"}\n```";
        let value = extract_structured(text).expect("object");
        assert_eq!(value["improvedText"], "bedre");
    }

    #[test]
    fn plain_prose_yields_none() {
        assert!(extract_structured("Der er ingen JSON her.").is_none());
    }

    #[test]
    fn decide_prefers_structure_but_keeps_text() {
        let reply = decide(Value::String("[1, 2, 3]".to_string()));
        assert_eq!(reply, ProxyReply::Structured(serde_json::json!([1, 2, 3])));

        let reply = decide(Value::String("bare et svar".to_string()));
        assert_eq!(reply, ProxyReply::Text("bare et svar".to_string()));
    }
}
