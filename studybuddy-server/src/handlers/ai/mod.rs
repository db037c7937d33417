use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_macros::debug_handler;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, service::AiError};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveNoteRequest {
    pub note_title: String,
    pub note_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub note_content: String,
    pub subject: String,
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default = "default_question_types")]
    pub question_types: Vec<String>,
}

fn default_question_count() -> u32 {
    5
}

fn default_question_types() -> Vec<String> {
    vec!["multiple_choice".to_string(), "true_false".to_string()]
}

#[derive(Debug, Deserialize)]
pub struct ExamNote {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRequest {
    pub notes: Vec<ExamNote>,
    pub subject: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_exam_question_count")]
    pub question_count: u32,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

const fn default_exam_question_count() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardsRequest {
    pub note_content: String,
    #[serde(default = "default_card_count")]
    pub count: u32,
}

const fn default_card_count() -> u32 {
    10
}

fn error_response(e: &AiError) -> Response {
    let status = match e {
        AiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        AiError::Upstream(_) | AiError::UpstreamStatus(_) | AiError::BadPayload => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

#[debug_handler]
pub async fn chat(State(state): State<AppState>, Json(payload): Json<ChatRequest>) -> Response {
    if payload.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Prompt is required" })),
        )
            .into_response();
    }

    match state.ai.chat(&payload.prompt).await {
        Ok(text) => (StatusCode::OK, Json(json!({ "response": text }))).into_response(),
        Err(e) => {
            tracing::error!("chat proxy call failed: {}", e);
            error_response(&e)
        }
    }
}

#[debug_handler]
pub async fn improve_note(
    State(state): State<AppState>,
    Json(payload): Json<ImproveNoteRequest>,
) -> Response {
    match state
        .ai
        .improve_note(&payload.note_title, &payload.note_content)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            tracing::error!("improve-note proxy call failed: {}", e);
            error_response(&e)
        }
    }
}

#[debug_handler]
pub async fn generate_quiz(
    State(state): State<AppState>,
    Json(payload): Json<QuizRequest>,
) -> Response {
    match state
        .ai
        .generate_quiz(
            &payload.note_content,
            &payload.subject,
            payload.question_count,
            &payload.question_types,
        )
        .await
    {
        Ok(questions) => (StatusCode::OK, Json(json!({ "questions": questions }))).into_response(),
        Err(e) => {
            tracing::error!("generate-quiz proxy call failed: {}", e);
            error_response(&e)
        }
    }
}

#[debug_handler]
pub async fn generate_exam(
    State(state): State<AppState>,
    Json(payload): Json<ExamRequest>,
) -> Response {
    let combined_content = payload
        .notes
        .iter()
        .map(|note| format!("{}\n{}", note.title, note.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    match state
        .ai
        .generate_exam(
            &combined_content,
            &payload.subject,
            &payload.difficulty,
            payload.question_count,
        )
        .await
    {
        Ok(questions) => {
            let total_questions = questions.as_array().map_or(0, Vec::len);
            let total_points: i64 = questions.as_array().map_or(0, |items| {
                items
                    .iter()
                    .map(|q| q.get("points").and_then(serde_json::Value::as_i64).unwrap_or(1))
                    .sum()
            });

            (
                StatusCode::OK,
                Json(json!({
                    "questions": questions,
                    "metadata": {
                        "subject": payload.subject,
                        "difficulty": payload.difficulty,
                        "totalQuestions": total_questions,
                        "totalPoints": total_points,
                    },
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("generate-exam proxy call failed: {}", e);
            error_response(&e)
        }
    }
}

#[debug_handler]
pub async fn generate_flashcards(
    State(state): State<AppState>,
    Json(payload): Json<FlashcardsRequest>,
) -> Response {
    match state
        .ai
        .generate_flashcards(&payload.note_content, payload.count)
        .await
    {
        Ok(flashcards) => {
            (StatusCode::OK, Json(json!({ "flashcards": flashcards }))).into_response()
        }
        Err(e) => {
            tracing::error!("generate-flashcards proxy call failed: {}", e);
            error_response(&e)
        }
    }
}
