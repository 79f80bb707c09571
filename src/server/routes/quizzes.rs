use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::{queries::questions::get_unseen_questions, Question},
    quiz::{choose_question, QuizCategory},
    server::app::AppState,
    telemetry::QUIZ_QUESTIONS_SERVED,
};

use super::{ApiError, ApiResponse};

#[derive(Debug, Deserialize)]
struct QuizRequest {
    #[serde(default)]
    quiz_category: Option<QuizCategory>,
    #[serde(default)]
    previous_questions: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
struct QuizQuestion {
    success: bool,
    question: Option<Question>,
}

async fn play_quiz(
    State(pool): State<SqlitePool>,
    body: Result<Json<QuizRequest>, JsonRejection>,
) -> ApiResponse<Json<QuizQuestion>> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!("Rejected quiz body: {rejection}");
        ApiError::Unprocessable
    })?;
    let (Some(category), Some(previous)) = (request.quiz_category, request.previous_questions)
    else {
        return Err(ApiError::Unprocessable);
    };
    let scope = category.scope().ok_or(ApiError::Unprocessable)?;

    let candidates = get_unseen_questions(&pool, scope.category(), &previous).await?;
    let question = choose_question(&candidates, &mut rand::rng());
    tracing::debug!(
        "Quiz over {} drew from {} candidates",
        scope.label(),
        candidates.len()
    );
    if question.is_some() {
        QUIZ_QUESTIONS_SERVED
            .with_label_values(&[scope.label().as_str()])
            .inc();
    }

    Ok(Json(QuizQuestion {
        success: true,
        question,
    }))
}

pub fn quizzes_router(state: AppState) -> Router {
    Router::new()
        .route("/quizzes", post(play_quiz))
        .with_state(state)
}
