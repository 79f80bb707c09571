use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    db::{
        queries::{
            categories::{get_all_categories, to_map, CategoryMap},
            questions,
        },
        NewQuestion, Question,
    },
    server::{
        app::AppState,
        deserializers::deserialize_non_blank,
        pagination::{paginate, PageQuery},
    },
    telemetry::QUESTIONS_CREATED,
};

use super::{ApiError, ApiResponse};

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(rename = "searchTerm")]
    search_term: String,
}

#[derive(Debug, Deserialize)]
struct CreateQuestionRequest {
    #[serde(default, deserialize_with = "deserialize_non_blank")]
    question: Option<String>,
    #[serde(default, deserialize_with = "deserialize_non_blank")]
    answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    difficulty: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    category: Option<i64>,
}

impl TryFrom<CreateQuestionRequest> for NewQuestion {
    type Error = ApiError;

    fn try_from(req: CreateQuestionRequest) -> Result<Self, Self::Error> {
        match (req.question, req.answer, req.difficulty, req.category) {
            (Some(question), Some(answer), Some(difficulty), Some(category)) => Ok(NewQuestion {
                question,
                answer,
                difficulty,
                category,
            }),
            _ => Err(ApiError::Unprocessable),
        }
    }
}

#[derive(Debug, Serialize)]
struct QuestionsPage {
    success: bool,
    questions: Vec<Question>,
    total_questions: usize,
    categories: CategoryMap,
}

#[derive(Debug, Serialize)]
struct SearchResults {
    success: bool,
    questions: Vec<Question>,
    total_questions: usize,
}

#[derive(Debug, Serialize)]
struct QuestionCreated {
    success: bool,
    created: i64,
    question_created: String,
    questions: Vec<Question>,
    total_questions: usize,
}

#[derive(Debug, Serialize)]
struct QuestionDeleted {
    success: bool,
    deleted: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PostQuestionsResponse {
    Search(SearchResults),
    Created(QuestionCreated),
}

// a query string that does not deserialize (e.g. a repeated `page`) means the first page
fn page_or_default(query: Result<Query<PageQuery>, QueryRejection>) -> PageQuery {
    match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::debug!("Ignoring query string: {rejection}");
            PageQuery::default()
        }
    }
}

async fn questions_page(
    State(pool): State<SqlitePool>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResponse<Json<QuestionsPage>> {
    let query = page_or_default(query);
    let questions = questions::get_all_questions(&pool).await?;
    let page = paginate(&questions, query.page());
    if page.is_empty() {
        return Err(ApiError::NotFound);
    }
    let categories = to_map(get_all_categories(&pool).await?);

    Ok(Json(QuestionsPage {
        success: true,
        questions: page.to_vec(),
        total_questions: questions.len(),
        categories,
    }))
}

async fn post_questions(
    State(pool): State<SqlitePool>,
    query: Result<Query<PageQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResponse<Json<PostQuestionsResponse>> {
    let query = page_or_default(query);
    let Json(body) = body?;
    let Some(fields) = body.as_object() else {
        return Err(ApiError::BadRequest);
    };

    let response = if fields.contains_key("searchTerm") {
        let search: SearchRequest =
            serde_json::from_value(body).map_err(|_| ApiError::BadRequest)?;
        PostQuestionsResponse::Search(search_questions(&pool, &search.search_term).await?)
    } else {
        let request: CreateQuestionRequest =
            serde_json::from_value(body).map_err(|_| ApiError::Unprocessable)?;
        PostQuestionsResponse::Created(create_question(&pool, request.try_into()?, query).await?)
    };
    Ok(Json(response))
}

async fn search_questions(pool: &SqlitePool, term: &str) -> ApiResponse<SearchResults> {
    let matches = questions::search_questions(pool, term).await?;
    tracing::debug!("Search for {term:?} matched {} questions", matches.len());
    if matches.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(SearchResults {
        success: true,
        questions: paginate(&matches, 1).to_vec(),
        total_questions: matches.len(),
    })
}

async fn create_question(
    pool: &SqlitePool,
    new_question: NewQuestion,
    query: PageQuery,
) -> ApiResponse<QuestionCreated> {
    let id = questions::create_question(pool, &new_question).await?;
    QUESTIONS_CREATED.inc();
    tracing::info!("Created question {id}");

    let all = questions::get_all_questions(pool).await?;
    Ok(QuestionCreated {
        success: true,
        created: id,
        question_created: new_question.question,
        questions: paginate(&all, query.page()).to_vec(),
        total_questions: all.len(),
    })
}

async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(question_id): Path<String>,
) -> ApiResponse<Json<QuestionDeleted>> {
    let id: i64 = question_id
        .parse()
        .map_err(|_| ApiError::Unprocessable)?;
    if questions::delete_question(&pool, id).await? == 0 {
        tracing::warn!("Refusing to delete unknown question {id}");
        return Err(ApiError::Unprocessable);
    }
    tracing::info!("Deleted question {id}");

    Ok(Json(QuestionDeleted {
        success: true,
        deleted: question_id,
    }))
}

pub fn questions_router(state: AppState) -> Router {
    Router::new()
        .route("/questions", get(questions_page).post(post_questions))
        .route("/questions/{id}", delete(delete_question))
        .with_state(state)
}
