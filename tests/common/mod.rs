#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tower::ServiceExt;
use trivia_api::db::queries::{categories, questions};
use trivia_api::db::{run_migrations, NewQuestion};

pub const CATEGORIES: [(i64, &str); 6] = [
    (1, "Science"),
    (2, "Art"),
    (3, "Geography"),
    (4, "History"),
    (5, "Entertainment"),
    (6, "Sports"),
];

pub const QUESTIONS: [(&str, &str, i64, i64); 13] = [
    ("Whose autobiography is entitled 'I Know Why the Caged Bird Sings'?", "Maya Angelou", 2, 4),
    ("What boxer's original name is Cassius Clay?", "Muhammad Ali", 1, 4),
    ("What movie earned Tom Hanks his third straight Oscar nomination, in 1996?", "Apollo 13", 4, 5),
    ("What actor did author Anne Rice first denounce, then praise in the role of her beloved Lestat?", "Tom Cruise", 4, 5),
    ("What was the title of the 1990 fantasy directed by Tim Burton about a young man with multi-bladed appendages?", "Edward Scissorhands", 3, 5),
    ("Which is the only team to play in every soccer World Cup tournament?", "Brazil", 3, 6),
    ("Which country won the first ever soccer World Cup in 1930?", "Uruguay", 4, 6),
    ("What is the largest lake in Africa?", "Lake Victoria", 2, 3),
    ("In which royal palace would you find the Hall of Mirrors?", "The Palace of Versailles", 3, 3),
    ("Which Dutch graphic artist, initials M C, was a creator of optical illusions?", "Escher", 1, 2),
    ("La Giaconda is better known as what?", "Mona Lisa", 3, 2),
    ("What is the heaviest organ in the human body?", "The Liver", 4, 1),
    ("Who discovered penicillin?", "Alexander Fleming", 3, 1),
];

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub async fn seed(pool: &SqlitePool) {
    for (id, kind) in CATEGORIES {
        categories::create_category(pool, Some(id), kind)
            .await
            .unwrap();
    }
    for (question, answer, difficulty, category) in QUESTIONS {
        questions::create_question(
            pool,
            &NewQuestion {
                question: question.to_owned(),
                answer: answer.to_owned(),
                difficulty,
                category,
            },
        )
        .await
        .unwrap();
    }
}

pub async fn seeded_app() -> (Router, SqlitePool) {
    let pool = memory_pool().await;
    seed(&pool).await;
    (trivia_api::server::app::build_router(pool.clone()), pool)
}

pub async fn empty_app() -> Router {
    trivia_api::server::app::build_router(memory_pool().await)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<String>) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .unwrap(),
    )
    .await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> TestResponse {
    post_raw(app, uri, body.to_string()).await
}

pub fn assert_error(response: &TestResponse, status: u16, message: &str) {
    assert_eq!(response.status.as_u16(), status, "{:?}", response.body);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], status);
    assert_eq!(response.body["message"], message);
}
