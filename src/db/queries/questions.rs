use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub difficulty: i64,
    pub category: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    pub difficulty: i64,
    pub category: i64,
}

const SELECT_QUESTIONS: &str = "SELECT id, question, answer, difficulty, category FROM questions";

pub async fn get_all_questions(pool: &SqlitePool) -> sqlx::Result<Vec<Question>> {
    sqlx::query_as::<_, Question>(&format!("{SELECT_QUESTIONS} ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn get_question_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Question>> {
    sqlx::query_as::<_, Question>(&format!("{SELECT_QUESTIONS} WHERE questions.id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_questions_for_category(
    pool: &SqlitePool,
    category: i64,
) -> sqlx::Result<Vec<Question>> {
    sqlx::query_as::<_, Question>(&format!(
        "{SELECT_QUESTIONS} WHERE questions.category = ?1 ORDER BY id"
    ))
    .bind(category)
    .fetch_all(pool)
    .await
}

/// Case-insensitive substring match on the question text. `%` and `_` in `term` match literally.
pub async fn search_questions(pool: &SqlitePool, term: &str) -> sqlx::Result<Vec<Question>> {
    sqlx::query_as::<_, Question>(&format!(
        "{SELECT_QUESTIONS} WHERE instr(lower(questions.question), lower(?1)) > 0 ORDER BY id"
    ))
    .bind(term)
    .fetch_all(pool)
    .await
}

/// Questions not listed in `exclude`, optionally restricted to one category.
pub async fn get_unseen_questions(
    pool: &SqlitePool,
    category: Option<i64>,
    exclude: &[i64],
) -> sqlx::Result<Vec<Question>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_QUESTIONS);
    query.push(" WHERE 1 = 1");
    if let Some(category) = category {
        query.push(" AND questions.category = ").push_bind(category);
    }
    if !exclude.is_empty() {
        query.push(" AND questions.id NOT IN (");
        let mut ids = query.separated(", ");
        for id in exclude {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }
    query.push(" ORDER BY id");
    query.build_query_as::<Question>().fetch_all(pool).await
}

pub async fn create_question(pool: &SqlitePool, question: &NewQuestion) -> sqlx::Result<i64> {
    insert_question(pool, None, question).await
}

async fn insert_question(
    pool: &SqlitePool,
    id: Option<i64>,
    question: &NewQuestion,
) -> sqlx::Result<i64> {
    let id = sqlx::query(
        r#"
INSERT INTO questions (id, question, answer, difficulty, category) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(id)
    .bind(&question.question)
    .bind(&question.answer)
    .bind(question.difficulty)
    .bind(question.category)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update_question(pool: &SqlitePool, question: &Question) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE questions SET question=?1, answer=?2, difficulty=?3, category=?4 WHERE questions.id = ?5
        "#,
    )
    .bind(&question.question)
    .bind(&question.answer)
    .bind(question.difficulty)
    .bind(question.category)
    .bind(question.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns the number of deleted rows.
pub async fn delete_question(pool: &SqlitePool, id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM questions WHERE questions.id = ?1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn import_questions(pool: &SqlitePool, questions: Vec<Question>) -> sqlx::Result<()> {
    let existing: HashSet<i64> = get_all_questions(pool)
        .await?
        .into_iter()
        .map(|q| q.id)
        .collect();
    for question in questions {
        if existing.contains(&question.id) {
            update_question(pool, &question).await?;
        } else {
            let id = question.id;
            insert_question(pool, Some(id), &question.into()).await?;
        }
    }
    Ok(())
}

impl From<Question> for NewQuestion {
    fn from(q: Question) -> Self {
        NewQuestion {
            question: q.question,
            answer: q.answer,
            difficulty: q.difficulty,
            category: q.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;

    fn new_question(text: &str, category: i64) -> NewQuestion {
        NewQuestion {
            question: text.to_owned(),
            answer: "answer".to_owned(),
            difficulty: 1,
            category,
        }
    }

    fn ids(questions: &[Question]) -> Vec<i64> {
        questions.iter().map(|q| q.id).collect()
    }

    #[tokio::test]
    async fn ids_keep_growing_after_delete() {
        let pool = memory_pool().await;
        let first = create_question(&pool, &new_question("a", 1)).await.unwrap();
        let second = create_question(&pool, &new_question("b", 1)).await.unwrap();
        assert_eq!(delete_question(&pool, second).await.unwrap(), 1);

        let third = create_question(&pool, &new_question("c", 1)).await.unwrap();
        assert!(second > first);
        assert!(third > second);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_touches_nothing() {
        let pool = memory_pool().await;
        assert_eq!(delete_question(&pool, 42).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_ignores_case_and_wildcards() {
        let pool = memory_pool().await;
        let title = create_question(&pool, &new_question("Whose autobiography is entitled?", 4))
            .await
            .unwrap();
        create_question(&pool, &new_question("What is the largest lake?", 3))
            .await
            .unwrap();
        let percent = create_question(&pool, &new_question("Is 100% a lot?", 1))
            .await
            .unwrap();

        assert_eq!(ids(&search_questions(&pool, "TITLE").await.unwrap()), [title]);
        assert_eq!(ids(&search_questions(&pool, "%").await.unwrap()), [percent]);
        assert!(search_questions(&pool, "zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unseen_questions_respect_category_and_exclusions() {
        let pool = memory_pool().await;
        let a = create_question(&pool, &new_question("a", 1)).await.unwrap();
        let b = create_question(&pool, &new_question("b", 1)).await.unwrap();
        let c = create_question(&pool, &new_question("c", 2)).await.unwrap();

        assert_eq!(ids(&get_unseen_questions(&pool, None, &[]).await.unwrap()), [a, b, c]);
        assert_eq!(ids(&get_unseen_questions(&pool, None, &[a, c]).await.unwrap()), [b]);
        assert_eq!(ids(&get_unseen_questions(&pool, Some(1), &[a]).await.unwrap()), [b]);
        assert!(get_unseen_questions(&pool, Some(2), &[c])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn import_upserts_by_id() {
        let pool = memory_pool().await;
        let id = create_question(&pool, &new_question("old", 1)).await.unwrap();

        import_questions(
            &pool,
            vec![
                Question {
                    id,
                    question: "new".to_owned(),
                    answer: "x".to_owned(),
                    difficulty: 2,
                    category: 5,
                },
                Question {
                    id: 20,
                    question: "imported".to_owned(),
                    answer: "y".to_owned(),
                    difficulty: 3,
                    category: 6,
                },
            ],
        )
        .await
        .unwrap();

        let updated = get_question_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(updated.question, "new");
        assert_eq!(updated.category, 5);
        assert!(get_question_by_id(&pool, 20).await.unwrap().is_some());
    }
}
