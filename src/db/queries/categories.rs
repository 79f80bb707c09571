use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
}

/// Categories keyed by id, the shape every endpoint exposes them in.
pub type CategoryMap = BTreeMap<i64, String>;

pub fn to_map(categories: Vec<Category>) -> CategoryMap {
    categories.into_iter().map(|c| (c.id, c.kind)).collect()
}

pub async fn get_all_categories(pool: &SqlitePool) -> sqlx::Result<Vec<Category>> {
    sqlx::query_as::<_, Category>(
        r#"
SELECT id, type
FROM categories
ORDER BY type
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_category(pool: &SqlitePool, id: i64) -> sqlx::Result<Category> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, type FROM categories WHERE categories.id = ?1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn create_category(pool: &SqlitePool, id: Option<i64>, kind: &str) -> sqlx::Result<i64> {
    let id = sqlx::query(
        r#"
INSERT INTO categories (id, type) VALUES (?1, ?2)
        "#,
    )
    .bind(id)
    .bind(kind)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn update_category(pool: &SqlitePool, category: &Category) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE categories SET type=?1 WHERE categories.id = ?2
        "#,
    )
    .bind(&category.kind)
    .bind(category.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts unknown categories and overwrites the label of known ones, keeping ids.
pub async fn import_categories(pool: &SqlitePool, categories: Vec<Category>) -> sqlx::Result<()> {
    let existing: HashSet<i64> = get_all_categories(pool)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    for category in categories {
        if existing.contains(&category.id) {
            update_category(pool, &category).await?;
        } else {
            create_category(pool, Some(category.id), &category.kind).await?;
        }
    }
    Ok(())
}
