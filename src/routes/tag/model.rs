use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Tag {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, slug
            FROM tags
            ORDER BY name
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Self, AppError> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, slug
            FROM tags
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("tag"))
    }

    /// Tags attached to a recipe, for the detail representation.
    pub async fn for_recipe(pool: &PgPool, recipe_id: i64) -> Result<Vec<Self>, AppError> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t
            JOIN recipe_tags rt ON rt.tag_id = t.id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }
}
