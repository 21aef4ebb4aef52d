use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Serialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize)]
pub struct IngredientSearchQuery {
    pub name: Option<String>,
}

/// Escapes LIKE metacharacters so a user-supplied prefix matches literally.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl Ingredient {
    pub async fn search(pool: &PgPool, name_prefix: Option<&str>) -> Result<Vec<Self>, AppError> {
        let pattern = format!("{}%", escape_like(name_prefix.unwrap_or("")));
        let ingredients = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE name ILIKE $1
            ORDER BY name, id
            "#,
        )
        .bind(pattern)
        .fetch_all(pool)
        .await?;

        Ok(ingredients)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Self, AppError> {
        sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("ingredient"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::escape_like;

    #[rstest]
    #[case("salt", "salt")]
    #[case("100%", "100\\%")]
    #[case("a_b", "a\\_b")]
    #[case("back\\slash", "back\\\\slash")]
    fn like_metacharacters_are_escaped(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_like(input), expected);
    }
}
