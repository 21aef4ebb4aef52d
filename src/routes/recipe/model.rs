use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::config::Config;
use crate::error::AppError;
use crate::routes::tag::Tag;
use crate::routes::user::{User, UserProfile};
use crate::utils::{generate_short_code, media_url, store_image};

const MAX_NAME_LEN: usize = 150;
const SHORT_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub short_code: String,
}

/// Minimal summary used by the relation toggles and subscription payloads.
#[derive(Debug, Serialize)]
pub struct RecipeMini {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full recipe representation for list and detail responses.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i64>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// PATCH payload: scalar fields are optional, but the ingredient and tag
/// sets are always replaced wholesale.
#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i64>>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// List filters; `tags` may repeat and selects recipes carrying any of the
/// given slugs. The membership filters only apply to logged-in callers.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilters {
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<i64>,
    pub is_favorited: Option<i32>,
    pub is_in_shopping_cart: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// The two user-recipe membership relations share one implementation; the
/// variant only selects the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    fn table(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::ShoppingCart => "shopping_carts",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::ShoppingCart => "the shopping cart",
        }
    }
}

#[derive(Debug, PartialEq, FromRow)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

pub(crate) fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), AppError> {
    if ingredients.is_empty() {
        return Err(AppError::Validation(
            "a recipe needs at least one ingredient".to_string(),
        ));
    }
    let mut seen = Vec::with_capacity(ingredients.len());
    for entry in ingredients {
        if seen.contains(&entry.id) {
            return Err(AppError::Validation(
                "ingredients must be unique".to_string(),
            ));
        }
        seen.push(entry.id);
        if entry.amount < 1 {
            return Err(AppError::Validation(
                "ingredient amount must be at least 1".to_string(),
            ));
        }
    }
    Ok(())
}

// Length caps mirror the VARCHAR(150) columns, which count characters.
pub(crate) fn validate_scalars(name: &str, cooking_time: i32) -> Result<(), AppError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    if cooking_time < 1 {
        return Err(AppError::Validation(
            "cooking time must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Tag sets are order-insensitive; duplicates collapse instead of erroring.
pub(crate) fn dedup_tags(tags: &[i64]) -> Result<Vec<i64>, AppError> {
    if tags.is_empty() {
        return Err(AppError::Validation(
            "a recipe needs at least one tag".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(tags.len());
    for &tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

/// Flat text report: one line per distinct ingredient with summed amounts.
pub(crate) fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut report = String::new();
    for item in items {
        report.push_str(&format!(
            "{}  - {}({})\n",
            item.name, item.total, item.measurement_unit
        ));
    }
    report
}

async fn ensure_ingredients_exist(pool: &PgPool, ids: &[i64]) -> Result<(), AppError> {
    let (found,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await?;
    if found != ids.len() as i64 {
        return Err(AppError::Validation(
            "one or more ingredients do not exist".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_tags_exist(pool: &PgPool, ids: &[i64]) -> Result<(), AppError> {
    let (found,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(pool)
        .await?;
    if found != ids.len() as i64 {
        return Err(AppError::Validation(
            "one or more tags do not exist".to_string(),
        ));
    }
    Ok(())
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    filters: &RecipeFilters,
    viewer: Option<i64>,
) {
    builder.push(" WHERE TRUE");
    if !filters.tags.is_empty() {
        builder
            .push(
                " AND id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                 JOIN tags t ON t.id = rt.tag_id WHERE t.slug = ANY(",
            )
            .push_bind(filters.tags.clone())
            .push("))");
    }
    if let Some(author) = filters.author {
        builder.push(" AND author_id = ").push_bind(author);
    }
    if let Some(viewer) = viewer {
        if filters.is_favorited == Some(1) {
            builder
                .push(" AND id IN (SELECT recipe_id FROM favorites WHERE user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filters.is_in_shopping_cart == Some(1) {
            builder
                .push(" AND id IN (SELECT recipe_id FROM shopping_carts WHERE user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }
}

impl Recipe {
    const COLUMNS: &'static str = "id, author_id, name, text, image, cooking_time, short_code";

    pub fn to_mini(&self, config: &Config) -> RecipeMini {
        RecipeMini {
            id: self.id,
            name: self.name.clone(),
            image: media_url(config, &self.image),
            cooking_time: self.cooking_time,
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Self, AppError> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("recipe"))
    }

    pub async fn find_by_short_code(pool: &PgPool, short_code: &str) -> Result<Self, AppError> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes WHERE short_code = $1",
            Self::COLUMNS
        ))
        .bind(short_code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("recipe"))
    }

    pub async fn count_by_author(pool: &PgPool, author_id: i64) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Recipe summaries for an author; `limit` of None means all of them.
    pub async fn minis_by_author(
        pool: &PgPool,
        config: &Config,
        author_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeMini>, AppError> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes WHERE author_id = $1 ORDER BY id LIMIT $2",
            Self::COLUMNS
        ))
        .bind(author_id)
        .bind(limit.map(|l| l.max(0)))
        .fetch_all(pool)
        .await?;

        Ok(recipes.iter().map(|r| r.to_mini(config)).collect())
    }

    async fn in_relation(
        &self,
        pool: &PgPool,
        relation: RecipeRelation,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
            relation.table()
        ))
        .bind(user_id)
        .bind(self.id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn detail(
        &self,
        pool: &PgPool,
        config: &Config,
        viewer: Option<i64>,
    ) -> Result<RecipeDetail, AppError> {
        let tags = Tag::for_recipe(pool, self.id).await?;
        let ingredients = sqlx::query_as::<_, RecipeIngredient>(
            r#"
            SELECT i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY i.name, i.id
            "#,
        )
        .bind(self.id)
        .fetch_all(pool)
        .await?;

        let author = User::find_by_id(pool, self.author_id).await?;
        let author = author.profile(pool, config, viewer).await?;

        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(user_id) => (
                self.in_relation(pool, RecipeRelation::Favorite, user_id)
                    .await?,
                self.in_relation(pool, RecipeRelation::ShoppingCart, user_id)
                    .await?,
            ),
            None => (false, false),
        };

        Ok(RecipeDetail {
            id: self.id,
            tags,
            author,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
            name: self.name.clone(),
            image: media_url(config, &self.image),
            text: self.text.clone(),
            cooking_time: self.cooking_time,
        })
    }

    /// Filtered, newest-first page of recipes plus the unpaged match count.
    pub async fn list(
        pool: &PgPool,
        config: &Config,
        filters: &RecipeFilters,
        viewer: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<RecipeDetail>), AppError> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM recipes");
        push_filters(&mut count_query, filters, viewer);
        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(pool)
            .await?;

        let mut query =
            QueryBuilder::new(format!("SELECT {} FROM recipes", Self::COLUMNS));
        push_filters(&mut query, filters, viewer);
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let recipes: Vec<Recipe> = query.build_query_as().fetch_all(pool).await?;

        let mut results = Vec::with_capacity(recipes.len());
        for recipe in &recipes {
            results.push(recipe.detail(pool, config, viewer).await?);
        }

        Ok((count, results))
    }

    pub async fn create(
        pool: &PgPool,
        config: &Config,
        author_id: i64,
        req: CreateRecipeRequest,
    ) -> Result<Self, AppError> {
        validate_scalars(&req.name, req.cooking_time)?;
        validate_ingredients(&req.ingredients)?;
        let tags = dedup_tags(&req.tags)?;

        let ingredient_ids: Vec<i64> = req.ingredients.iter().map(|i| i.id).collect();
        ensure_ingredients_exist(pool, &ingredient_ids).await?;
        ensure_tags_exist(pool, &tags).await?;

        let image = store_image(config, "recipes", &req.image).await?;

        let mut tx = pool.begin().await?;

        // ON CONFLICT DO NOTHING keeps the transaction alive on a short-code
        // collision so the loop can draw a fresh token.
        let mut recipe: Option<Recipe> = None;
        for _ in 0..SHORT_CODE_ATTEMPTS {
            let short_code = generate_short_code();
            let inserted = sqlx::query_as::<_, Recipe>(&format!(
                r#"
                INSERT INTO recipes (author_id, name, text, image, cooking_time, short_code)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (short_code) DO NOTHING
                RETURNING {}
                "#,
                Self::COLUMNS
            ))
            .bind(author_id)
            .bind(&req.name)
            .bind(&req.text)
            .bind(&image)
            .bind(req.cooking_time)
            .bind(&short_code)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = inserted {
                recipe = Some(row);
                break;
            }
            tracing::warn!("Short code collision, retrying");
        }
        let recipe = recipe
            .ok_or_else(|| AppError::Internal("could not allocate a unique short code".into()))?;

        Self::replace_ingredients(&mut tx, recipe.id, &req.ingredients).await?;
        Self::replace_tags(&mut tx, recipe.id, &tags).await?;

        tx.commit().await?;
        tracing::info!("Created recipe {} by user {}", recipe.id, author_id);
        Ok(recipe)
    }

    pub async fn update(
        pool: &PgPool,
        config: &Config,
        recipe_id: i64,
        user_id: i64,
        req: UpdateRecipeRequest,
    ) -> Result<Self, AppError> {
        let existing = Self::find_by_id(pool, recipe_id).await?;
        if existing.author_id != user_id {
            return Err(AppError::PermissionDenied(
                "only the author may modify this recipe".to_string(),
            ));
        }

        // The ingredient and tag sets are mandatory on update; both are
        // replaced wholesale on every PATCH.
        let ingredients = req.ingredients.ok_or_else(|| {
            AppError::Validation("ingredients are required on update".to_string())
        })?;
        let tags = req
            .tags
            .ok_or_else(|| AppError::Validation("tags are required on update".to_string()))?;

        let name = req.name.unwrap_or_else(|| existing.name.clone());
        let cooking_time = req.cooking_time.unwrap_or(existing.cooking_time);
        validate_scalars(&name, cooking_time)?;
        validate_ingredients(&ingredients)?;
        let tags = dedup_tags(&tags)?;

        let ingredient_ids: Vec<i64> = ingredients.iter().map(|i| i.id).collect();
        ensure_ingredients_exist(pool, &ingredient_ids).await?;
        ensure_tags_exist(pool, &tags).await?;

        let new_image = match req.image.as_deref() {
            Some(data_url) => Some(store_image(config, "recipes", data_url).await?),
            None => None,
        };
        let text = req.text.unwrap_or_else(|| existing.text.clone());
        let image = new_image.clone().unwrap_or_else(|| existing.image.clone());

        let mut tx = pool.begin().await?;
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
            SET name = $1, text = $2, image = $3, cooking_time = $4
            WHERE id = $5
            RETURNING {}
            "#,
            Self::COLUMNS
        ))
        .bind(&name)
        .bind(&text)
        .bind(&image)
        .bind(cooking_time)
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        Self::replace_ingredients(&mut tx, recipe_id, &ingredients).await?;
        Self::replace_tags(&mut tx, recipe_id, &tags).await?;
        tx.commit().await?;

        if new_image.is_some() {
            crate::utils::remove_image(config, &existing.image).await;
        }
        Ok(recipe)
    }

    pub async fn delete(
        pool: &PgPool,
        config: &Config,
        recipe_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        let existing = Self::find_by_id(pool, recipe_id).await?;
        if existing.author_id != user_id {
            return Err(AppError::PermissionDenied(
                "only the author may delete this recipe".to_string(),
            ));
        }

        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .execute(pool)
            .await?;
        crate::utils::remove_image(config, &existing.image).await;
        tracing::info!("Deleted recipe {} by user {}", recipe_id, user_id);
        Ok(())
    }

    async fn replace_ingredients(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        recipe_id: i64,
        ingredients: &[IngredientAmount],
    ) -> Result<(), AppError> {
        for entry in ingredients {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) \
                 VALUES ($1, $2, $3)",
            )
            .bind(recipe_id)
            .bind(entry.id)
            .bind(entry.amount)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn replace_tags(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        recipe_id: i64,
        tags: &[i64],
    ) -> Result<(), AppError> {
        for tag_id in tags {
            sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)")
                .bind(recipe_id)
                .bind(tag_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Adds the (user, recipe) pair to the given relation; exactly one row on
    /// success, conflict error when the pair is already present.
    pub async fn add_relation(
        pool: &PgPool,
        config: &Config,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<RecipeMini, AppError> {
        let recipe = Self::find_by_id(pool, recipe_id).await?;
        if recipe.in_relation(pool, relation, user_id).await? {
            return Err(AppError::AlreadyExists(format!(
                "recipe \"{}\" is already in {}",
                recipe.name,
                relation.noun()
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)",
            relation.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

        Ok(recipe.to_mini(config))
    }

    /// Removes the pair; erroring when it was never present.
    pub async fn remove_relation(
        pool: &PgPool,
        relation: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), AppError> {
        let recipe = Self::find_by_id(pool, recipe_id).await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            relation.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "recipe \"{}\" is not in {}",
                recipe.name,
                relation.noun()
            )));
        }
        Ok(())
    }

    /// Sums ingredient amounts across every recipe in the user's cart,
    /// grouped by (name, unit) and ordered by name.
    pub async fn shopping_list(
        pool: &PgPool,
        user_id: i64,
    ) -> Result<Vec<ShoppingListItem>, AppError> {
        let items = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            JOIN shopping_carts sc ON sc.recipe_id = ri.recipe_id
            WHERE sc.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn amounts(entries: &[(i64, i32)]) -> Vec<IngredientAmount> {
        entries
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect()
    }

    #[test]
    fn duplicate_ingredients_are_rejected() {
        let err = validate_ingredients(&amounts(&[(1, 100), (1, 50)]));
        assert!(err.is_err());
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(validate_ingredients(&[]).is_err());
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn non_positive_amount_is_rejected(#[case] amount: i32) {
        assert!(validate_ingredients(&amounts(&[(1, amount)])).is_err());
    }

    #[test]
    fn distinct_ingredients_pass() {
        assert!(validate_ingredients(&amounts(&[(1, 100), (2, 50)])).is_ok());
    }

    #[rstest]
    #[case("", 10)]
    #[case("soup", 0)]
    fn invalid_scalars_are_rejected(#[case] name: &str, #[case] cooking_time: i32) {
        assert!(validate_scalars(name, cooking_time).is_err());
    }

    #[test]
    fn name_limit_counts_characters_not_bytes() {
        // 150 Cyrillic characters are 300 bytes but still fit VARCHAR(150).
        let name = "щ".repeat(150);
        assert!(validate_scalars(&name, 10).is_ok());
        assert!(validate_scalars(&"щ".repeat(151), 10).is_err());
    }

    #[test]
    fn tag_duplicates_collapse() {
        assert_eq!(dedup_tags(&[3, 1, 3, 2, 1]).unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn empty_tag_list_is_rejected() {
        assert!(dedup_tags(&[]).is_err());
    }

    #[test]
    fn relation_variants_map_to_their_tables() {
        assert_eq!(RecipeRelation::Favorite.table(), "favorites");
        assert_eq!(RecipeRelation::ShoppingCart.table(), "shopping_carts");
    }

    #[test]
    fn shopping_list_sums_render_one_line_per_ingredient() {
        // Cart with recipe A (X: 100g) and recipe B (X: 50g, Y: 1 unit)
        // aggregates to exactly two lines.
        let items = vec![
            ShoppingListItem {
                name: "flour".to_string(),
                measurement_unit: "g".to_string(),
                total: 150,
            },
            ShoppingListItem {
                name: "lemon".to_string(),
                measurement_unit: "unit".to_string(),
                total: 1,
            },
        ];
        let report = render_shopping_list(&items);
        assert_eq!(report, "flour  - 150(g)\nlemon  - 1(unit)\n");
    }

    #[test]
    fn empty_cart_renders_empty_report() {
        assert_eq!(render_shopping_list(&[]), "");
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = vec![
            ShoppingListItem {
                name: "milk".to_string(),
                measurement_unit: "l".to_string(),
                total: 2,
            },
            ShoppingListItem {
                name: "milk".to_string(),
                measurement_unit: "ml".to_string(),
                total: 200,
            },
        ];
        let report = render_shopping_list(&items);
        assert_eq!(report.lines().count(), 2);
    }
}
