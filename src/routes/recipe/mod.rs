mod handler;
mod model;

pub use handler::{
    add_favorite, add_to_shopping_cart, create_recipe, delete_recipe, download_shopping_cart,
    get_recipe, get_short_link, list_recipes, remove_favorite, remove_from_shopping_cart,
    update_recipe,
};
pub use model::{Recipe, RecipeMini, RecipeRelation};
