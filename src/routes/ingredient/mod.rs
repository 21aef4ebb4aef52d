mod handler;
mod model;

pub use handler::{get_ingredient, list_ingredients};
pub use model::Ingredient;
