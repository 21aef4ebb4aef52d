mod handler;
mod model;

pub use handler::{get_tag, list_tags};
pub use model::Tag;
