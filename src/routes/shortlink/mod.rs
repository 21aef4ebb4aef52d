mod handler;

pub use handler::resolve_short_link;
