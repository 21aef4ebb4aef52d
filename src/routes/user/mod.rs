mod handler;
mod model;

pub use handler::{
    delete_avatar, get_me, get_user, list_users, login, put_avatar, register, subscribe,
    subscriptions, unsubscribe,
};
pub use model::{User, UserProfile};
