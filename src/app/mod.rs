pub mod auth;
pub mod engagement;
pub mod feed;
pub mod posts;
pub mod social;
pub mod users;
pub mod visibility;
