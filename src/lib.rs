pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod store;

use std::sync::Arc;

use crate::app::users::PasswordHasher;
use crate::store::Stores;

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub hasher: Arc<dyn PasswordHasher>,
    pub token_key: [u8; 32],
    pub access_ttl_minutes: u64,
}
