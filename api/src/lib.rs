pub mod config;
pub mod connection;
pub mod domains;
pub mod error;
pub mod handler;
pub mod http;
pub mod repositories;
pub mod server;
pub mod validation;

use std::sync::Arc;

use repositories::PeopleRepository;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn PeopleRepository + Send + Sync>,
}
