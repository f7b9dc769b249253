use std::{process, sync::Arc};

use anyhow::Context;
use people_api::{
    config::{Backend, Settings},
    handler,
    repositories::{memory::InMemoryPeopleRepository, sql::SqlPeopleRepository, PeopleRepository},
    server::Server,
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        tracing::error!("{err:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load().context("invalid configuration")?;
    let repository: Arc<dyn PeopleRepository + Send + Sync> = match settings.backend {
        Backend::Postgres => Arc::new(
            SqlPeopleRepository::connect(&settings.database)
                .context("invalid database settings")?,
        ),
        Backend::Memory => {
            tracing::warn!("storing people in memory, records are lost on exit");
            Arc::new(InMemoryPeopleRepository::new())
        }
    };

    let state = AppState { repository };

    let server = Server::new(state, handler::route_request, &settings.server);
    server
        .bind(settings.server.address.as_str())
        .await
        .context("server failed")
}
