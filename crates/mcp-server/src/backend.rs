use anyhow::{Context, Result};
use til_store::{
    Fact, FactId, FactQuery, FactStore, LocalFactStore, NewFact, RestConfig, RestFactStore,
    VotePatch,
};
use tracing::info;

use crate::config::Config;

/// The fact table the server talks to.
pub enum Backend {
    Local(LocalFactStore),
    Hosted(RestFactStore),
}

impl Backend {
    pub fn open(config: &Config) -> Result<Self> {
        match &config.store {
            Some(hosted) => {
                let rest = RestConfig::new(&hosted.url, hosted.api_key.clone())?
                    .with_table(hosted.table.clone())
                    .with_timeout(hosted.timeout);
                info!(url = %rest.base_url, table = %rest.table, "using hosted fact table");
                Ok(Backend::Hosted(RestFactStore::new(rest)?))
            }
            None => {
                info!(path = %config.db_path, "using embedded fact table");
                let store = LocalFactStore::open(&config.db_path)
                    .with_context(|| format!("failed to open {}", config.db_path))?;
                Ok(Backend::Local(store))
            }
        }
    }
}

impl FactStore for Backend {
    async fn select(&self, query: &FactQuery) -> til_store::Result<Vec<Fact>> {
        match self {
            Backend::Local(store) => store.select(query).await,
            Backend::Hosted(store) => store.select(query).await,
        }
    }

    async fn insert(&self, fact: &NewFact) -> til_store::Result<Vec<Fact>> {
        match self {
            Backend::Local(store) => store.insert(fact).await,
            Backend::Hosted(store) => store.insert(fact).await,
        }
    }

    async fn update(&self, id: FactId, patch: &VotePatch) -> til_store::Result<Fact> {
        match self {
            Backend::Local(store) => store.update(id, patch).await,
            Backend::Hosted(store) => store.update(id, patch).await,
        }
    }
}
