//! Today I Learned: fact model and store boundary.
//!
//! The core primitive is a [`Fact`]: a short community-submitted claim with
//! a source URL, a category, and three independent vote counters.
//!
//! Facts live in a table owned by a hosted store. This crate defines the
//! narrow contract the rest of the workspace talks to ([`FactStore`]) and
//! two implementations of it:
//!
//! - [`RestFactStore`] speaks the PostgREST dialect used by Supabase.
//! - [`LocalFactStore`] keeps the same table in an embedded `redb` file
//!   (or in memory) for development and tests.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use til_store::{CategoryFilter, FactQuery, FactStore, LocalFactStore, NewFact};
//!
//! # async fn demo() -> til_store::Result<()> {
//! let store = LocalFactStore::open_in_memory()?;
//!
//! store
//!     .insert(&NewFact {
//!         text: "Octopuses have three hearts".into(),
//!         source: "https://en.wikipedia.org/wiki/Octopus".into(),
//!         category: "science".into(),
//!     })
//!     .await?;
//!
//! let query = FactQuery::for_filter(&CategoryFilter::All);
//! let facts = store.select(&query).await?;
//! assert_eq!(facts.len(), 1);
//! # Ok(())
//! # }
//! ```

mod category;
mod fact;
#[cfg(feature = "local")]
mod local;
#[cfg(feature = "rest")]
mod rest;

pub use category::{Category, CategoryFilter, CategoryTable, FALLBACK_COLOR};
pub use fact::{Fact, FactId, NewFact, VoteKind, MAX_TEXT_CHARS};
#[cfg(feature = "local")]
pub use local::LocalFactStore;
#[cfg(feature = "rest")]
pub use rest::{RestConfig, RestFactStore};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[cfg(feature = "rest")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(feature = "local")]
impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Storage(e.to_string())
    }
}
#[cfg(feature = "local")]
impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Storage(e.to_string())
    }
}
#[cfg(feature = "local")]
impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Storage(e.to_string())
    }
}
#[cfg(feature = "local")]
impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Storage(e.to_string())
    }
}
#[cfg(feature = "local")]
impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query and patch shapes
// ---------------------------------------------------------------------------

/// Upper bound on rows returned by a single read.
pub const MAX_FACTS: usize = 1000;

/// A single read against the fact table.
///
/// Mirrors what the hosted store supports: an optional equality filter on
/// `category`, one ordering column, and a row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactQuery {
    /// Equality filter on `category`; `None` reads every category.
    pub category: Option<String>,
    /// Counter to order by.
    pub order_by: VoteKind,
    /// Highest counter first when `true`.
    pub descending: bool,
    /// Maximum number of rows.
    pub limit: usize,
}

impl FactQuery {
    /// The board's standard read: most interesting first, capped at
    /// [`MAX_FACTS`], filtered only when a specific category is selected.
    pub fn for_filter(filter: &CategoryFilter) -> Self {
        Self {
            category: filter.category().map(str::to_string),
            order_by: VoteKind::Interesting,
            descending: true,
            limit: MAX_FACTS,
        }
    }
}

/// Absolute new value for one vote counter.
///
/// The value is set, not incremented, by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePatch {
    pub kind: VoteKind,
    pub value: u32,
}

impl VotePatch {
    /// JSON body for the update: `{"<column>": value}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(self.kind.column().to_string(), self.value.into());
        serde_json::Value::Object(body)
    }
}

// ---------------------------------------------------------------------------
// Store boundary
// ---------------------------------------------------------------------------

/// Read/insert/update access to the fact table.
///
/// Every call is a single request; implementations never retry.
#[allow(async_fn_in_trait)]
pub trait FactStore {
    /// Read facts matching `query`, in the requested order.
    ///
    /// An empty table is `Ok(vec![])`, never an error.
    async fn select(&self, query: &FactQuery) -> Result<Vec<Fact>>;

    /// Insert one fact and return the created row(s) as the store reports
    /// them, with identifier and zeroed counters filled in.
    async fn insert(&self, fact: &NewFact) -> Result<Vec<Fact>>;

    /// Set one counter on the row with `id` and return the updated row.
    ///
    /// Returns [`StoreError::NotFound`] when no row matches.
    async fn update(&self, id: FactId, patch: &VotePatch) -> Result<Fact>;
}

impl<T: FactStore> FactStore for &T {
    async fn select(&self, query: &FactQuery) -> Result<Vec<Fact>> {
        (**self).select(query).await
    }

    async fn insert(&self, fact: &NewFact) -> Result<Vec<Fact>> {
        (**self).insert(fact).await
    }

    async fn update(&self, id: FactId, patch: &VotePatch) -> Result<Fact> {
        (**self).update(id, patch).await
    }
}
