//! Test doubles for the store boundary.

use std::cell::{Cell, RefCell};

use til_store::{Fact, FactId, FactQuery, FactStore, NewFact, StoreError, VotePatch};

pub(crate) fn fact(id: i64, category: &str, interesting: u32) -> Fact {
    Fact {
        id: FactId(id),
        text: format!("fact {id}"),
        source: "https://example.com".to_string(),
        category: category.to_string(),
        votes_interesting: interesting,
        votes_mindblowing: 0,
        votes_false: 0,
        created_in: None,
        created_at: None,
    }
}

fn rejected() -> StoreError {
    StoreError::Rejected {
        status: 503,
        message: "store unavailable".to_string(),
    }
}

/// Every call fails.
pub(crate) struct FailingStore;

impl FactStore for FailingStore {
    async fn select(&self, _query: &FactQuery) -> til_store::Result<Vec<Fact>> {
        Err(rejected())
    }

    async fn insert(&self, _fact: &NewFact) -> til_store::Result<Vec<Fact>> {
        Err(rejected())
    }

    async fn update(&self, _id: FactId, _patch: &VotePatch) -> til_store::Result<Fact> {
        Err(rejected())
    }
}

/// In-memory table that records every request it serves.
///
/// Reads apply the query the way the hosted store would; writes can be
/// switched to fail.
#[derive(Default)]
pub(crate) struct RecordingStore {
    rows: RefCell<Vec<Fact>>,
    queries: RefCell<Vec<FactQuery>>,
    inserts: RefCell<Vec<NewFact>>,
    updates: RefCell<Vec<(FactId, VotePatch)>>,
    fail_writes: Cell<bool>,
}

impl RecordingStore {
    pub(crate) fn with_rows(rows: Vec<Fact>) -> Self {
        Self {
            rows: RefCell::new(rows),
            ..Self::default()
        }
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub(crate) fn queries(&self) -> Vec<FactQuery> {
        self.queries.borrow().clone()
    }

    pub(crate) fn inserts(&self) -> Vec<NewFact> {
        self.inserts.borrow().clone()
    }

    pub(crate) fn updates(&self) -> Vec<(FactId, VotePatch)> {
        self.updates.borrow().clone()
    }

    pub(crate) fn row(&self, id: i64) -> Option<Fact> {
        self.rows.borrow().iter().find(|f| f.id == FactId(id)).cloned()
    }

    /// Number of requests of any kind.
    pub(crate) fn calls(&self) -> usize {
        self.queries.borrow().len() + self.inserts.borrow().len() + self.updates.borrow().len()
    }
}

impl FactStore for RecordingStore {
    async fn select(&self, query: &FactQuery) -> til_store::Result<Vec<Fact>> {
        self.queries.borrow_mut().push(query.clone());
        let mut rows: Vec<Fact> = self
            .rows
            .borrow()
            .iter()
            .filter(|f| query.category.as_deref().is_none_or(|c| f.category == c))
            .cloned()
            .collect();
        let kind = query.order_by;
        rows.sort_by(|a, b| b.votes(kind).cmp(&a.votes(kind)));
        if !query.descending {
            rows.reverse();
        }
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn insert(&self, new: &NewFact) -> til_store::Result<Vec<Fact>> {
        self.inserts.borrow_mut().push(new.clone());
        if self.fail_writes.get() {
            return Err(rejected());
        }
        let mut rows = self.rows.borrow_mut();
        let id = rows.iter().map(|f| f.id.0).max().unwrap_or(0) + 1;
        let created = Fact {
            id: FactId(id),
            text: new.text.clone(),
            source: new.source.clone(),
            category: new.category.clone(),
            votes_interesting: 0,
            votes_mindblowing: 0,
            votes_false: 0,
            created_in: None,
            created_at: None,
        };
        rows.push(created.clone());
        Ok(vec![created])
    }

    async fn update(&self, id: FactId, patch: &VotePatch) -> til_store::Result<Fact> {
        self.updates.borrow_mut().push((id, *patch));
        if self.fail_writes.get() {
            return Err(rejected());
        }
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("fact id {id}")))?;
        row.set_votes(patch.kind, patch.value);
        Ok(row.clone())
    }
}
