use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{Fact, FactId, FactQuery, FactStore, NewFact, Result, StoreError, VotePatch};

/// Fact rows keyed by id, stored as JSON in the same shape the hosted
/// store returns.
///
/// Keys are assigned sequentially, so iteration is insertion order.
const FACTS: TableDefinition<u64, &str> = TableDefinition::new("facts");
/// Single-row metadata table. Key `"next_id"` holds the next id to assign.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID: &str = "next_id";

/// Embedded fact table backed by `redb`.
///
/// Behaves like the hosted table as far as the board can tell: sequential
/// ids, zeroed counters on insert, server-side filtering, ordering and
/// limits.
///
/// # Example
///
/// ```rust,no_run
/// use til_store::LocalFactStore;
///
/// let store = LocalFactStore::open("facts.redb").unwrap();
/// ```
pub struct LocalFactStore {
    db: Database,
}

impl LocalFactStore {
    /// Open or create a fact table at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Create an in-memory fact table (no file I/O).
    ///
    /// Data is lost when the instance is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(FACTS)?;
        write_txn.open_table(META)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Every row, in id order.
    fn scan(&self, keep: impl Fn(&Fact) -> bool) -> Result<Vec<Fact>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FACTS)?;
        let mut facts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let fact: Fact = serde_json::from_str(value.value())?;
            if keep(&fact) {
                facts.push(fact);
            }
        }
        Ok(facts)
    }

    fn select_now(&self, query: &FactQuery) -> Result<Vec<Fact>> {
        let mut facts = self.scan(|f| {
            query
                .category
                .as_deref()
                .is_none_or(|name| f.category == name)
        })?;
        // Stable sort: ties keep insertion order.
        let kind = query.order_by;
        if query.descending {
            facts.sort_by(|a, b| b.votes(kind).cmp(&a.votes(kind)));
        } else {
            facts.sort_by_key(|f| f.votes(kind));
        }
        facts.truncate(query.limit);
        Ok(facts)
    }

    fn insert_now(&self, new: &NewFact) -> Result<Fact> {
        let write_txn = self.db.begin_write()?;
        let fact = {
            let mut meta = write_txn.open_table(META)?;
            let id = meta.get(NEXT_ID)?.map(|guard| guard.value()).unwrap_or(1);
            meta.insert(NEXT_ID, id + 1)?;

            let fact = Fact {
                id: FactId(id_to_i64(id)?),
                text: new.text.clone(),
                source: new.source.clone(),
                category: new.category.clone(),
                votes_interesting: 0,
                votes_mindblowing: 0,
                votes_false: 0,
                created_in: None,
                created_at: Some(Utc::now()),
            };
            let value = serde_json::to_string(&fact)?;
            let mut table = write_txn.open_table(FACTS)?;
            table.insert(id, value.as_str())?;
            fact
        };
        write_txn.commit()?;
        Ok(fact)
    }

    fn update_now(&self, id: FactId, patch: &VotePatch) -> Result<Fact> {
        let key = u64::try_from(id.0).map_err(|_| StoreError::NotFound(format!("fact id {id}")))?;
        let write_txn = self.db.begin_write()?;
        let fact = {
            let mut table = write_txn.open_table(FACTS)?;
            let existing: Option<String> = table.get(key)?.map(|guard| guard.value().to_string());
            let Some(existing) = existing else {
                return Err(StoreError::NotFound(format!("fact id {id}")));
            };
            let mut fact: Fact = serde_json::from_str(&existing)?;
            fact.set_votes(patch.kind, patch.value);
            let value = serde_json::to_string(&fact)?;
            table.insert(key, value.as_str())?;
            fact
        };
        write_txn.commit()?;
        Ok(fact)
    }
}

fn id_to_i64(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| StoreError::Storage(format!("fact id {id} out of range")))
}

impl FactStore for LocalFactStore {
    async fn select(&self, query: &FactQuery) -> Result<Vec<Fact>> {
        let facts = self.select_now(query)?;
        debug!(category = ?query.category, rows = facts.len(), "local select");
        Ok(facts)
    }

    async fn insert(&self, fact: &NewFact) -> Result<Vec<Fact>> {
        let created = self.insert_now(fact)?;
        debug!(id = %created.id, "local insert");
        Ok(vec![created])
    }

    async fn update(&self, id: FactId, patch: &VotePatch) -> Result<Fact> {
        let updated = self.update_now(id, patch)?;
        debug!(%id, column = patch.kind.column(), value = patch.value, "local update");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CategoryFilter, VoteKind};
    use tempfile::NamedTempFile;

    fn open_temp_store() -> (LocalFactStore, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let store = LocalFactStore::open(&path).unwrap();
        (store, file)
    }

    fn new_fact(text: &str, category: &str) -> NewFact {
        NewFact {
            text: text.to_string(),
            source: "https://example.com".to_string(),
            category: category.to_string(),
        }
    }

    async fn seed_interesting(store: &LocalFactStore, category: &str, votes: u32) -> FactId {
        let created = store
            .insert(&new_fact(&format!("{category} {votes}"), category))
            .await
            .unwrap();
        let id = created[0].id;
        store
            .update(
                id,
                &VotePatch {
                    kind: VoteKind::Interesting,
                    value: votes,
                },
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_zero_votes() {
        let store = LocalFactStore::open_in_memory().unwrap();
        let first = store.insert(&new_fact("one", "science")).await.unwrap();
        let second = store.insert(&new_fact("two", "science")).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, FactId(1));
        assert_eq!(second[0].id, FactId(2));
        for kind in VoteKind::ALL {
            assert_eq!(first[0].votes(kind), 0);
        }
        assert!(first[0].created_at.is_some());
    }

    #[tokio::test]
    async fn select_orders_by_interesting_descending() {
        let store = LocalFactStore::open_in_memory().unwrap();
        seed_interesting(&store, "science", 5).await;
        seed_interesting(&store, "science", 2).await;
        seed_interesting(&store, "science", 9).await;

        let facts = store
            .select(&FactQuery::for_filter(&CategoryFilter::All))
            .await
            .unwrap();
        let votes: Vec<u32> = facts.iter().map(|f| f.votes_interesting).collect();
        assert_eq!(votes, [9, 5, 2]);
    }

    #[tokio::test]
    async fn select_filters_by_category_and_limits() {
        let store = LocalFactStore::open_in_memory().unwrap();
        seed_interesting(&store, "science", 1).await;
        seed_interesting(&store, "news", 3).await;
        seed_interesting(&store, "science", 2).await;

        let science = store
            .select(&FactQuery::for_filter(&CategoryFilter::from("science")))
            .await
            .unwrap();
        assert_eq!(science.len(), 2);
        assert!(science.iter().all(|f| f.category == "science"));

        let mut capped = FactQuery::for_filter(&CategoryFilter::All);
        capped.limit = 1;
        let top = store.select(&capped).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].category, "news");
    }

    #[tokio::test]
    async fn select_on_empty_table_is_ok_and_empty() {
        let store = LocalFactStore::open_in_memory().unwrap();
        let facts = store
            .select(&FactQuery::for_filter(&CategoryFilter::All))
            .await
            .unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn update_sets_only_the_named_counter() {
        let store = LocalFactStore::open_in_memory().unwrap();
        let id = store.insert(&new_fact("x", "news")).await.unwrap()[0].id;

        let updated = store
            .update(
                id,
                &VotePatch {
                    kind: VoteKind::Mindblowing,
                    value: 4,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.votes_mindblowing, 4);
        assert_eq!(updated.votes_interesting, 0);
        assert_eq!(updated.votes_false, 0);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = LocalFactStore::open_in_memory().unwrap();
        let err = store
            .update(
                FactId(42),
                &VotePatch {
                    kind: VoteKind::False,
                    value: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn rows_and_id_counter_survive_reopen() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        {
            let store = LocalFactStore::open(&path).unwrap();
            store.insert(&new_fact("kept", "history")).await.unwrap();
        }

        let store = LocalFactStore::open(&path).unwrap();
        let facts = store
            .select(&FactQuery::for_filter(&CategoryFilter::All))
            .await
            .unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "kept");

        let next = store.insert(&new_fact("next", "history")).await.unwrap();
        assert_eq!(next[0].id, FactId(2));
    }

    #[tokio::test]
    async fn on_disk_store_round_trips_votes() {
        let (store, _tmp) = open_temp_store();
        let id = seed_interesting(&store, "health", 7).await;
        let facts = store
            .select(&FactQuery::for_filter(&CategoryFilter::from("health")))
            .await
            .unwrap();
        assert_eq!(facts[0].id, id);
        assert_eq!(facts[0].votes_interesting, 7);
    }
}
