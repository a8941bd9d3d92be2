use til_store::{CategoryFilter, Fact, FactQuery, FactStore};
use tracing::debug;

/// Read the facts for `filter`: most interesting first, at most
/// [`til_store::MAX_FACTS`] rows.
///
/// A store failure is an `Err`; an empty slice of the table is `Ok(vec![])`.
pub async fn fetch_facts<S: FactStore>(
    store: &S,
    filter: &CategoryFilter,
) -> til_store::Result<Vec<Fact>> {
    let query = FactQuery::for_filter(filter);
    let facts = store.select(&query).await?;
    debug!(%filter, rows = facts.len(), "fetched facts");
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fact, FailingStore, RecordingStore};
    use til_store::{LocalFactStore, NewFact, StoreError, VoteKind, VotePatch};

    #[tokio::test]
    async fn all_filter_sends_unfiltered_query() {
        let store = RecordingStore::with_rows(vec![fact(1, "science", 5)]);
        let facts = fetch_facts(&store, &CategoryFilter::All).await.unwrap();
        assert_eq!(facts.len(), 1);

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].category, None);
        assert_eq!(queries[0].order_by, VoteKind::Interesting);
        assert!(queries[0].descending);
        assert_eq!(queries[0].limit, 1000);
    }

    #[tokio::test]
    async fn category_filter_sends_equality_filter() {
        let store = RecordingStore::with_rows(Vec::new());
        fetch_facts(&store, &CategoryFilter::from("history"))
            .await
            .unwrap();
        assert_eq!(store.queries()[0].category.as_deref(), Some("history"));
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let store = RecordingStore::with_rows(Vec::new());
        let facts = fetch_facts(&store, &CategoryFilter::All).await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_distinct_from_empty() {
        let err = fetch_facts(&FailingStore, &CategoryFilter::All)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
    }

    #[tokio::test]
    async fn every_filter_returns_only_its_category_sorted() {
        let store = LocalFactStore::open_in_memory().unwrap();
        let seed = [("science", 3), ("news", 8), ("science", 6), ("health", 1)];
        for (category, votes) in seed {
            let id = store
                .insert(&NewFact {
                    text: format!("{category} fact"),
                    source: "https://example.com".into(),
                    category: category.into(),
                })
                .await
                .unwrap()[0]
                .id;
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
        }

        for filter in ["all", "science", "news", "health", "finance"] {
            let filter = CategoryFilter::from(filter);
            let facts = fetch_facts(&store, &filter).await.unwrap();
            assert!(facts.iter().all(|f| filter.matches(&f.category)));
            assert!(facts
                .windows(2)
                .all(|w| w[0].votes_interesting >= w[1].votes_interesting));
        }

        let all = fetch_facts(&store, &CategoryFilter::All).await.unwrap();
        assert_eq!(all.len(), 4);
    }
}
