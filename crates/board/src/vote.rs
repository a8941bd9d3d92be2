use til_store::{Fact, FactId, FactStore, VoteKind, VotePatch};
use tracing::debug;

/// One vote, resolved against the locally known counter value.
///
/// The store is asked to *set* the counter to `value`, not to increment
/// it. Two votes computed from the same local value therefore land on the
/// same number: concurrent votes on one counter can lose increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRequest {
    pub fact_id: FactId,
    pub kind: VoteKind,
    pub value: u32,
}

impl VoteRequest {
    /// Next value for `kind` on `fact`: the local count plus one.
    pub fn next(fact: &Fact, kind: VoteKind) -> Self {
        Self {
            fact_id: fact.id,
            kind,
            value: fact.votes(kind).saturating_add(1),
        }
    }

    pub fn patch(&self) -> VotePatch {
        VotePatch {
            kind: self.kind,
            value: self.value,
        }
    }
}

/// Send the vote and return the row as the store now has it.
pub async fn cast_vote<S: FactStore>(store: &S, request: &VoteRequest) -> til_store::Result<Fact> {
    let updated = store.update(request.fact_id, &request.patch()).await?;
    debug!(
        id = %request.fact_id,
        column = request.kind.column(),
        value = updated.votes(request.kind),
        "vote recorded"
    );
    Ok(updated)
}

/// Replace the entry with the same id as `row`.
///
/// Returns `false` (and leaves `facts` alone) when no entry matches, so
/// applying a row twice never duplicates it.
pub fn merge_fact(facts: &mut [Fact], row: Fact) -> bool {
    match facts.iter_mut().find(|f| f.id == row.id) {
        Some(slot) => {
            *slot = row;
            true
        }
        None => false,
    }
}
