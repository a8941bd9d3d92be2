//! View state and the intent → operation → outcome cycle.
//!
//! The [`Controller`] is the only owner of mutable board state. A user
//! action becomes an [`Intent`]; [`Controller::dispatch`] applies its
//! synchronous part and hands back at most one [`Operation`]. The host runs
//! the operation against a store whenever it likes and feeds the resulting
//! [`Outcome`] to [`Controller::apply`], which patches the state in one
//! step. Outcomes may be applied in any order.

use std::collections::BTreeSet;

use til_store::{CategoryFilter, CategoryTable, Fact, FactId, FactStore, NewFact, VoteKind};
use tracing::{debug, warn};

use crate::query::fetch_facts;
use crate::submit::{prepend_created, submit_fact, validate, FactForm, ValidationError};
use crate::vote::{cast_vote, merge_fact, VoteRequest};

/// What to do with a query response when a newer query has been issued
/// since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Apply every response as it arrives. A slow, superseded response can
    /// overwrite newer data.
    #[default]
    CompletionOrder,
    /// Drop responses from superseded queries.
    LatestRequest,
}

impl std::str::FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completion" | "completion-order" => Ok(ResponseOrdering::CompletionOrder),
            "latest" | "latest-request" => Ok(ResponseOrdering::LatestRequest),
            other => Err(format!("unknown response ordering: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormState {
    pub open: bool,
    /// An insert is in flight; inputs are disabled.
    pub submitting: bool,
}

/// Transient message for the user. Read it once with
/// [`Controller::take_notice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoadFailed(String),
    Invalid(ValidationError),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::LoadFailed(reason) => write!(f, "There was a problem getting data: {reason}"),
            Notice::Invalid(err) => write!(f, "Please check the form: {err}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub facts: Vec<Fact>,
    pub loading: bool,
    pub filter: CategoryFilter,
    pub form: FormState,
    /// Facts with a vote in flight; their vote buttons are disabled.
    pub updating: BTreeSet<FactId>,
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == id)
    }

    pub fn is_updating(&self, id: FactId) -> bool {
        self.updating.contains(&id)
    }
}

/// A user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// (Re)load the current filter. Issued at start-up.
    Load,
    SelectCategory(CategoryFilter),
    ToggleForm,
    Submit(FactForm),
    Vote { fact_id: FactId, kind: VoteKind },
}

/// A store request produced by [`Controller::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Query {
        generation: u64,
        filter: CategoryFilter,
    },
    Insert(NewFact),
    Vote(VoteRequest),
}

impl Operation {
    /// Perform the request. Never retries.
    pub async fn run<S: FactStore>(self, store: &S) -> Outcome {
        match self {
            Operation::Query { generation, filter } => Outcome::Loaded {
                generation,
                result: fetch_facts(store, &filter).await,
            },
            Operation::Insert(fact) => Outcome::Inserted(submit_fact(store, &fact).await),
            Operation::Vote(request) => Outcome::Voted {
                result: cast_vote(store, &request).await,
                request,
            },
        }
    }
}

/// A resolved [`Operation`].
#[derive(Debug)]
pub enum Outcome {
    Loaded {
        generation: u64,
        result: til_store::Result<Vec<Fact>>,
    },
    Inserted(til_store::Result<Vec<Fact>>),
    Voted {
        request: VoteRequest,
        result: til_store::Result<Fact>,
    },
}

/// Owner of the board's [`ViewState`].
pub struct Controller {
    state: ViewState,
    categories: CategoryTable,
    ordering: ResponseOrdering,
    /// Generation of the most recently issued query; 0 before the first.
    generation: u64,
}

impl Controller {
    pub fn new(categories: CategoryTable, ordering: ResponseOrdering) -> Self {
        Self {
            state: ViewState::default(),
            categories,
            ordering,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.state.notice.take()
    }

    /// Apply the synchronous part of `intent` and return the request it
    /// needs, if any.
    pub fn dispatch(&mut self, intent: Intent) -> Option<Operation> {
        match intent {
            Intent::Load => Some(self.begin_query()),
            Intent::SelectCategory(filter) => {
                if filter == self.state.filter && self.generation > 0 {
                    return None;
                }
                self.state.filter = filter;
                Some(self.begin_query())
            }
            Intent::ToggleForm => {
                self.state.form.open = !self.state.form.open;
                None
            }
            Intent::Submit(form) => self.begin_submit(&form),
            Intent::Vote { fact_id, kind } => self.begin_vote(fact_id, kind),
        }
    }

    fn begin_query(&mut self) -> Operation {
        self.generation += 1;
        self.state.loading = true;
        Operation::Query {
            generation: self.generation,
            filter: self.state.filter.clone(),
        }
    }

    fn begin_submit(&mut self, form: &FactForm) -> Option<Operation> {
        if self.state.form.submitting {
            debug!("submit ignored, insert already in flight");
            return None;
        }
        match validate(form, &self.categories) {
            Ok(fact) => {
                self.state.form.submitting = true;
                Some(Operation::Insert(fact))
            }
            Err(err) => {
                debug!(%err, "submission rejected");
                self.state.notice = Some(Notice::Invalid(err));
                None
            }
        }
    }

    fn begin_vote(&mut self, fact_id: FactId, kind: VoteKind) -> Option<Operation> {
        if self.state.is_updating(fact_id) {
            debug!(id = %fact_id, "vote ignored, previous vote in flight");
            return None;
        }
        let Some(fact) = self.state.fact(fact_id) else {
            debug!(id = %fact_id, "vote ignored, fact not listed");
            return None;
        };
        let request = VoteRequest::next(fact, kind);
        self.state.updating.insert(fact_id);
        Some(Operation::Vote(request))
    }

    /// Patch the state with a resolved request.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Loaded { generation, result } => self.apply_loaded(generation, result),
            Outcome::Inserted(result) => {
                self.state.form.submitting = false;
                match result {
                    Ok(created) => {
                        prepend_created(&mut self.state.facts, created);
                        self.state.form.open = false;
                    }
                    Err(err) => warn!(%err, "insert failed, list unchanged"),
                }
            }
            Outcome::Voted { request, result } => {
                self.state.updating.remove(&request.fact_id);
                match result {
                    Ok(row) => {
                        if !merge_fact(&mut self.state.facts, row) {
                            debug!(id = %request.fact_id, "voted fact no longer listed");
                        }
                    }
                    Err(err) => warn!(id = %request.fact_id, %err, "vote failed, list unchanged"),
                }
            }
        }
    }

    fn apply_loaded(&mut self, generation: u64, result: til_store::Result<Vec<Fact>>) {
        let latest = generation == self.generation;
        if !latest && self.ordering == ResponseOrdering::LatestRequest {
            debug!(generation, latest = self.generation, "stale response dropped");
            return;
        }
        if latest {
            self.state.loading = false;
        }
        match result {
            Ok(facts) => self.state.facts = facts,
            Err(err) => {
                warn!(%err, "loading facts failed");
                self.state.notice = Some(Notice::LoadFailed(err.to_string()));
            }
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(CategoryTable::default(), ResponseOrdering::default())
    }
}
