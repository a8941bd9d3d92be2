//! The Today I Learned fact board: browse, filter, share and vote.
//!
//! Built on the [`til_store::FactStore`] boundary. The pieces:
//!
//! - [`fetch_facts`]: read the facts for a category filter
//! - [`cast_vote`] / [`merge_fact`]: bump one counter and reconcile
//! - [`validate`] / [`submit_fact`]: check and insert a new fact
//! - [`Controller`]: the single owner of view state
//! - [`view`]: text renderings of the board
//!
//! # Usage
//!
//! ```rust,no_run
//! use til_board::{FactBoard, FactForm, Intent};
//! use til_store::LocalFactStore;
//!
//! # async fn demo() -> til_store::Result<()> {
//! let store = LocalFactStore::open("./facts.redb")?;
//! let mut board = FactBoard::new(store);
//!
//! board.dispatch(Intent::Load).await;
//! board
//!     .dispatch(Intent::Submit(FactForm {
//!         text: "Honey never spoils".into(),
//!         source: "https://www.smithsonianmag.com/".into(),
//!         category: "science".into(),
//!     }))
//!     .await;
//! println!("{}", board.render());
//! # Ok(())
//! # }
//! ```

mod controller;
mod query;
mod submit;
#[cfg(test)]
mod testing;
pub mod view;
mod vote;

pub use controller::{
    Controller, FormState, Intent, Notice, Operation, Outcome, ResponseOrdering, ViewState,
};
pub use query::fetch_facts;
pub use submit::{chars_remaining, prepend_created, submit_fact, validate, FactForm, ValidationError};
pub use vote::{cast_vote, merge_fact, VoteRequest};

use til_store::{CategoryTable, FactStore};

/// A store paired with the controller that owns the board's state.
///
/// [`FactBoard::dispatch`] runs each intent's request to completion before
/// returning, so responses are applied in issue order. Hosts that need
/// requests to overlap drive a [`Controller`] directly.
pub struct FactBoard<S> {
    store: S,
    controller: Controller,
}

impl<S: FactStore> FactBoard<S> {
    /// A board over `store` with the standard category table.
    pub fn new(store: S) -> Self {
        Self::with_controller(store, Controller::default())
    }

    pub fn with_controller(store: S, controller: Controller) -> Self {
        Self { store, controller }
    }

    /// Apply `intent` and wait for the request it issues, if any.
    pub async fn dispatch(&mut self, intent: Intent) -> &ViewState {
        if let Some(operation) = self.controller.dispatch(intent) {
            let outcome = operation.run(&self.store).await;
            self.controller.apply(outcome);
        }
        self.controller.state()
    }

    pub fn state(&self) -> &ViewState {
        self.controller.state()
    }

    pub fn categories(&self) -> &CategoryTable {
        self.controller.categories()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.controller.take_notice()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The whole board as text.
    pub fn render(&self) -> String {
        view::render_board(self.state(), self.categories())
    }
}
