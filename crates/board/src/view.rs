//! Plain-text renderings of the derived views.

use til_store::{CategoryFilter, CategoryTable, Fact, VoteKind};

use crate::controller::ViewState;
use crate::submit::chars_remaining;

pub const TITLE: &str = "Today I Learned";
pub const EMPTY_MESSAGE: &str = "No facts for this category yet! Create the first one ✌️";

/// Label of the control that opens and closes the form.
pub fn toggle_label(state: &ViewState) -> &'static str {
    if state.form.open {
        "Close"
    } else {
        "Share a fact"
    }
}

pub fn render_header(state: &ViewState) -> String {
    format!("{TITLE}  [{}]", toggle_label(state))
}

/// Filter buttons, "All" first; the active one is starred.
pub fn render_categories(state: &ViewState, categories: &CategoryTable) -> String {
    let mark = |active: bool| if active { "*" } else { " " };
    let all = format!("{} all\n", mark(state.filter == CategoryFilter::All));
    categories
        .iter()
        .map(|category| {
            let active = state.filter.category() == Some(category.name.as_str());
            format!("{} {} ({})\n", mark(active), category.name, category.color)
        })
        .fold(all, |mut out, line| {
            out.push_str(&line);
            out
        })
}

/// One fact line. Unknown categories get the fallback tag color.
pub fn render_fact(fact: &Fact, categories: &CategoryTable, updating: bool) -> String {
    let disputed = if fact.is_disputed() { "[DISPUTED] " } else { "" };
    let votes: Vec<String> = VoteKind::ALL
        .iter()
        .map(|&kind| format!("{} {}", kind.label(), fact.votes(kind)))
        .collect();
    let mut line = format!(
        "#{} {disputed}{} (Source: {}) [{} {}] {}",
        fact.id,
        fact.text,
        fact.source,
        fact.category,
        categories.color_or_fallback(&fact.category),
        votes.join("  "),
    );
    if updating {
        line.push_str(" (voting...)");
    }
    line
}

/// The fact list, or the loading / empty placeholder.
pub fn render_facts(state: &ViewState, categories: &CategoryTable) -> String {
    if state.loading {
        return "Loading...".to_string();
    }
    if state.facts.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }
    let mut lines: Vec<String> = state
        .facts
        .iter()
        .map(|fact| render_fact(fact, categories, state.is_updating(fact.id)))
        .collect();
    lines.push(format!(
        "There are {} facts in the database. Add your own!",
        state.facts.len()
    ));
    lines.join("\n")
}

/// The submission form; empty when it is closed.
///
/// The remaining-characters counter needs the text being typed, so it is
/// only shown when a `draft` is given.
pub fn render_form(state: &ViewState, draft: Option<&str>, categories: &CategoryTable) -> String {
    if !state.form.open {
        return String::new();
    }
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    let mut out = String::from("Share a fact with the world...");
    if let Some(draft) = draft {
        out.push_str(&format!(" ({} characters left)", chars_remaining(draft)));
    }
    out.push_str(&format!(
        "\nSource: https://...\nCategory: {}",
        names.join(" | ")
    ));
    if state.form.submitting {
        out.push_str("\nPosting...");
    }
    out
}

/// Whole page: header, form, categories, facts.
pub fn render_board(state: &ViewState, categories: &CategoryTable) -> String {
    let mut sections = vec![render_header(state)];
    let form = render_form(state, None, categories);
    if !form.is_empty() {
        sections.push(form);
    }
    sections.push(render_categories(state, categories).trim_end().to_string());
    sections.push(render_facts(state, categories));
    sections.join("\n\n")
}
