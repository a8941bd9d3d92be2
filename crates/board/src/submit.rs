use serde::{Deserialize, Serialize};
use til_store::{CategoryTable, Fact, FactStore, NewFact, MAX_TEXT_CHARS};
use tracing::debug;
use url::Url;

/// Raw fields from the "share a fact" form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactForm {
    pub text: String,
    pub source: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("fact text is empty")]
    EmptyText,
    #[error("fact text is {chars} characters, over the limit")]
    TextTooLong { chars: usize },
    #[error("source must be an http or https URL: {0:?}")]
    InvalidSource(String),
    #[error("no category selected")]
    MissingCategory,
    #[error("unknown category: {0:?}")]
    UnknownCategory(String),
}

/// Characters left before the text limit. Negative once exceeded.
pub fn chars_remaining(text: &str) -> i64 {
    let used = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
    i64::try_from(MAX_TEXT_CHARS).unwrap_or(i64::MAX) - used
}

/// Check `form` locally and build the insert payload.
///
/// Text is kept as typed but must contain something other than whitespace:
/// a blank text is rejected even though a plain truthiness check would let
/// it through. Source and category are trimmed before use.
pub fn validate(form: &FactForm, categories: &CategoryTable) -> Result<NewFact, ValidationError> {
    if form.text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    let chars = form.text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(ValidationError::TextTooLong { chars });
    }

    let source = form.source.trim();
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => return Err(ValidationError::InvalidSource(form.source.clone())),
    }

    let category = form.category.trim();
    if category.is_empty() {
        return Err(ValidationError::MissingCategory);
    }
    if !categories.contains(category) {
        return Err(ValidationError::UnknownCategory(category.to_string()));
    }

    Ok(NewFact {
        text: form.text.clone(),
        source: source.to_string(),
        category: category.to_string(),
    })
}

/// Insert a validated fact; returns the row(s) the store created.
pub async fn submit_fact<S: FactStore>(store: &S, fact: &NewFact) -> til_store::Result<Vec<Fact>> {
    let created = store.insert(fact).await?;
    debug!(rows = created.len(), category = %fact.category, "fact submitted");
    Ok(created)
}

/// Put freshly created rows at the front of the list, in the order the
/// store returned them.
pub fn prepend_created(facts: &mut Vec<Fact>, created: Vec<Fact>) {
    let older = std::mem::replace(facts, created);
    facts.extend(older);
}
