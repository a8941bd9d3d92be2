use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest fact text accepted, in characters.
pub const MAX_TEXT_CHARS: usize = 200;

/// Store-assigned identifier for a [`Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(pub i64);

impl std::fmt::Display for FactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(FactId)
    }
}

/// One of the three independent vote counters on a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteKind {
    #[serde(rename = "votesInteresting")]
    Interesting,
    #[serde(rename = "votesMindblowing")]
    Mindblowing,
    #[serde(rename = "votesFalse")]
    False,
}

impl VoteKind {
    pub const ALL: [VoteKind; 3] = [VoteKind::Interesting, VoteKind::Mindblowing, VoteKind::False];

    /// Column name in the fact table.
    pub fn column(self) -> &'static str {
        match self {
            VoteKind::Interesting => "votesInteresting",
            VoteKind::Mindblowing => "votesMindblowing",
            VoteKind::False => "votesFalse",
        }
    }

    /// Button label.
    pub fn label(self) -> &'static str {
        match self {
            VoteKind::Interesting => "👍",
            VoteKind::Mindblowing => "🤯",
            VoteKind::False => "⛔️",
        }
    }
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl std::str::FromStr for VoteKind {
    type Err = String;

    /// Accepts column names (`votesFalse`) and short names (`false`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        VoteKind::ALL
            .into_iter()
            .find(|kind| {
                kind.column().eq_ignore_ascii_case(s)
                    || kind.column()["votes".len()..].eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| format!("unknown vote kind: {s}"))
    }
}

/// A community-submitted fact as stored in the fact table.
///
/// `category` is kept as a plain string: rows written by other clients may
/// name a category this build does not know, and reading them must not
/// fail. Use [`CategoryTable::lookup`](crate::CategoryTable::lookup) to
/// resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: FactId,
    pub text: String,
    pub source: String,
    pub category: String,
    #[serde(default)]
    pub votes_interesting: u32,
    #[serde(default)]
    pub votes_mindblowing: u32,
    #[serde(default)]
    pub votes_false: u32,
    /// Year of creation, only written by the early client-side variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_in: Option<i32>,
    /// Server timestamp of the insert.
    #[serde(default, rename = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Fact {
    /// Current value of one counter.
    pub fn votes(&self, kind: VoteKind) -> u32 {
        match kind {
            VoteKind::Interesting => self.votes_interesting,
            VoteKind::Mindblowing => self.votes_mindblowing,
            VoteKind::False => self.votes_false,
        }
    }

    pub fn set_votes(&mut self, kind: VoteKind, value: u32) {
        match kind {
            VoteKind::Interesting => self.votes_interesting = value,
            VoteKind::Mindblowing => self.votes_mindblowing = value,
            VoteKind::False => self.votes_false = value,
        }
    }

    /// More people flagged this as false than found it interesting or
    /// mind-blowing combined.
    pub fn is_disputed(&self) -> bool {
        u64::from(self.votes_interesting) + u64::from(self.votes_mindblowing)
            < u64::from(self.votes_false)
    }
}

/// Insert payload: exactly the user-supplied fields.
///
/// The store assigns `id`, `created_at` and zeroed counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFact {
    pub text: String,
    pub source: String,
    pub category: String,
}
