//! Copilot usage document model.
//!
//! Mirrors the JSON returned by the Copilot metrics REST endpoints: a list of
//! per-day [`UsageRecord`]s, each carrying dense totals, an optional generic
//! breakdown list and four optional feature sections.
//!
//! Every field is optional on the wire. Missing and `null` values decode to
//! their empty default so that an absent section simply contributes nothing.

use serde::{Deserialize, Deserializer, Serialize};

/// The decoded response of one metrics request, one record per day.
pub type UsageDocument = Vec<UsageRecord>;

/// Decode `null` as the type's default instead of failing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One calendar day of aggregated activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Day in `YYYY-MM-DD` form, as reported upstream.
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_suggestions_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_acceptances_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_lines_suggested: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_lines_accepted: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_active_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_chat_acceptances: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_chat_turns: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_active_chat_users: i64,

    /// Generic breakdown list, exported with its dimensions verbatim.
    #[serde(default, deserialize_with = "null_as_default")]
    pub breakdown: Vec<BreakdownEntry>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub copilot_ide_code_completions: IdeCodeCompletions,
    #[serde(default, deserialize_with = "null_as_default")]
    pub copilot_ide_chat: IdeChat,
    #[serde(default, deserialize_with = "null_as_default")]
    pub copilot_dotcom_chat: DotcomChat,
    #[serde(default, deserialize_with = "null_as_default")]
    pub copilot_dotcom_pull_requests: DotcomPullRequests,
}

impl UsageRecord {
    /// Create an empty record for the given day.
    pub fn new(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            ..Default::default()
        }
    }

    /// Acceptances divided by suggestions, or exactly `0.0` with no suggestions.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_suggestions_count > 0 {
            self.total_acceptances_count as f64 / self.total_suggestions_count as f64
        } else {
            0.0
        }
    }
}

/// A dimensioned slice of activity.
///
/// Any combination of the three dimensions may be set. Counters that are zero
/// or negative mean "not reported".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub editor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acceptances_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lines_suggested: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lines_accepted: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_acceptances: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_turns: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_chat_users: i64,
}

impl BreakdownEntry {
    /// Value of the dimension field named by `dimension`.
    pub fn dimension(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Language => &self.language,
            Dimension::Editor => &self.editor,
            Dimension::Model => &self.model,
        }
    }
}

/// The dimension a breakdown list is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Language,
    Editor,
    Model,
}

impl Dimension {
    /// All dimensions in label order.
    pub const ALL: [Dimension; 3] = [Dimension::Language, Dimension::Editor, Dimension::Model];

    /// Get the label name for this dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Language => "language",
            Dimension::Editor => "editor",
            Dimension::Model => "model",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common shape of the four feature sections.
pub trait FeatureSection {
    /// Engaged users for the feature; zero or less means not reported.
    fn total_engaged_users(&self) -> i64;

    /// The section's breakdown lists in export order, tagged by dimension.
    fn breakdowns(&self) -> Vec<(Dimension, &[BreakdownEntry])>;
}

/// IDE code completions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeCodeCompletions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_engaged_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub languages: Vec<BreakdownEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub editors: Vec<BreakdownEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<BreakdownEntry>,
}

impl FeatureSection for IdeCodeCompletions {
    fn total_engaged_users(&self) -> i64 {
        self.total_engaged_users
    }

    fn breakdowns(&self) -> Vec<(Dimension, &[BreakdownEntry])> {
        vec![
            (Dimension::Language, self.languages.as_slice()),
            (Dimension::Editor, self.editors.as_slice()),
            (Dimension::Model, self.models.as_slice()),
        ]
    }
}

/// Chat inside the IDE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeChat {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_engaged_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub editors: Vec<BreakdownEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<BreakdownEntry>,
}

impl FeatureSection for IdeChat {
    fn total_engaged_users(&self) -> i64 {
        self.total_engaged_users
    }

    fn breakdowns(&self) -> Vec<(Dimension, &[BreakdownEntry])> {
        vec![
            (Dimension::Editor, self.editors.as_slice()),
            (Dimension::Model, self.models.as_slice()),
        ]
    }
}

/// Chat on github.com.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotcomChat {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_engaged_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<BreakdownEntry>,
}

impl FeatureSection for DotcomChat {
    fn total_engaged_users(&self) -> i64 {
        self.total_engaged_users
    }

    fn breakdowns(&self) -> Vec<(Dimension, &[BreakdownEntry])> {
        vec![(Dimension::Model, self.models.as_slice())]
    }
}

/// Pull request summaries on github.com.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotcomPullRequests {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_engaged_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repositories: Vec<RepositoryEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<BreakdownEntry>,
}

impl FeatureSection for DotcomPullRequests {
    fn total_engaged_users(&self) -> i64 {
        self.total_engaged_users
    }

    fn breakdowns(&self) -> Vec<(Dimension, &[BreakdownEntry])> {
        vec![(Dimension::Model, self.models.as_slice())]
    }
}

/// Per-repository pull request activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_engaged_users: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<BreakdownEntry>,
}
