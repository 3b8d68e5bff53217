//! The fixed catalogue of exported metric descriptors.
//!
//! Every descriptor is defined once in a static table. A
//! [`DescriptorRegistry`] exposes either the totals-only prefix of that table
//! or the whole of it, depending on the configured [`FeatureSet`]. Names, help
//! texts and label schemas never change for the lifetime of the process.

use serde::{Deserialize, Serialize};

/// Labels carried by every per-day series.
const DAY_ORG: &[&str] = &["day", "org"];

/// Labels carried by breakdown series.
const BREAKDOWN_LABELS: &[&str] = &["day", "org", "language", "editor", "model"];

/// Labels carried by the per-repository pull request series.
const REPOSITORY_LABELS: &[&str] = &["day", "org", "repository"];

/// Which part of the usage document is exported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSet {
    /// Daily totals and the acceptance rate only.
    Minimal,
    /// Totals plus breakdowns, feature sections and repositories.
    #[default]
    Full,
}

impl FeatureSet {
    /// Get the configuration string for this feature set.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSet::Minimal => "minimal",
            FeatureSet::Full => "full",
        }
    }
}

/// Identifies one entry of the catalogue.
///
/// The discriminant is the entry's position in the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricId {
    Suggestions,
    Acceptances,
    LinesSuggested,
    LinesAccepted,
    ActiveUsers,
    ChatAcceptances,
    ChatTurns,
    ActiveChatUsers,
    AcceptanceRate,
    BreakdownSuggestions,
    BreakdownAcceptances,
    BreakdownLinesSuggested,
    BreakdownLinesAccepted,
    BreakdownActiveUsers,
    BreakdownChatAcceptances,
    BreakdownChatTurns,
    BreakdownActiveChatUsers,
    IdeCodeCompletionsEngagedUsers,
    IdeChatEngagedUsers,
    DotcomChatEngagedUsers,
    DotcomPrEngagedUsers,
    DotcomPrRepoEngagedUsers,
}

impl MetricId {
    /// The catalogue entry for this metric.
    pub fn descriptor(self) -> &'static MetricDescriptor {
        &CATALOGUE[self as usize]
    }
}

/// An immutable metric definition.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Catalogue identity.
    pub id: MetricId,
    /// Full metric name.
    pub name: &'static str,
    /// Help text.
    pub help: &'static str,
    /// Ordered label names. Every observation carries exactly these.
    pub labels: &'static [&'static str],
}

const fn describe(
    id: MetricId,
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
) -> MetricDescriptor {
    MetricDescriptor {
        id,
        name,
        help,
        labels,
    }
}

/// Number of descriptors exported with [`FeatureSet::Minimal`].
pub const MINIMAL_DESCRIPTOR_COUNT: usize = 9;

/// Number of descriptors exported with [`FeatureSet::Full`].
pub const FULL_DESCRIPTOR_COUNT: usize = 22;

static CATALOGUE: [MetricDescriptor; FULL_DESCRIPTOR_COUNT] = [
    // Daily totals
    describe(
        MetricId::Suggestions,
        "github_copilot_suggestions_total",
        "Total number of Copilot suggestions",
        DAY_ORG,
    ),
    describe(
        MetricId::Acceptances,
        "github_copilot_acceptances_total",
        "Total number of Copilot acceptances",
        DAY_ORG,
    ),
    describe(
        MetricId::LinesSuggested,
        "github_copilot_lines_suggested_total",
        "Total number of lines suggested by Copilot",
        DAY_ORG,
    ),
    describe(
        MetricId::LinesAccepted,
        "github_copilot_lines_accepted_total",
        "Total number of lines accepted from Copilot",
        DAY_ORG,
    ),
    describe(
        MetricId::ActiveUsers,
        "github_copilot_active_users_total",
        "Total number of active Copilot users",
        DAY_ORG,
    ),
    describe(
        MetricId::ChatAcceptances,
        "github_copilot_chat_acceptances_total",
        "Total number of Copilot chat acceptances",
        DAY_ORG,
    ),
    describe(
        MetricId::ChatTurns,
        "github_copilot_chat_turns_total",
        "Total number of Copilot chat turns",
        DAY_ORG,
    ),
    describe(
        MetricId::ActiveChatUsers,
        "github_copilot_active_chat_users_total",
        "Total number of active Copilot chat users",
        DAY_ORG,
    ),
    describe(
        MetricId::AcceptanceRate,
        "github_copilot_acceptance_rate",
        "Copilot acceptance rate (acceptances/suggestions)",
        DAY_ORG,
    ),
    // Breakdowns by language, editor or model
    describe(
        MetricId::BreakdownSuggestions,
        "github_copilot_breakdown_suggestions_total",
        "Copilot suggestions by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownAcceptances,
        "github_copilot_breakdown_acceptances_total",
        "Copilot acceptances by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownLinesSuggested,
        "github_copilot_breakdown_lines_suggested_total",
        "Lines suggested by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownLinesAccepted,
        "github_copilot_breakdown_lines_accepted_total",
        "Lines accepted by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownActiveUsers,
        "github_copilot_breakdown_active_users",
        "Active users by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownChatAcceptances,
        "github_copilot_breakdown_chat_acceptances_total",
        "Chat acceptances by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownChatTurns,
        "github_copilot_breakdown_chat_turns_total",
        "Chat turns by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    describe(
        MetricId::BreakdownActiveChatUsers,
        "github_copilot_breakdown_active_chat_users",
        "Active chat users by language, editor, or model",
        BREAKDOWN_LABELS,
    ),
    // Feature sections
    describe(
        MetricId::IdeCodeCompletionsEngagedUsers,
        "github_copilot_ide_code_completions_engaged_users",
        "Total engaged users for IDE code completions",
        DAY_ORG,
    ),
    describe(
        MetricId::IdeChatEngagedUsers,
        "github_copilot_ide_chat_engaged_users",
        "Total engaged users for IDE chat",
        DAY_ORG,
    ),
    describe(
        MetricId::DotcomChatEngagedUsers,
        "github_copilot_dotcom_chat_engaged_users",
        "Total engaged users for Dotcom chat",
        DAY_ORG,
    ),
    describe(
        MetricId::DotcomPrEngagedUsers,
        "github_copilot_dotcom_pr_engaged_users",
        "Total engaged users for Dotcom pull requests",
        DAY_ORG,
    ),
    describe(
        MetricId::DotcomPrRepoEngagedUsers,
        "github_copilot_dotcom_pr_repo_engaged_users",
        "Engaged users for Dotcom pull requests by repository",
        REPOSITORY_LABELS,
    ),
];

/// The descriptors exposed for one configuration.
///
/// Created once at startup and shared by reference with every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRegistry {
    feature_set: FeatureSet,
    descriptors: &'static [MetricDescriptor],
}

impl DescriptorRegistry {
    /// Create the registry for a feature set.
    pub fn new(feature_set: FeatureSet) -> Self {
        let descriptors = match feature_set {
            FeatureSet::Minimal => &CATALOGUE[..MINIMAL_DESCRIPTOR_COUNT],
            FeatureSet::Full => &CATALOGUE[..],
        };

        Self {
            feature_set,
            descriptors,
        }
    }

    /// The configured feature set.
    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    /// Enumerate all descriptors, always in catalogue order.
    pub fn describe(&self) -> &'static [MetricDescriptor] {
        self.descriptors
    }

    /// Whether the registry exposes the given metric.
    pub fn contains(&self, id: MetricId) -> bool {
        (id as usize) < self.descriptors.len()
    }

    /// Number of exposed descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry exposes nothing. Never true for a built registry.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new(FeatureSet::default())
    }
}
