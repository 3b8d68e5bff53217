//! Transformation of a usage document into labeled observations.
//!
//! Daily totals are dense: they are emitted for every record, zeros included.
//! Breakdown counters and engaged-user scalars are sparse: a value of zero or
//! less is treated as not reported and produces no observation.

use std::sync::Arc;

use copilot_metrics_common::{BreakdownEntry, Dimension, FeatureSection, UsageRecord};
use tracing::trace;

use crate::descriptor::{DescriptorRegistry, FeatureSet, MetricId};

/// Substituted for an empty dimension when it is the list's declared dimension.
pub const UNKNOWN_DIMENSION: &str = "unknown";

/// Daily totals, in emission order.
const TOTALS: [(MetricId, fn(&UsageRecord) -> i64); 8] = [
    (MetricId::Suggestions, |r: &UsageRecord| r.total_suggestions_count),
    (MetricId::Acceptances, |r: &UsageRecord| r.total_acceptances_count),
    (MetricId::LinesSuggested, |r: &UsageRecord| r.total_lines_suggested),
    (MetricId::LinesAccepted, |r: &UsageRecord| r.total_lines_accepted),
    (MetricId::ActiveUsers, |r: &UsageRecord| r.total_active_users),
    (MetricId::ChatAcceptances, |r: &UsageRecord| r.total_chat_acceptances),
    (MetricId::ChatTurns, |r: &UsageRecord| r.total_chat_turns),
    (MetricId::ActiveChatUsers, |r: &UsageRecord| r.total_active_chat_users),
];

/// Breakdown counters, in emission order.
const BREAKDOWN_COUNTERS: [(MetricId, fn(&BreakdownEntry) -> i64); 8] = [
    (MetricId::BreakdownSuggestions, |e: &BreakdownEntry| e.suggestions_count),
    (MetricId::BreakdownAcceptances, |e: &BreakdownEntry| e.acceptances_count),
    (MetricId::BreakdownLinesSuggested, |e: &BreakdownEntry| e.lines_suggested),
    (MetricId::BreakdownLinesAccepted, |e: &BreakdownEntry| e.lines_accepted),
    (MetricId::BreakdownActiveUsers, |e: &BreakdownEntry| e.active_users),
    (MetricId::BreakdownChatAcceptances, |e: &BreakdownEntry| e.chat_acceptances),
    (MetricId::BreakdownChatTurns, |e: &BreakdownEntry| e.chat_turns),
    (MetricId::BreakdownActiveChatUsers, |e: &BreakdownEntry| e.active_chat_users),
];

/// One labeled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// The descriptor this sample belongs to.
    pub metric: MetricId,
    /// Label pairs, in the descriptor's label order.
    pub labels: Vec<(&'static str, String)>,
    /// Sample value.
    pub value: f64,
}

impl Observation {
    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Walks usage documents and produces observations.
#[derive(Debug, Clone)]
pub struct Exporter {
    registry: Arc<DescriptorRegistry>,
    org: String,
}

impl Exporter {
    /// Create an exporter labeling every sample with `org`.
    pub fn new(registry: Arc<DescriptorRegistry>, org: impl Into<String>) -> Self {
        Self {
            registry,
            org: org.into(),
        }
    }

    /// Export every record of a document, in document order.
    pub fn export(&self, records: &[UsageRecord]) -> Vec<Observation> {
        let mut out = Vec::new();
        for record in records {
            self.export_record(record, &mut out);
        }
        trace!(
            records = records.len(),
            observations = out.len(),
            "Exported usage document"
        );
        out
    }

    /// Export one day.
    pub fn export_record(&self, record: &UsageRecord, out: &mut Vec<Observation>) {
        let day = record.day.as_str();

        for (metric, total) in TOTALS {
            self.push(out, metric, day, &[], total(record) as f64);
        }
        self.push(out, MetricId::AcceptanceRate, day, &[], record.acceptance_rate());

        if self.registry.feature_set() == FeatureSet::Minimal {
            return;
        }

        for entry in &record.breakdown {
            self.export_counters(
                day,
                entry,
                [
                    entry.language.as_str(),
                    entry.editor.as_str(),
                    entry.model.as_str(),
                ],
                out,
            );
        }

        self.export_feature(
            day,
            &record.copilot_ide_code_completions,
            MetricId::IdeCodeCompletionsEngagedUsers,
            out,
        );
        self.export_feature(
            day,
            &record.copilot_ide_chat,
            MetricId::IdeChatEngagedUsers,
            out,
        );
        self.export_feature(
            day,
            &record.copilot_dotcom_chat,
            MetricId::DotcomChatEngagedUsers,
            out,
        );

        // Repositories sit between the section scalar and its model list.
        let pull_requests = &record.copilot_dotcom_pull_requests;
        self.export_engaged(day, pull_requests, MetricId::DotcomPrEngagedUsers, out);
        for repo in &pull_requests.repositories {
            if repo.total_engaged_users > 0 {
                self.push(
                    out,
                    MetricId::DotcomPrRepoEngagedUsers,
                    day,
                    &[repo.name.as_str()],
                    repo.total_engaged_users as f64,
                );
            }
            for model in &repo.models {
                self.export_breakdown(day, model, Dimension::Model, out);
            }
        }
        self.export_breakdown_lists(day, pull_requests, out);
    }

    /// Export a breakdown entry from a list keyed by `dimension`.
    ///
    /// An empty value for the list's own dimension is reported as
    /// [`UNKNOWN_DIMENSION`]. The other two dimensions pass through untouched.
    pub fn export_breakdown(
        &self,
        day: &str,
        entry: &BreakdownEntry,
        dimension: Dimension,
        out: &mut Vec<Observation>,
    ) {
        let dimensions = Dimension::ALL.map(|d| {
            let value = entry.dimension(d);
            if d == dimension && value.is_empty() {
                UNKNOWN_DIMENSION
            } else {
                value
            }
        });
        self.export_counters(day, entry, dimensions, out);
    }

    fn export_feature<S: FeatureSection>(
        &self,
        day: &str,
        section: &S,
        metric: MetricId,
        out: &mut Vec<Observation>,
    ) {
        self.export_engaged(day, section, metric, out);
        self.export_breakdown_lists(day, section, out);
    }

    fn export_engaged<S: FeatureSection>(
        &self,
        day: &str,
        section: &S,
        metric: MetricId,
        out: &mut Vec<Observation>,
    ) {
        let engaged = section.total_engaged_users();
        if engaged > 0 {
            self.push(out, metric, day, &[], engaged as f64);
        }
    }

    fn export_breakdown_lists<S: FeatureSection>(
        &self,
        day: &str,
        section: &S,
        out: &mut Vec<Observation>,
    ) {
        for (dimension, entries) in section.breakdowns() {
            for entry in entries {
                self.export_breakdown(day, entry, dimension, out);
            }
        }
    }

    /// Emit one observation per positive counter.
    fn export_counters(
        &self,
        day: &str,
        entry: &BreakdownEntry,
        [language, editor, model]: [&str; 3],
        out: &mut Vec<Observation>,
    ) {
        for (metric, counter) in BREAKDOWN_COUNTERS {
            let value = counter(entry);
            if value > 0 {
                self.push(out, metric, day, &[language, editor, model], value as f64);
            }
        }
    }

    /// Append an observation labeled `day`, `org`, then `extra` in schema order.
    fn push(
        &self,
        out: &mut Vec<Observation>,
        metric: MetricId,
        day: &str,
        extra: &[&str],
        value: f64,
    ) {
        let descriptor = metric.descriptor();
        debug_assert!(self.registry.contains(metric), "{} not registered", descriptor.name);
        debug_assert_eq!(descriptor.labels.len(), extra.len() + 2);

        let values = [day, self.org.as_str()].into_iter().chain(extra.iter().copied());
        let labels = descriptor
            .labels
            .iter()
            .zip(values)
            .map(|(name, value)| (*name, value.to_string()))
            .collect();

        out.push(Observation {
            metric,
            labels,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_metrics_common::{
        DotcomChat, DotcomPullRequests, IdeChat, IdeCodeCompletions, RepositoryEntry,
    };

    fn exporter(feature_set: FeatureSet) -> Exporter {
        Exporter::new(Arc::new(DescriptorRegistry::new(feature_set)), "test-org")
    }

    fn count(observations: &[Observation], metric: MetricId) -> usize {
        observations.iter().filter(|o| o.metric == metric).count()
    }

    fn python_entry() -> BreakdownEntry {
        BreakdownEntry {
            language: "python".to_string(),
            suggestions_count: 50,
            acceptances_count: 40,
            ..Default::default()
        }
    }

    #[test]
    fn test_all_zero_record_yields_totals_and_rate() {
        let record = UsageRecord::new("2024-01-01");
        let observations = exporter(FeatureSet::Full).export(&[record]);

        assert_eq!(observations.len(), 9);
        for observation in &observations {
            assert_eq!(observation.value, 0.0);
            assert_eq!(observation.label("day"), Some("2024-01-01"));
            assert_eq!(observation.label("org"), Some("test-org"));
        }
    }

    #[test]
    fn test_totals_order_and_values() {
        let record = UsageRecord {
            total_suggestions_count: 100,
            total_acceptances_count: 80,
            total_lines_suggested: 500,
            total_lines_accepted: 400,
            total_active_users: 10,
            total_chat_acceptances: 20,
            total_chat_turns: 30,
            total_active_chat_users: 5,
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let values: Vec<_> = observations.iter().map(|o| (o.metric, o.value)).collect();
        assert_eq!(
            values,
            vec![
                (MetricId::Suggestions, 100.0),
                (MetricId::Acceptances, 80.0),
                (MetricId::LinesSuggested, 500.0),
                (MetricId::LinesAccepted, 400.0),
                (MetricId::ActiveUsers, 10.0),
                (MetricId::ChatAcceptances, 20.0),
                (MetricId::ChatTurns, 30.0),
                (MetricId::ActiveChatUsers, 5.0),
                (MetricId::AcceptanceRate, 0.8),
            ]
        );
    }

    #[test]
    fn test_acceptance_rate_zero_suggestions() {
        let record = UsageRecord {
            total_acceptances_count: 7,
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let rate = observations
            .iter()
            .find(|o| o.metric == MetricId::AcceptanceRate)
            .unwrap();
        assert_eq!(rate.value, 0.0);
    }

    #[test]
    fn test_generic_breakdown_is_sparse() {
        let record = UsageRecord {
            breakdown: vec![python_entry()],
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let breakdown: Vec<_> = observations.iter().skip(9).collect();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].metric, MetricId::BreakdownSuggestions);
        assert_eq!(breakdown[0].value, 50.0);
        assert_eq!(breakdown[1].metric, MetricId::BreakdownAcceptances);
        assert_eq!(breakdown[1].value, 40.0);
    }

    #[test]
    fn test_generic_breakdown_keeps_dimensions_verbatim() {
        let record = UsageRecord {
            breakdown: vec![BreakdownEntry {
                editor: "vscode".to_string(),
                active_users: 3,
                ..Default::default()
            }],
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let observation = &observations[9];
        assert_eq!(
            observation.labels,
            vec![
                ("day", "2024-01-01".to_string()),
                ("org", "test-org".to_string()),
                ("language", String::new()),
                ("editor", "vscode".to_string()),
                ("model", String::new()),
            ]
        );
    }

    #[test]
    fn test_non_positive_counters_suppressed() {
        let entry = BreakdownEntry {
            model: "gpt-4".to_string(),
            suggestions_count: 0,
            acceptances_count: -3,
            lines_suggested: 1,
            ..Default::default()
        };
        let mut out = Vec::new();
        exporter(FeatureSet::Full).export_breakdown("d", &entry, Dimension::Model, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].metric, MetricId::BreakdownLinesSuggested);
    }

    #[test]
    fn test_every_positive_counter_emitted_once() {
        let entry = BreakdownEntry {
            editor: "jetbrains".to_string(),
            suggestions_count: 1,
            acceptances_count: 2,
            lines_suggested: 3,
            lines_accepted: 4,
            active_users: 5,
            chat_acceptances: 6,
            chat_turns: 7,
            active_chat_users: 8,
            ..Default::default()
        };
        let mut out = Vec::new();
        exporter(FeatureSet::Full).export_breakdown("d", &entry, Dimension::Editor, &mut out);

        assert_eq!(out.len(), 8);
        for (observation, (metric, _)) in out.iter().zip(BREAKDOWN_COUNTERS) {
            assert_eq!(observation.metric, metric);
        }
        let values: Vec<_> = out.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_model_breakdown_keeps_model_label() {
        let entry = BreakdownEntry {
            model: "gpt-3.5".to_string(),
            suggestions_count: 75,
            chat_turns: 15,
            ..Default::default()
        };
        let mut out = Vec::new();
        exporter(FeatureSet::Full).export_breakdown("d", &entry, Dimension::Model, &mut out);

        assert_eq!(out.len(), 2);
        for observation in &out {
            assert_eq!(observation.label("model"), Some("gpt-3.5"));
            assert_eq!(observation.label("language"), Some(""));
            assert_eq!(observation.label("editor"), Some(""));
        }
    }

    #[test]
    fn test_defaulting_only_touches_declared_dimension() {
        let entry = BreakdownEntry {
            suggestions_count: 10,
            ..Default::default()
        };

        for dimension in Dimension::ALL {
            let mut out = Vec::new();
            exporter(FeatureSet::Full).export_breakdown("d", &entry, dimension, &mut out);

            assert_eq!(out.len(), 1);
            for other in Dimension::ALL {
                let expected = if other == dimension { UNKNOWN_DIMENSION } else { "" };
                assert_eq!(out[0].label(other.as_str()), Some(expected), "{dimension}/{other}");
            }
        }
    }

    #[test]
    fn test_defaulting_keeps_present_values() {
        let entry = BreakdownEntry {
            language: "rust".to_string(),
            editor: "helix".to_string(),
            suggestions_count: 10,
            ..Default::default()
        };
        let mut out = Vec::new();
        exporter(FeatureSet::Full).export_breakdown("d", &entry, Dimension::Editor, &mut out);

        assert_eq!(out[0].label("language"), Some("rust"));
        assert_eq!(out[0].label("editor"), Some("helix"));
        assert_eq!(out[0].label("model"), Some(""));
    }

    #[test]
    fn test_feature_engaged_users_only() {
        let record = UsageRecord {
            copilot_ide_code_completions: IdeCodeCompletions {
                total_engaged_users: 10,
                ..Default::default()
            },
            copilot_ide_chat: IdeChat {
                total_engaged_users: 5,
                ..Default::default()
            },
            copilot_dotcom_chat: DotcomChat {
                total_engaged_users: 3,
                ..Default::default()
            },
            copilot_dotcom_pull_requests: DotcomPullRequests {
                total_engaged_users: 2,
                ..Default::default()
            },
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        assert_eq!(observations.len(), 13);
        let features: Vec<_> = observations[9..].iter().map(|o| (o.metric, o.value)).collect();
        assert_eq!(
            features,
            vec![
                (MetricId::IdeCodeCompletionsEngagedUsers, 10.0),
                (MetricId::IdeChatEngagedUsers, 5.0),
                (MetricId::DotcomChatEngagedUsers, 3.0),
                (MetricId::DotcomPrEngagedUsers, 2.0),
            ]
        );
    }

    #[test]
    fn test_zero_engaged_users_suppressed() {
        let record = UsageRecord {
            copilot_ide_chat: IdeChat {
                total_engaged_users: 0,
                editors: vec![BreakdownEntry {
                    chat_turns: 4,
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        assert_eq!(count(&observations, MetricId::IdeChatEngagedUsers), 0);
        assert_eq!(observations.len(), 10);
        assert_eq!(observations[9].label("editor"), Some(UNKNOWN_DIMENSION));
    }

    #[test]
    fn test_feature_lists_walk_in_order() {
        let record = UsageRecord {
            copilot_ide_code_completions: IdeCodeCompletions {
                total_engaged_users: 1,
                languages: vec![BreakdownEntry {
                    language: "go".to_string(),
                    suggestions_count: 1,
                    ..Default::default()
                }],
                editors: vec![BreakdownEntry {
                    suggestions_count: 2,
                    ..Default::default()
                }],
                models: vec![BreakdownEntry {
                    model: "default".to_string(),
                    suggestions_count: 3,
                    ..Default::default()
                }],
            },
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let walked: Vec<_> = observations[10..]
            .iter()
            .map(|o| {
                (
                    o.label("language").unwrap_or_default().to_string(),
                    o.label("editor").unwrap_or_default().to_string(),
                    o.label("model").unwrap_or_default().to_string(),
                )
            })
            .collect();
        assert_eq!(
            walked,
            vec![
                ("go".to_string(), String::new(), String::new()),
                (String::new(), "unknown".to_string(), String::new()),
                (String::new(), String::new(), "default".to_string()),
            ]
        );
    }

    #[test]
    fn test_pull_request_repositories() {
        let record = UsageRecord {
            copilot_dotcom_pull_requests: DotcomPullRequests {
                total_engaged_users: 4,
                repositories: vec![
                    RepositoryEntry {
                        name: "acme/api".to_string(),
                        total_engaged_users: 3,
                        models: vec![BreakdownEntry {
                            suggestions_count: 20,
                            ..Default::default()
                        }],
                    },
                    RepositoryEntry {
                        name: "acme/web".to_string(),
                        total_engaged_users: 0,
                        models: vec![],
                    },
                ],
                models: vec![BreakdownEntry {
                    model: "gpt-4".to_string(),
                    acceptances_count: 9,
                    ..Default::default()
                }],
            },
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Full).export(&[record]);

        let tail: Vec<_> = observations[9..].iter().collect();
        assert_eq!(tail.len(), 4);
        assert_eq!(tail[0].metric, MetricId::DotcomPrEngagedUsers);
        assert_eq!(tail[1].metric, MetricId::DotcomPrRepoEngagedUsers);
        assert_eq!(tail[1].label("repository"), Some("acme/api"));
        assert_eq!(tail[1].value, 3.0);
        assert_eq!(tail[2].metric, MetricId::BreakdownSuggestions);
        assert_eq!(tail[2].label("model"), Some(UNKNOWN_DIMENSION));
        assert_eq!(tail[3].metric, MetricId::BreakdownAcceptances);
        assert_eq!(tail[3].label("model"), Some("gpt-4"));
    }

    #[test]
    fn test_minimal_skips_nested_sections() {
        let record = UsageRecord {
            breakdown: vec![python_entry()],
            copilot_dotcom_chat: DotcomChat {
                total_engaged_users: 3,
                models: vec![python_entry()],
            },
            ..UsageRecord::new("2024-01-01")
        };
        let observations = exporter(FeatureSet::Minimal).export(&[record]);

        assert_eq!(observations.len(), 9);
    }

    #[test]
    fn test_records_exported_in_document_order() {
        let records = vec![
            UsageRecord::new("2024-01-02"),
            UsageRecord::new("2024-01-01"),
        ];
        let observations = exporter(FeatureSet::Full).export(&records);

        assert_eq!(observations.len(), 18);
        assert!(observations[..9].iter().all(|o| o.label("day") == Some("2024-01-02")));
        assert!(observations[9..].iter().all(|o| o.label("day") == Some("2024-01-01")));
    }

    #[test]
    fn test_labels_follow_descriptor_schema() {
        let record = UsageRecord {
            breakdown: vec![python_entry()],
            copilot_dotcom_pull_requests: DotcomPullRequests {
                repositories: vec![RepositoryEntry {
                    name: "r".to_string(),
                    total_engaged_users: 1,
                    models: vec![],
                }],
                ..Default::default()
            },
            ..UsageRecord::new("2024-01-01")
        };

        for observation in exporter(FeatureSet::Full).export(&[record]) {
            let names: Vec<_> = observation.labels.iter().map(|(k, _)| *k).collect();
            assert_eq!(names, observation.metric.descriptor().labels);
        }
    }
}
