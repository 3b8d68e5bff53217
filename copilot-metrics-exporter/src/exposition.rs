//! OpenMetrics text encoding of a snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric, text};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tracing::trace;

use crate::collector::Snapshot;
use crate::descriptor::MetricDescriptor;

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Adapts one snapshot to the `prometheus-client` collector interface.
#[derive(Debug)]
struct SnapshotCollector {
    descriptors: &'static [MetricDescriptor],
    snapshot: Arc<Snapshot>,
}

impl Collector for SnapshotCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        for descriptor in self.descriptors {
            let mut series = self
                .snapshot
                .observations
                .iter()
                .filter(|o| o.metric == descriptor.id)
                .peekable();

            if series.peek().is_none() {
                continue;
            }

            let mut metric_encoder = encoder.encode_descriptor(
                descriptor.name,
                descriptor.help,
                None,
                MetricType::Gauge,
            )?;

            // A label set may only appear once per family.
            let mut seen = HashSet::new();
            for observation in series {
                if !seen.insert(observation.labels.as_slice()) {
                    trace!(
                        metric = descriptor.name,
                        labels = ?observation.labels,
                        "Skipping duplicate series"
                    );
                    continue;
                }

                // The text encoder writes label values verbatim.
                let labels: Vec<(&str, String)> = observation
                    .labels
                    .iter()
                    .map(|(name, value)| (*name, escape_label_value(value)))
                    .collect();
                let family_encoder = metric_encoder.encode_family(&labels)?;
                ConstGauge::new(observation.value).encode(family_encoder)?;
            }
        }

        Ok(())
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Render the observations of `snapshot` that belong to `descriptors`.
///
/// Descriptors are written in catalogue order; a descriptor without
/// observations is omitted.
pub fn encode(
    descriptors: &'static [MetricDescriptor],
    snapshot: Arc<Snapshot>,
) -> Result<String, std::fmt::Error> {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(SnapshotCollector {
        descriptors,
        snapshot,
    }));

    let mut body = String::new();
    text::encode(&mut body, &registry)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorRegistry, FeatureSet, MetricId};
    use crate::export::Observation;

    fn snapshot(observations: Vec<Observation>) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            days: 1,
            observations,
        })
    }

    fn total(metric: MetricId, value: f64) -> Observation {
        Observation {
            metric,
            labels: vec![
                ("day", "2024-01-01".to_string()),
                ("org", "acme".to_string()),
            ],
            value,
        }
    }

    #[test]
    fn test_encode_empty_snapshot() {
        let body = encode(DescriptorRegistry::default().describe(), snapshot(vec![])).unwrap();
        assert!(!body.contains("github_copilot"));
        assert!(body.trim_end().ends_with("# EOF"));
    }

    #[test]
    fn test_encode_gauge_with_help_and_labels() {
        let body = encode(
            DescriptorRegistry::default().describe(),
            snapshot(vec![total(MetricId::Suggestions, 100.0)]),
        )
        .unwrap();

        assert!(body.contains(
            "# HELP github_copilot_suggestions_total Total number of Copilot suggestions"
        ));
        assert!(body.contains("# TYPE github_copilot_suggestions_total gauge"));
        assert!(
            body.contains("github_copilot_suggestions_total{day=\"2024-01-01\",org=\"acme\"} 100")
        );
        assert!(!body.contains("github_copilot_acceptances_total"));
    }

    #[test]
    fn test_encode_groups_by_descriptor() {
        let body = encode(
            DescriptorRegistry::default().describe(),
            snapshot(vec![
                total(MetricId::Acceptances, 1.0),
                total(MetricId::Suggestions, 2.0),
                Observation {
                    labels: vec![
                        ("day", "2024-01-02".to_string()),
                        ("org", "acme".to_string()),
                    ],
                    ..total(MetricId::Acceptances, 3.0)
                },
            ]),
        )
        .unwrap();

        assert_eq!(body.matches("# TYPE github_copilot_acceptances_total gauge").count(), 1);
        let suggestions = body.find("# TYPE github_copilot_suggestions_total").unwrap();
        let acceptances = body.find("# TYPE github_copilot_acceptances_total").unwrap();
        assert!(suggestions < acceptances);
    }

    #[test]
    fn test_encode_skips_duplicate_series() {
        let body = encode(
            DescriptorRegistry::default().describe(),
            snapshot(vec![
                total(MetricId::ChatTurns, 5.0),
                total(MetricId::ChatTurns, 7.0),
            ]),
        )
        .unwrap();

        let samples: Vec<_> = body
            .lines()
            .filter(|l| l.starts_with("github_copilot_chat_turns_total{"))
            .collect();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].ends_with(" 5.0") || samples[0].ends_with(" 5"));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_encode_escapes_label_values() {
        let body = encode(
            DescriptorRegistry::default().describe(),
            snapshot(vec![Observation {
                metric: MetricId::BreakdownSuggestions,
                labels: vec![
                    ("day", "2024-01-01".to_string()),
                    ("org", "acme".to_string()),
                    ("language", "c\"sharp".to_string()),
                    ("editor", "vs\\code".to_string()),
                    ("model", "line\nbreak".to_string()),
                ],
                value: 3.0,
            }]),
        )
        .unwrap();

        let sample = body
            .lines()
            .find(|l| l.starts_with("github_copilot_breakdown_suggestions_total{"))
            .unwrap();
        assert!(sample.contains(r#"language="c\"sharp""#), "{sample}");
        assert!(sample.contains(r#"editor="vs\\code""#), "{sample}");
        assert!(sample.contains(r#"model="line\nbreak"}"#), "{sample}");
    }

    #[test]
    fn test_encode_respects_registry() {
        let body = encode(
            DescriptorRegistry::new(FeatureSet::Minimal).describe(),
            snapshot(vec![Observation {
                metric: MetricId::IdeChatEngagedUsers,
                ..total(MetricId::IdeChatEngagedUsers, 4.0)
            }]),
        )
        .unwrap();

        assert!(!body.contains("github_copilot_ide_chat_engaged_users"));
    }
}
