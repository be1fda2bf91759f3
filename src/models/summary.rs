use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of ingesting from one provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceIngest {
    pub fetched: usize,
    pub affected: usize,
}

/// Result of an ingest across one or more providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub sources: BTreeMap<String, SourceIngest>,
    pub total_in_store: usize,
}

impl IngestSummary {
    /// Provider name -> fetched count, the shape reported in sweep summaries.
    pub fn fetched_by_source(&self) -> BTreeMap<String, usize> {
        self.sources
            .iter()
            .map(|(name, s)| (name.clone(), s.fetched))
            .collect()
    }
}

/// Outcome of one saved search's notification sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepSummary {
    pub name: String,
    pub ingested: BTreeMap<String, usize>,
    pub new_count: usize,
    pub emailed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunAllSummary {
    pub ran: usize,
    pub failed: usize,
    pub results: Vec<SweepSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_by_source() {
        let mut summary = IngestSummary::default();
        summary.sources.insert(
            "reed".to_string(),
            SourceIngest {
                fetched: 25,
                affected: 3,
            },
        );
        summary.sources.insert(
            "adzuna".to_string(),
            SourceIngest {
                fetched: 20,
                affected: 0,
            },
        );
        let fetched = summary.fetched_by_source();
        assert_eq!(fetched.get("reed"), Some(&25));
        assert_eq!(fetched.get("adzuna"), Some(&20));
    }

    #[test]
    fn test_sweep_summary_omits_missing_error() {
        let summary = SweepSummary {
            name: "go".to_string(),
            new_count: 2,
            emailed: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert!(value.get("error").is_none());
        assert_eq!(value["new_count"], 2);
        assert_eq!(value["emailed"], true);
    }
}
