use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// User interest profile. Topic names are the structural identity:
/// adding or removing one triggers a rescore, weight and keyword
/// edits do not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterestProfile {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<InterestTopic>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestTopic {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_weight() -> f64 {
    1.0
}

impl InterestProfile {
    pub fn topic_names(&self) -> BTreeSet<String> {
        self.topics.iter().map(|t| t.name.clone()).collect()
    }
}

/// Durable state of the rescore coordinator, persisted as the
/// `needs_rescore` preference. A missing row reads as `Clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RescoreState {
    #[default]
    Clean,
    PendingRescore,
}
