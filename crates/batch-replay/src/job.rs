//! Batch Job Definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One offline replay unit: model, stored test set, latency sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub model_path: PathBuf,
    pub test_data_path: PathBuf,
    pub output_path: PathBuf,
}

/// Path templates with `{experiment}` and `{class}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub model: String,
    pub test_data: String,
    pub output: String,
}

impl JobTemplate {
    /// Expand over `1..=experiments` × `1..=classes`, experiment-major
    pub fn expand(&self, experiments: u32, classes: u32) -> Vec<BatchJob> {
        (1..=experiments)
            .flat_map(|experiment| {
                (1..=classes).map(move |class| BatchJob {
                    model_path: fill(&self.model, experiment, class),
                    test_data_path: fill(&self.test_data, experiment, class),
                    output_path: fill(&self.output, experiment, class),
                })
            })
            .collect()
    }
}

fn fill(template: &str, experiment: u32, class: u32) -> PathBuf {
    PathBuf::from(
        template
            .replace("{experiment}", &experiment.to_string())
            .replace("{class}", &class.to_string()),
    )
}
