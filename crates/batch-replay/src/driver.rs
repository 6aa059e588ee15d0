//! Batch Replay Driver

use crate::job::BatchJob;
use crate::table::{FeatureTable, DEFAULT_METADATA_COLUMNS};
use crate::{metric, BatchError};
use inference_engine::{InferenceEngine, InferencePort};
use latency_recorder::{LatencyRecord, LatencyRecorder};
use tracing::{debug, error, info};

/// Row counts for one finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    /// Rows in the feature table
    pub total_rows: usize,
    /// Rows predicted and recorded
    pub completed: usize,
}

/// What happened to one configured job
#[derive(Debug)]
pub struct JobReport {
    pub job: BatchJob,
    pub outcome: Result<JobStats, BatchError>,
}

impl JobReport {
    /// Whether the job ran to completion
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs configured jobs strictly in order, one row at a time
pub struct BatchReplayDriver {
    jobs: Vec<BatchJob>,
    metadata_columns: usize,
}

impl BatchReplayDriver {
    /// Create a driver over an ordered job list
    pub fn new(jobs: Vec<BatchJob>) -> Self {
        Self {
            jobs,
            metadata_columns: DEFAULT_METADATA_COLUMNS,
        }
    }

    /// Override how many trailing table columns are metadata
    pub fn with_metadata_columns(mut self, metadata_columns: usize) -> Self {
        self.metadata_columns = metadata_columns;
        self
    }

    /// Configured jobs
    pub fn jobs(&self) -> &[BatchJob] {
        &self.jobs
    }

    /// Run every job. A failed job is logged and reported; the next job
    /// still runs.
    pub fn run(&self) -> Vec<JobReport> {
        info!("Starting batch replay of {} jobs", self.jobs.len());
        let mut reports = Vec::with_capacity(self.jobs.len());

        for (idx, job) in self.jobs.iter().enumerate() {
            info!(
                "Job {}/{}: model={} data={} sink={}",
                idx + 1,
                self.jobs.len(),
                job.model_path.display(),
                job.test_data_path.display(),
                job.output_path.display()
            );

            let outcome = self.run_job(job);
            match &outcome {
                Ok(stats) => info!(
                    "Number of predictions made: {} of {}",
                    stats.completed, stats.total_rows
                ),
                Err(e) => {
                    error!("Job {} failed: {}", idx + 1, e);
                    metrics::counter!(metric::JOBS_FAILED).increment(1);
                }
            }

            reports.push(JobReport {
                job: job.clone(),
                outcome,
            });
        }

        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        info!("Batch replay finished: {} ok, {} failed", reports.len() - failed, failed);
        reports
    }

    /// Run a single job: sink first, then model, then every table row
    pub fn run_job(&self, job: &BatchJob) -> Result<JobStats, BatchError> {
        let mut recorder = LatencyRecorder::create(&job.output_path)?;

        let engine = InferenceEngine::load(&job.model_path).map_err(|source| BatchError::Model {
            path: job.model_path.display().to_string(),
            source,
        })?;

        let table = FeatureTable::load(&job.test_data_path, self.metadata_columns)?;
        info!("Amount of rows: {}", table.len());

        let mut stats = JobStats {
            total_rows: table.len(),
            completed: 0,
        };

        for (row, features) in table.rows().enumerate() {
            let result = engine
                .infer(&features)
                .map_err(|source| BatchError::Inference { row, source })?;
            debug!(
                " >>> Prediction: {} in {:.4} seconds",
                result.prediction,
                result.latency_secs()
            );

            recorder.record(&LatencyRecord::new(result.latency, result.prediction))?;
            stats.completed += 1;
            metrics::counter!(metric::ROWS).increment(1);
            metrics::histogram!(metric::INFERENCE_SECONDS).record(result.latency_secs());
        }

        Ok(stats)
    }
}
