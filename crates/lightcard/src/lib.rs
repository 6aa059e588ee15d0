//! LightCard Inference Link
//!
//! Process-level wiring for the three run modes: live serving, offline
//! replay and the remote client that feeds a live server.

pub mod cli;
pub mod settings;

use anyhow::{bail, Context};
use batch_replay::{BatchReplayDriver, FeatureTable, JobReport};
use inference_engine::InferenceEngine;
use latency_recorder::{LatencyRecord, LatencyRecorder};
use live_session::{RemoteClient, Server, SessionSummary};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub use settings::Settings;
use settings::{LoggingSettings, MetricsSettings, ReplaySettings};

/// Initialize logging
pub fn init_logging(logging: &LoggingSettings) -> anyhow::Result<()> {
    let level = Level::from_str(&logging.level)
        .with_context(|| format!("invalid log level `{}`", logging.level))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("failed to set tracing subscriber")
}

/// Start the Prometheus scrape endpoint when configured
pub fn init_metrics(metrics: &MetricsSettings) -> anyhow::Result<()> {
    let Some(addr) = &metrics.listen_addr else {
        return Ok(());
    };

    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics address `{}`", addr))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    metrics::describe_counter!(live_session::metric::REQUESTS, "Requests answered by the live session");
    metrics::describe_counter!(live_session::metric::SEND_FAILURES, "Responses that could not be delivered");
    metrics::describe_histogram!(live_session::metric::INFERENCE_SECONDS, "Seconds spent inside the inference call");
    metrics::describe_counter!(batch_replay::metric::ROWS, "Rows replayed offline");
    metrics::describe_counter!(batch_replay::metric::JOBS_FAILED, "Offline jobs that stopped with an error");

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Serve one peer with the configured model until the session ends
pub async fn run_server(settings: &Settings) -> anyhow::Result<SessionSummary> {
    let server_settings = &settings.server;

    // Load before binding so a bad artifact never leaves a peer connected
    // to a server that cannot answer
    let engine = InferenceEngine::load(&server_settings.model_path)?;
    info!("Using model: {}", engine.describe());

    let server = Server::bind(
        &server_settings.host,
        server_settings.port,
        server_settings.session_config(),
    )
    .await?;
    let mut session = server.accept_one().await?;

    let mut recorder = LatencyRecorder::create(&server_settings.output_path)?;
    let summary = session.run(&engine, &mut recorder).await?;

    info!(
        "Served {} requests; {} records in {}",
        summary.requests,
        recorder.records_written(),
        recorder.path().display()
    );
    Ok(summary)
}

/// Run every configured replay job. Fails after all jobs ran if any failed.
pub fn run_replay(replay: &ReplaySettings) -> anyhow::Result<Vec<JobReport>> {
    let driver = BatchReplayDriver::new(replay.jobs()).with_metadata_columns(replay.metadata_columns);
    let reports = driver.run();

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        bail!("{} of {} replay jobs failed", failed, reports.len());
    }
    Ok(reports)
}

/// Stream every row of the client's feature table to a live server,
/// recording round-trip latency. Returns the number of answered rows.
pub async fn run_send(settings: &Settings) -> anyhow::Result<u64> {
    let client_settings = &settings.client;
    let table = FeatureTable::load(&client_settings.test_data_path, settings.replay.metadata_columns)?;
    info!("Amount of rows: {}", table.len());

    let mut recorder = LatencyRecorder::create(&client_settings.output_path)?;
    let mut client =
        RemoteClient::connect(&client_settings.server_addr, &settings.server.session_config()).await?;

    for features in table.rows() {
        let start = Instant::now();
        let prediction = client.predict(&features).await?;
        recorder.record(&LatencyRecord::new(start.elapsed(), prediction))?;
    }

    if let Err(e) = client.close().await {
        warn!("Closing connection failed: {}", e);
    }

    info!("Number of predictions received: {}", recorder.records_written());
    Ok(recorder.records_written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_replay::BatchJob;
    use inference_engine::{LinearModel, ModelArtifact};
    use latency_recorder::read_records;
    use ndarray::array;
    use ndarray_npy::write_npy;

    fn write_linear_model(dir: &std::path::Path) -> std::path::PathBuf {
        let artifact = ModelArtifact::Linear(LinearModel {
            weights: vec![1.0, 1.0],
            bias: 0.0,
            threshold: Some(1.0),
        });
        let path = dir.join("model.json");
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_replay_reports_failures_after_running_all() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("test.npy");
        write_npy(&table, &array![[0.2, 0.3, 0.0, 0.0], [0.9, 0.8, 1.0, 1.0]]).unwrap();

        let replay = ReplaySettings {
            jobs: vec![
                BatchJob {
                    model_path: dir.path().join("missing.json"),
                    test_data_path: table.clone(),
                    output_path: dir.path().join("a.csv"),
                },
                BatchJob {
                    model_path: write_linear_model(dir.path()),
                    test_data_path: table,
                    output_path: dir.path().join("b.csv"),
                },
            ],
            ..ReplaySettings::default()
        };

        assert!(run_replay(&replay).is_err());
        let rows = read_records(dir.path().join("b.csv")).unwrap();
        let preds: Vec<&str> = rows.iter().map(|r| r.pred.as_str()).collect();
        assert_eq!(preds, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_send_against_live_session() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("test.npy");
        write_npy(&table, &array![[0.2, 0.3, 0.0, 0.0], [0.9, 0.8, 1.0, 1.0], [0.1, 0.1, 2.0, 2.0]]).unwrap();

        let mut settings = Settings::default();
        settings.server.host = "127.0.0.1".to_string();
        settings.server.model_path = write_linear_model(dir.path());
        settings.server.output_path = dir.path().join("server.csv");
        settings.client.test_data_path = table;
        settings.client.output_path = dir.path().join("client.csv");

        // Bind here to learn the ephemeral port, then serve like run_server does
        let engine = InferenceEngine::load(&settings.server.model_path).unwrap();
        let server = Server::bind("127.0.0.1", 0, settings.server.session_config())
            .await
            .unwrap();
        settings.client.server_addr = server.local_addr().to_string();
        let server_sink = settings.server.output_path.clone();
        let serving = tokio::spawn(async move {
            let mut session = server.accept_one().await.unwrap();
            let mut recorder = LatencyRecorder::create(&server_sink).unwrap();
            session.run(&engine, &mut recorder).await.unwrap()
        });

        let answered = run_send(&settings).await.unwrap();
        assert_eq!(answered, 3);

        let summary = serving.await.unwrap();
        assert_eq!(summary.requests, 3);

        let server_rows = read_records(dir.path().join("server.csv")).unwrap();
        let client_rows = read_records(dir.path().join("client.csv")).unwrap();
        assert_eq!(server_rows.len(), 3);
        assert_eq!(
            client_rows.iter().map(|r| r.pred.clone()).collect::<Vec<_>>(),
            vec!["0", "1", "0"]
        );
    }
}
