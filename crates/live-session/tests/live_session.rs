//! Live session over loopback TCP

use inference_engine::{DecisionTree, InferenceEngine, Task, TreeNode};
use latency_recorder::{read_records, LatencyRecorder};
use live_session::{EndReason, RemoteClient, Server, SessionConfig, SessionState, SessionSummary};
use payload_codec::{FeatureVector, Prediction};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Class 7 when the first feature is at most 0.5, class 3 otherwise
fn threshold_engine() -> InferenceEngine {
    InferenceEngine::new(Box::new(DecisionTree {
        n_features: 3,
        task: Task::Classification,
        nodes: vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: vec![7.0] },
            TreeNode::Leaf { value: vec![3.0] },
        ],
    }))
}

/// Bind on an ephemeral port and serve one session in the background
async fn spawn_server(
    config: SessionConfig,
    sink: PathBuf,
) -> (String, JoinHandle<(SessionSummary, SessionState)>) {
    let server = Server::bind("127.0.0.1", 0, config).await.unwrap();
    let addr = server.local_addr().to_string();

    let handle = tokio::spawn(async move {
        let mut session = server.accept_one().await.unwrap();
        let mut recorder = LatencyRecorder::create(&sink).unwrap();
        let engine = threshold_engine();
        let summary = session.run(&engine, &mut recorder).await.unwrap();
        (summary, session.state())
    });

    (addr, handle)
}

#[tokio::test]
async fn test_requests_answered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("LC_times_E1.1_C1.csv");
    let config = SessionConfig::default();
    let (addr, handle) = spawn_server(config.clone(), sink.clone()).await;

    let inputs = [0.1, 0.9, 0.2, 0.7, 0.5];
    let mut client = RemoteClient::connect(&addr, &config).await.unwrap();
    let mut predictions = Vec::new();
    for first in inputs {
        let features = FeatureVector::new(vec![first, 0.2, 0.3]);
        predictions.push(client.predict(&features).await.unwrap());
    }
    client.close().await.unwrap();

    let expected: Vec<Prediction> = inputs
        .iter()
        .map(|x| Prediction::Class(if *x <= 0.5 { 7 } else { 3 }))
        .collect();
    assert_eq!(predictions, expected);

    let (summary, state) = handle.await.unwrap();
    assert_eq!(summary.requests, 5);
    assert_eq!(summary.send_failures, 0);
    assert_eq!(summary.end_reason, EndReason::PeerClosed);
    assert_eq!(summary.stats.frames_sent, 5);
    assert_eq!(state, SessionState::Closed);

    let rows = read_records(&sink).unwrap();
    let recorded: Vec<&str> = rows.iter().map(|r| r.pred.as_str()).collect();
    assert_eq!(recorded, vec!["7", "3", "7", "3", "7"]);
    assert!(rows.iter().all(|r| r.pred_time >= 0.0));
}

#[tokio::test]
async fn test_truncated_request_closes_without_response() {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("sink.csv");
    let (addr, handle) = spawn_server(SessionConfig::default(), sink.clone()).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(&[0, 0, 0, 10, 1, 2, 3]).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());

    let (summary, state) = handle.await.unwrap();
    assert_eq!(summary.end_reason, EndReason::PeerClosed);
    assert_eq!(summary.requests, 0);
    assert_eq!(state, SessionState::Closed);
    assert!(read_records(&sink).unwrap().is_empty());
}

#[tokio::test]
async fn test_stalled_request_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        read_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    };
    let (addr, handle) = spawn_server(config, dir.path().join("sink.csv")).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    // Header promises 8 bytes, only 2 ever arrive
    stream.write_all(&[0, 0, 0, 8, 1, 2]).await.unwrap();

    let (summary, state) = handle.await.unwrap();
    assert_eq!(summary.end_reason, EndReason::Timeout);
    assert_eq!(summary.requests, 0);
    assert_eq!(state, SessionState::Closed);

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_oversized_prefix_aborts_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        max_frame_bytes: 1024,
        ..SessionConfig::default()
    };
    let (addr, handle) = spawn_server(config, dir.path().join("sink.csv")).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(&[0x7F, 0xFF, 0xFF, 0xFF]).await.unwrap();

    let (summary, _) = handle.await.unwrap();
    assert!(matches!(summary.end_reason, EndReason::Protocol(_)));
    assert_eq!(summary.requests, 0);
}

#[tokio::test]
async fn test_only_one_connection_served() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::default();
    let (addr, handle) = spawn_server(config.clone(), dir.path().join("sink.csv")).await;

    let mut first = RemoteClient::connect(&addr, &config).await.unwrap();
    let prediction = first
        .predict(&FeatureVector::new(vec![0.1, 0.2, 0.3]))
        .await
        .unwrap();
    assert_eq!(prediction, Prediction::Class(7));
    first.close().await.unwrap();

    let (summary, _) = handle.await.unwrap();
    assert_eq!(summary.requests, 1);

    // Listener was released with the session
    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn test_listener_then_connected_session() {
    let server = Server::bind("127.0.0.1", 0, SessionConfig::default()).await.unwrap();
    assert_eq!(server.state(), SessionState::Listening);
    let addr = server.local_addr();

    let accepting = tokio::spawn(async move { server.accept_one().await.unwrap() });
    let _peer = TcpStream::connect(addr).await.unwrap();

    let session = accepting.await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}
