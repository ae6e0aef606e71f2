//! Shared harness for the API integration tests.
//!
//! Builds the same router `main.rs` serves, wired to a scripted
//! estimator so tests exercise the full submit/dispatch/stream path
//! without an external service or a network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use mealscan_api::config::ServerConfig;
use mealscan_api::engine::Engine;
use mealscan_api::router::build_app_router;
use mealscan_api::state::AppState;
use mealscan_core::task::Task;
use mealscan_core::types::TaskId;
use mealscan_core::upload::ImageUpload;
use mealscan_estimator::{EstimationJob, Estimator, EstimatorError, JobEvent, JobHandle};
use mealscan_events::ProgressBroker;
use mealscan_store::TaskStore;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        estimator_url: "http://localhost:8001".to_string(),
        estimator_submit_timeout_secs: 30,
        estimator_event_timeout_secs: 120,
        worker_limit: 4,
    }
}

// ---------------------------------------------------------------------------
// Scripted estimator
// ---------------------------------------------------------------------------

/// How a scripted job behaves at submission.
pub enum SubmitBehavior {
    /// Accept and hand back a job id equal to the upload's filename.
    Accept,
    /// Reject with the given error.
    Reject(EstimatorError),
    /// Panic inside the worker, exercising fault isolation.
    Panic,
}

/// One scripted job: a submit behavior plus the status events its
/// stream will yield, in order.
pub struct Script {
    pub submit: SubmitBehavior,
    pub events: Vec<Result<JobEvent, EstimatorError>>,
}

impl Script {
    /// A job that reports the given progress checkpoints and then
    /// completes with a single recognized food.
    pub fn completes(progress: &[f64]) -> Self {
        let mut events: Vec<Result<JobEvent, EstimatorError>> = progress
            .iter()
            .map(|p| {
                Ok(JobEvent::Progress {
                    progress: *p,
                    message: format!("Analyzing ({:.0}%)", p * 100.0),
                })
            })
            .collect();
        events.push(Ok(JobEvent::Completed {
            result: sample_result(),
        }));
        Self {
            submit: SubmitBehavior::Accept,
            events,
        }
    }

    /// A job that reports the given checkpoints and then fails with
    /// `error` on the service side.
    pub fn fails(progress: &[f64], error: &str) -> Self {
        let mut events: Vec<Result<JobEvent, EstimatorError>> = progress
            .iter()
            .map(|p| {
                Ok(JobEvent::Progress {
                    progress: *p,
                    message: "Analyzing".to_string(),
                })
            })
            .collect();
        events.push(Ok(JobEvent::Failed {
            error: error.to_string(),
        }));
        Self {
            submit: SubmitBehavior::Accept,
            events,
        }
    }
}

/// In-process [`Estimator`] driven by per-filename scripts.
///
/// The upload's filename selects the script, so concurrent tasks get
/// independent, deterministic behavior.
#[derive(Default)]
pub struct ScriptedEstimator {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, filename: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(filename.to_string(), script);
        self
    }
}

#[async_trait]
impl Estimator for ScriptedEstimator {
    async fn submit(&self, upload: &ImageUpload) -> Result<JobHandle, EstimatorError> {
        let filename = upload.filename.clone().unwrap_or_default();
        // Release the lock before a scripted panic so other workers'
        // scripts stay usable.
        let behavior = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts
                .get_mut(&filename)
                .unwrap_or_else(|| panic!("No script for upload '{filename}'"));
            std::mem::replace(&mut script.submit, SubmitBehavior::Accept)
        };

        match behavior {
            SubmitBehavior::Accept => Ok(JobHandle { job_id: filename }),
            SubmitBehavior::Reject(error) => Err(error),
            SubmitBehavior::Panic => panic!("scripted worker fault"),
        }
    }

    async fn watch(&self, handle: &JobHandle) -> Result<Box<dyn EstimationJob>, EstimatorError> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .remove(&handle.job_id)
            .unwrap_or_else(|| panic!("No script for job '{}'", handle.job_id));
        Ok(Box::new(ScriptedJob {
            events: script.events.into(),
        }))
    }
}

struct ScriptedJob {
    events: VecDeque<Result<JobEvent, EstimatorError>>,
}

#[async_trait]
impl EstimationJob for ScriptedJob {
    async fn next_event(&mut self) -> Result<JobEvent, EstimatorError> {
        // Yield so concurrent workers interleave like a real stream.
        tokio::task::yield_now().await;
        self.events
            .pop_front()
            .unwrap_or(Err(EstimatorError::ConnectionLost(
                "Script exhausted without a terminal event".to_string(),
            )))
    }
}

/// A completed-job payload with one recognized food.
pub fn sample_result() -> mealscan_core::estimation::EstimationResult {
    mealscan_core::estimation::EstimationResult {
        foods: vec![mealscan_core::estimation::FoodItem {
            food_name: "grilled salmon".to_string(),
            estimated_mass_g: 180.0,
            confidence: 0.92,
            verification_method: "reference object".to_string(),
            reasoning: "plate diameter used for scale".to_string(),
        }],
        total_mass_g: 180.0,
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Everything a test needs: the router plus direct handles to the
/// state behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<TaskStore>,
    pub broker: Arc<ProgressBroker>,
    pub dispatcher: mealscan_api::engine::Dispatcher,
    pub cancel: CancellationToken,
}

/// Build the full application against a scripted estimator, with the
/// worker engine running.
pub fn build_test_app(estimator: Arc<dyn Estimator>) -> TestApp {
    let config = test_config();
    let store = Arc::new(TaskStore::new());
    let broker = Arc::new(ProgressBroker::new());

    let (dispatcher, engine) = Engine::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        estimator,
        config.worker_limit,
    );
    let cancel = CancellationToken::new();
    tokio::spawn(engine.run(cancel.clone()));

    let state = AppState {
        store: Arc::clone(&store),
        broker: Arc::clone(&broker),
        dispatcher: dispatcher.clone(),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        broker,
        dispatcher,
        cancel,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request to the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// POST a single-file multipart body to the app.
pub async fn post_image(
    app: Router,
    uri: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Response<Body> {
    let boundary = "mealscan-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Minimal valid PNG payload (header plus padding).
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// Poll the store until the task reaches a terminal state.
///
/// Panics after two seconds; scripted jobs finish in microseconds, so
/// hitting the deadline means the worker dropped the task.
pub async fn wait_for_terminal(store: &TaskStore, task_id: TaskId) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(task) = store.get(task_id).await {
            if task.status.is_terminal() {
                return task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Task {task_id} did not reach a terminal state in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Assert helper: response status with body context on mismatch.
pub async fn assert_status(response: Response<Body>, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let json = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {json}");
    json
}
