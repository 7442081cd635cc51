// ============================================================================
// PREDICTION CLIENT — posts the pad image to the remote recognizer
// ============================================================================
//
// The recognizer is an external HTTP service. One POST per predict command,
// JSON body `{ "<field>": "data:image/png;base64,..." }`. Deployed backends
// disagree on the response shape, so parsing accepts all of them:
//   { "predicted_digit": 7, "probs": [...], "top3": [...] }
//   { "prediction": 7 }
//   { "message": "Prediction made 7" }

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::io::EncodedImage;
use crate::settings::PadSettings;

/// Keys that may carry the predicted label, in lookup order.
const LABEL_KEYS: &[&str] = &["predicted_digit", "prediction", "predicted"];

/// Upper bound on class indices accepted in a `probs` field.
const MAX_CLASSES: usize = 256;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response carried no predicted label")]
    MissingLabel,
    #[error("prediction worker crashed: {0}")]
    Worker(String),
}

/// A parsed recognizer answer.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: i64,
    /// Per-class probabilities indexed by class, when the backend sends them.
    pub probs: Option<Vec<f64>>,
}

impl Prediction {
    /// Parse a response body, tolerating every known field naming.
    pub fn from_json(body: &str) -> Result<Self, PredictError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| PredictError::Malformed(e.to_string()))?;
        let Value::Object(obj) = value else {
            return Err(PredictError::Malformed("expected a JSON object".to_string()));
        };

        let label = LABEL_KEYS
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(label_from_value)
            .or_else(|| obj.get("message").and_then(Value::as_str).and_then(label_from_message))
            .ok_or(PredictError::MissingLabel)?;

        let probs = obj.get("probs").and_then(probs_from_value);
        Ok(Self { label, probs })
    }
}

fn label_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Last run of ASCII digits in a free-text message.
fn label_from_message(msg: &str) -> Option<i64> {
    let end = msg.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = msg[..end]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(0, |(i, c)| i + c.len_utf8());
    msg[start..end].parse().ok()
}

/// Accept `[p0, p1, ...]` or `{"0": p0, "1": p1, ...}`.
fn probs_from_value(v: &Value) -> Option<Vec<f64>> {
    match v {
        Value::Array(items) if items.len() <= MAX_CLASSES => {
            items.iter().map(Value::as_f64).collect()
        }
        Value::Object(map) => {
            let entries: Vec<(usize, f64)> = map
                .iter()
                .filter_map(|(k, v)| Some((k.trim().parse::<usize>().ok()?, v.as_f64()?)))
                .filter(|(i, _)| *i < MAX_CLASSES)
                .collect();
            let len = entries.iter().map(|(i, _)| i + 1).max()?;
            let mut out = vec![0.0; len];
            for (i, p) in entries {
                out[i] = p;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Build the JSON request body for `image`.
pub fn request_body(field: &str, image: &EncodedImage) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), Value::String(image.to_data_url()));
    Value::Object(map)
}

/// Blocking client for the recognizer endpoint.
#[derive(Clone, Debug)]
pub struct PredictionClient {
    client: Client,
    endpoint: String,
    field: String,
}

impl PredictionClient {
    pub fn new(settings: &PadSettings) -> Result<Self, PredictError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("digitpad/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            field: settings.payload_field.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `image` and parse the answer.
    pub fn predict(&self, image: &EncodedImage) -> Result<Prediction, PredictError> {
        let body = request_body(&self.field, image);
        log::info!(
            "posting {}x{} image ({} bytes PNG) to {}",
            image.width,
            image.height,
            image.png.len(),
            self.endpoint
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()?;

        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(PredictError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let prediction = Prediction::from_json(&text)?;
        log::info!("prediction response: label={} probs={}", prediction.label, prediction.probs.is_some());
        Ok(prediction)
    }
}

// ============================================================================
// BACKGROUND WORKER
// ============================================================================

/// Result delivered from a prediction thread.
#[derive(Debug)]
pub struct PredictionOutcome {
    /// Display generation at the time the request was issued.
    pub token: u64,
    pub result: Result<Prediction, PredictError>,
}

/// Run `client.predict(image)` on a worker thread, delivering the outcome on
/// `tx`.
pub fn spawn_prediction(
    client: PredictionClient,
    image: EncodedImage,
    token: u64,
    tx: Sender<PredictionOutcome>,
) -> JoinHandle<()> {
    spawn_job(move || client.predict(&image), token, tx)
}

/// Run `job` on a worker thread. An outcome is always sent, even when the
/// job panics. The receiver may have been dropped; the send error is ignored.
pub fn spawn_job<F>(job: F, token: u64, tx: Sender<PredictionOutcome>) -> JoinHandle<()>
where
    F: FnOnce() -> Result<Prediction, PredictError> + Send + 'static,
{
    std::thread::spawn(move || {
        let result = match std::panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => result,
            Err(payload) => Err(PredictError::Worker(panic_message(payload.as_ref()))),
        };
        let _ = tx.send(PredictionOutcome { token, result });
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// In-flight prediction requests and the channel their outcomes arrive on.
pub struct PredictionQueue {
    sender: Sender<PredictionOutcome>,
    receiver: Receiver<PredictionOutcome>,
    in_flight: usize,
}

impl Default for PredictionQueue {
    fn default() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            in_flight: 0,
        }
    }
}

impl PredictionQueue {
    /// Post `image` in the background, tagged with the display's current token.
    pub fn submit(&mut self, client: PredictionClient, image: EncodedImage, display: &PredictionDisplay) {
        self.submit_job(move || client.predict(&image), display);
    }

    pub fn submit_job<F>(&mut self, job: F, display: &PredictionDisplay)
    where
        F: FnOnce() -> Result<Prediction, PredictError> + Send + 'static,
    {
        spawn_job(job, display.token(), self.sender.clone());
        self.in_flight += 1;
    }

    /// Apply every outcome that has arrived. Returns how many arrived.
    pub fn poll(&mut self, display: &mut PredictionDisplay) -> usize {
        let mut n = 0;
        while let Ok(outcome) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            display.accept(outcome);
            n += 1;
        }
        n
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }
}

// ============================================================================
// DISPLAY STATE
// ============================================================================

/// Caller-side prediction display. Reset on clear; stale outcomes from
/// requests issued before the last reset are dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionDisplay {
    pub label: Option<i64>,
    pub probs: Option<Vec<f64>>,
    generation: u64,
}

impl PredictionDisplay {
    /// Token to tag a request issued now.
    pub fn token(&self) -> u64 {
        self.generation
    }

    pub fn record(&mut self, prediction: Prediction) {
        self.label = Some(prediction.label);
        self.probs = prediction.probs;
    }

    /// Forget the shown prediction and invalidate in-flight requests.
    pub fn reset(&mut self) {
        self.label = None;
        self.probs = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Apply a worker outcome. Errors are logged and leave the display as it
    /// was. Returns `true` when the display changed.
    pub fn accept(&mut self, outcome: PredictionOutcome) -> bool {
        if outcome.token != self.generation {
            log::debug!("dropping stale prediction (token {} != {})", outcome.token, self.generation);
            return false;
        }
        match outcome.result {
            Ok(prediction) => {
                self.record(prediction);
                true
            }
            Err(e) => {
                log::error!("prediction failed: {}", e);
                false
            }
        }
    }

    pub fn summary(&self) -> Option<String> {
        self.label.map(|l| format!("Predicted Digit: {}", l))
    }

    /// `"0:0.010 1:0.000 ..."`
    pub fn probabilities_line(&self) -> Option<String> {
        let probs = self.probs.as_ref()?;
        Some(
            probs
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}:{:.3}", i, p))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// The `n` most probable classes, highest first.
    pub fn top(&self, n: usize) -> Vec<(usize, f64)> {
        let Some(probs) = &self.probs else {
            return Vec::new();
        };
        let mut ranked: Vec<(usize, f64)> = probs.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}
