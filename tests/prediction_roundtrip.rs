//! End-to-end: draw on a surface, post it to a stub recognizer, update the
//! display.

use std::io::Read;
use std::sync::Once;
use std::thread;
use std::time::Duration;

use digitpad::canvas::{BACKGROUND, DrawingSurface, Point};
use digitpad::io::{PNG_DATA_URL_PREFIX, decode_data_url};
use digitpad::ops::predict::{
    PredictError, PredictionClient, PredictionDisplay, PredictionOutcome, spawn_prediction,
};
use digitpad::settings::PadSettings;
use tiny_http::{Header, Response, Server};

static INIT: Once = Once::new();
const ADDR: &str = "127.0.0.1:18087";

/// Start the stub recognizer once for the whole test binary.
fn start_stub_server() -> String {
    INIT.call_once(|| {
        thread::spawn(|| {
            let server = Server::http(ADDR).unwrap();
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
                let url = request.url().to_string();

                let field = if url == "/predict-image" { "image" } else { "image_data" };
                let has_image = json
                    .get(field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|s| s.starts_with(PNG_DATA_URL_PREFIX));

                let (status, text) = match url.as_str() {
                    _ if !has_image => (422, r#"{"detail": "missing image"}"#.to_string()),
                    "/predict" | "/predict-image" => (
                        200,
                        r#"{"predicted_digit": 7, "probs": [0,0,0,0,0,0,0,1,0,0], "top3": [[7, 1.0]]}"#
                            .to_string(),
                    ),
                    "/message" => (200, r#"{"message": "Prediction made 3"}"#.to_string()),
                    "/echo-size" => {
                        // Reports the decoded PNG byte length as the label
                        let len = json[field]
                            .as_str()
                            .and_then(decode_data_url)
                            .map_or(0, |b| b.len());
                        (200, format!(r#"{{"prediction": {}}}"#, len))
                    }
                    "/garbage" => (200, "<html>oops</html>".to_string()),
                    "/nolabel" => (200, r#"{"probs": [1.0]}"#.to_string()),
                    _ => (500, "internal error".to_string()),
                };
                let response = Response::from_string(text)
                    .with_status_code(status)
                    .with_header("Content-Type: application/json".parse::<Header>().unwrap());
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        thread::sleep(Duration::from_millis(200));
    });
    format!("http://{}", ADDR)
}

fn client_for(path: &str, field: &str) -> PredictionClient {
    let base = start_stub_server();
    let settings = PadSettings {
        endpoint: format!("{}{}", base, path),
        payload_field: field.to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    PredictionClient::new(&settings).unwrap()
}

fn drawn_surface() -> DrawingSurface {
    let mut s = DrawingSurface::new(280, 280, 1.0);
    s.begin_stroke(Point::new(10.0, 10.0));
    s.extend_stroke(Point::new(50.0, 50.0));
    s.end_stroke();
    s
}

#[test]
fn diagonal_stroke_predicts_seven() {
    let surface = drawn_surface();
    assert_ne!(*surface.pixels().get_pixel(30, 30), BACKGROUND);
    assert_eq!(*surface.pixels().get_pixel(200, 30), BACKGROUND);

    let image = surface.export_image().unwrap();
    assert_eq!((image.width, image.height), (280, 280));

    let client = client_for("/predict", "image_data");
    let mut display = PredictionDisplay::default();
    let outcome = PredictionOutcome {
        token: display.token(),
        result: client.predict(&image),
    };
    assert!(display.accept(outcome));
    assert_eq!(display.label, Some(7));
    assert_eq!(display.summary().as_deref(), Some("Predicted Digit: 7"));
    assert_eq!(display.top(1), vec![(7, 1.0)]);
}

#[test]
fn alternate_payload_field() {
    let image = drawn_surface().export_image().unwrap();
    let p = client_for("/predict-image", "image").predict(&image).unwrap();
    assert_eq!(p.label, 7);

    // Server expecting `image` rejects the default field name
    let err = client_for("/predict-image", "image_data")
        .predict(&image)
        .unwrap_err();
    assert!(matches!(err, PredictError::Status { status: 422, .. }));
}

#[test]
fn message_only_response() {
    let image = drawn_surface().export_image().unwrap();
    let p = client_for("/message", "image_data").predict(&image).unwrap();
    assert_eq!(p.label, 3);
    assert_eq!(p.probs, None);
}

#[test]
fn payload_carries_the_whole_png() {
    let image = drawn_surface().export_image().unwrap();
    let p = client_for("/echo-size", "image_data").predict(&image).unwrap();
    assert_eq!(p.label, image.png.len() as i64);
}

#[test]
fn failures_leave_display_unchanged() {
    let image = drawn_surface().export_image().unwrap();
    let mut display = PredictionDisplay::default();
    display.accept(PredictionOutcome {
        token: display.token(),
        result: client_for("/predict", "image_data").predict(&image),
    });
    let before = display.clone();

    for path in ["/boom", "/garbage", "/nolabel"] {
        let result = client_for(path, "image_data").predict(&image);
        assert!(result.is_err(), "{path} should fail");
        assert!(!display.accept(PredictionOutcome { token: display.token(), result }));
        assert_eq!(display, before);
    }
}

#[test]
fn unreachable_endpoint_is_a_network_error() {
    let settings = PadSettings {
        // Reserved port with nothing listening
        endpoint: "http://127.0.0.1:9/predict".to_string(),
        timeout_secs: 2,
        ..Default::default()
    };
    let client = PredictionClient::new(&settings).unwrap();
    let image = drawn_surface().export_image().unwrap();
    assert!(matches!(client.predict(&image), Err(PredictError::Network(_))));
}

#[test]
fn worker_result_after_clear_is_discarded() {
    let client = client_for("/predict", "image_data");
    let mut surface = drawn_surface();
    let mut display = PredictionDisplay::default();
    let (tx, rx) = std::sync::mpsc::channel();

    let handle = spawn_prediction(
        client,
        surface.export_image().unwrap(),
        display.token(),
        tx,
    );
    // Clear before the answer is applied
    surface.clear();
    display.reset();

    handle.join().unwrap();
    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(outcome.result.is_ok());
    assert!(!display.accept(outcome));
    assert_eq!(display.label, None);
    assert!(surface.is_blank());
}
