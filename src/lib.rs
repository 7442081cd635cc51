//! DigitPad: a handwritten-digit drawing pad that sends its contents to a
//! remote recognizer.
//!
//! The pad itself ([`canvas::DrawingSurface`]) is toolkit-independent and can
//! be driven headlessly through [`ops::replay`]. [`app::DigitPadApp`] wraps it
//! in an egui window.

#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use canvas::{DrawingSurface, Point, StrokeStyle};
pub use io::EncodedImage;
pub use ops::predict::{Prediction, PredictionClient, PredictionDisplay};
pub use settings::PadSettings;
