pub mod engine;
pub mod parse;
pub mod preprocess;

pub use engine::{Recognizer, TesseractRecognizer, TextKind};
pub use parse::{parse_countdown, parse_label, parse_time};
pub use preprocess::{binarize, crop_region};
