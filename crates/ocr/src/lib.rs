pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{classify, FieldClassifier, INTERACTIVE_SCORE_THRESHOLD};
pub use hash::{sha256_bytes, to_hex};
pub use pipeline::{PipelineError, ScanPipeline, ScanResult};
pub use preprocess::{prepare_frame_from_bytes, PreprocessError};
pub use recognizer::{CommandProvider, JsonFileProvider, MockProvider, OcrError, OcrProvider};
pub use types::{ClassifyError, OcrOutput, RawItem};
