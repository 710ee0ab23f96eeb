//! Configuration for ONNX image classifiers.

/// Session settings for an ONNX image classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnnxClassifierConfig {
    /// Graph input fed with the `(1, H, W, 3)` image tensor. Defaults to the
    /// session's first input.
    pub input_name: Option<String>,
    /// Graph output holding the per-class scores. Defaults to the session's
    /// first output.
    pub output_name: Option<String>,
    /// Intra-op thread count for ONNX Runtime; its own default when unset.
    pub intra_threads: Option<usize>,
}
