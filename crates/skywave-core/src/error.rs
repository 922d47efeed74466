//! Error taxonomy for the pipeline (spec §7).
//!
//! Each variant matches a failure class with its own propagation policy;
//! callers typically convert into `anyhow::Error` with `.into()` once the
//! class has been logged or acted on, the same way `SampleReader` in the
//! teacher crate wraps I/O errors with `.context(...)` rather than
//! threading a bespoke error type through every call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transient i/o error: {0}")]
    TransientIo(#[from] std::io::Error),

    #[error("dsp error: {0}")]
    Dsp(String),

    #[error("decoder error: {0}")]
    Decoder(String),

    #[error("scanner error: {0}")]
    Scanner(String),

    #[error("recording error: {0}")]
    Recording(String),
}
