pub mod align;
pub mod clip;
pub mod emitter;
pub mod hatch;
pub mod palette;
pub mod session;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum RenderError {
        #[error("close_group called with no open group")]
        GroupUnderflow,
        #[error("close_group({found:?}) does not match open group {expected:?}")]
        GroupMismatch { expected: String, found: String },
        #[error("draw call issued outside of any group")]
        NoOpenGroup,
        #[error("unsupported text alignment: {0:?}")]
        UnsupportedAlignment(String),
    }
}

pub use emitter::{EntityEmitter, GraphicsState, PrimitiveKind, TextRun};
pub use errors::RenderError;
pub use session::{Canvas, DrawingSession};
