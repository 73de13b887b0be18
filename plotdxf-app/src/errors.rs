use std::path::PathBuf;

use plotdxf_io::IoError;
use thiserror::Error;

use crate::script::ScriptError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Save(#[from] IoError),
    #[error("无法创建输出目录 {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
