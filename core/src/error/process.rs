use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("executable {name} not found in PATH: {reason}")]
    NotFound { name: String, reason: String },
    #[error("spawn failed for {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
}
