use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("failed to serialize {0} entry: {1}")]
    Serialization(&'static str, String),
}
