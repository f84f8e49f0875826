#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("trap context size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("trap context not aligned to {alignment} bytes")]
    Misaligned { alignment: usize },
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum OpalError {
    #[error("invalid parameter")]
    Parameter,

    #[error("unsupported firmware call")]
    Unsupported,
}
