use keel_trap::ContextError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("context error: {0}")]
    Context(#[from] ContextError),

    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("invalid symbol {0:?}, expected name@address")]
    InvalidSymbol(String),

    #[error("invalid backtrace frame {0:?}, expected sp:return")]
    InvalidFrame(String),
}
