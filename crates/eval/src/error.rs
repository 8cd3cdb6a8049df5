/// Errors that can occur while evaluating a parsed formula.
///
/// Missing input codes are never an error; they read as zero.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Result left the representable decimal range.
    #[error("numeric overflow: {message}")]
    Overflow { message: String },
}
