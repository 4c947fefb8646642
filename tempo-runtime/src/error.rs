#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container `{path}` registered twice under the same parent")]
    DuplicateContainer { path: String },

    #[error("function `{path}` registered twice under the same container")]
    DuplicateFunction { path: String },

    #[error("no container `{path}` to register into -- it must be the root or lie beneath it")]
    MissingContainer { path: String },

    #[error("invalid path segment in `{path}` -- segments must be non-empty and contain no '.'")]
    InvalidPath { path: String },

    #[error("`{path}` was not part of the instrumented candidates")]
    UnknownTarget { path: String },

    #[error("checkpoint for `{path}` is older than its previous checkpoint")]
    CheckpointOutOfOrder { path: String },

    #[error("leave `{path}` without a matching enter (stack underflow)")]
    StackUnderflow { path: String },

    #[error("leave `{found}` while `{expected}` is the innermost open call")]
    StackMismatch { expected: String, found: String },
}
