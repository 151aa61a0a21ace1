//! Error kinds of the construction engine and refinement loop.

use stamina_model::{GeneratorError, ModelType, SolveError, StateIndex};
use thiserror::Error;

/// Process exit code for general (recoverable-at-top-level) errors.
pub const ERR_GENERAL: i32 = 1;
/// Process exit code for severe errors (broken engine invariants).
pub const ERR_SEVERE: i32 = 2;
/// Process exit code reported when the kernel kills the process for memory.
pub const ERR_MEMORY_EXCEEDED: i32 = 137;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Only CTMCs (and best-effort DTMCs) are accepted.
    #[error("model type {0} is not supported, only CTMC models are")]
    UnsupportedModel(ModelType),

    /// The augmented `Absorbing` variable is missing or the sink did not land
    /// at index 0.
    #[error("absorbing state setup failed: {0}")]
    AbsorbingSetupFailed(String),

    /// The generator returned no choices for a loaded state while deadlock
    /// fixing is disabled.
    #[error("generator returned no choices for state {index}")]
    EmptyBehavior { index: StateIndex },

    #[error("model has no initial states")]
    EmptyInitial,

    /// Recoverable: logged by the finalizer, which falls back to the identity
    /// remapping.
    #[error("remapping vector covers {remapped} states but {explored} were explored")]
    RemapSizeMismatch { remapped: usize, explored: usize },

    /// Recoverable: logged by the engine, which skips the edge.
    #[error("state {index} appeared as a successor without a metadata record")]
    UnreachablePredecessor { index: StateIndex },

    #[error(transparent)]
    Config(#[from] crate::options::ConfigError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

impl BuildError {
    /// Process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::AbsorbingSetupFailed(_) => ERR_SEVERE,
            _ => ERR_GENERAL,
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
