//! Truncated state-space construction for CTMC model checking.
//!
//! Builds a finite sparse CTMC from a lazily generated state graph by
//! truncating states whose estimated reachability probability falls below a
//! shrinking threshold κ, redirecting the truncated mass into a synthetic
//! absorbing state, and refining until the (Pmin, Pmax) window closes.

pub mod absorbing;
pub mod errors;
pub mod explorer;
pub mod finalize;
pub mod frontier;
pub mod index_map;
pub mod options;
pub mod records;
pub mod refine;
pub mod results;
pub mod transitions;

pub use absorbing::{AbsorbingState, ABSORBING_INDEX, ABSORBING_VARIABLE};
pub use errors::{BuildError, BuildResult, ERR_GENERAL, ERR_MEMORY_EXCEEDED, ERR_SEVERE};
pub use explorer::{ExploreOutcome, Explorer};
pub use frontier::{Discipline, Frontier};
pub use index_map::StateIndexMap;
pub use options::{BuildConfig, ConfigError};
pub use records::{ProbabilityState, StatePool};
pub use refine::{PropertyPair, Refiner};
pub use results::{write_results, ResultInformation};
pub use transitions::{TransitionAccumulator, TransitionInfo};
