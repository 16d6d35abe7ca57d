// Lifecycle exports
pub mod error;
pub mod lifecycle;
pub mod transitions;

pub use error::LifecycleError;
pub use lifecycle::{LifecycleResult, LifecycleSettings, MatchLifecycleManager};
pub use transitions::{advance, transition, InvalidTransition, LifecycleEvent, LifecycleState};
