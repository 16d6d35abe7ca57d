// Service exports
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod store;

pub use memory::{MemoryStore, MemoryTransaction};
pub use notifier::{LogNotifier, Notifier, NotifierError, SlackNotifier};
pub use postgres::{PgMatchStore, PgMatchTransaction};
pub use store::{MatchStore, PendingCursor, StoreError, StoreResult, StoreTransaction};
