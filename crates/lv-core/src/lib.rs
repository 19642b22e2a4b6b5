//! Coordination core for linked visualization views
//!
//! This crate provides the event bus, the reactive store and the selection
//! store shared by every view in a session, plus the synchronization
//! protocol views follow to stay consistent without referencing each other.

pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod ids;
pub mod selection;
pub mod session;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod telemetry;

// Re-export commonly used types
pub use config::SessionConfig;
pub use error::{CoreError, Result};
pub use events::{Axis, BrushBounds, BrushPreview, Event, EventBus, Hover, Topic};
pub use filter::{CategoryFilter, FilterState, Filterable, NumericRange};
pub use ids::{Point, SelectionId, SelectionType, SourceId};
pub use selection::{ClearScope, SelectOptions, SelectionStore};
pub use session::Session;
pub use store::ReactiveStore;
pub use subscription::{Subscription, SubscriptionSet};
pub use sync::{InteractionState, SyncManager, ViewLink, ViewSyncSettings};
