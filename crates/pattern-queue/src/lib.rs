//! Delayed change queue for the live pattern file
//!
//! Callers queue literal find/replace edits with a delay; a single scheduler
//! loop fires them in (`execute_at`, `id`) order:
//! - Literal substitution when `find` occurs in the file text
//! - Otherwise a bounded call to an injected `MutationCapability`
//! - Every change ends `executed` or `failed`; failures never stop the loop
//!
//! # Example
//!
//! ```rust,ignore
//! use pattern_queue::{AddChangeRequest, PatternConfig, PatternService};
//!
//! let service = PatternService::new(PatternConfig::default());
//! let scheduler = service.start();
//! let resp = service.schedule(
//!     &AddChangeRequest::new("bpm: 30", "bpm: 20")
//!         .with_delay(1.0)
//!         .with_description("slow down"),
//! )?;
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod types;

pub use capability::MutationCapability;
pub use config::PatternConfig;
pub use error::{ConfigError, ExecutionError, FallbackError, MutationError, QueueError};
pub use queue::{default_description, ChangeQueue, Outcome};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::PatternService;
pub use types::{
    AddChangeRequest, AddChangeResponse, CancelResponse, ChangeId, ChangeRecord, ChangeStatus,
    ExecutionMethod, ListResponse,
};
