//! Metadata reconciliation - fetches bibliographic metadata from external
//! providers and merges it into the library under user-controlled trust rules.
//!
//! # Architecture
//!
//! The module separates:
//! - **Domain models** (`domain.rs`) - Internal request/result types
//! - **Providers** (`providers/`) - HTTP clients behind the [`MetadataProvider`] trait
//! - **Resolver** (`resolver.rs`) - Pure per-field conflict resolution
//! - **Writer** (`writer.rs`) - Lock-aware persistence of a consolidated result
//! - **Engine** (`engine.rs`) - The sequential batch loop with parallel fan-out
//! - **Tasks** (`tasks.rs`) - Review queue over jobs and proposals
//!
//! A refresh runs in one of two modes: direct apply, where consolidated
//! metadata lands on the books immediately, or review, where each book's
//! result is staged as a proposal for a human decision.
//!
//! # Usage
//!
//! ```ignore
//! use book_minder::reconcile::{ReconciliationEngine, RefreshRequest, RefreshSelection};
//!
//! let request = RefreshRequest {
//!     selection: RefreshSelection::Library { library_id: 1 },
//!     quick: true,
//!     options: Default::default(),
//! };
//! let job_id = engine.refresh(&request, user_id).await?;
//! ```

pub mod backup;
pub mod domain;
pub mod engine;
pub mod notify;
pub mod providers;
pub mod resolver;
pub mod tasks;
pub mod throttle;
pub mod writer;

pub use domain::{
    ConsolidatedMetadata, FieldOptions, LockUpdates, MetadataSnapshot, ProviderChain, ProviderId,
    QueryHints, ReconcileError, RefreshOptions, RefreshRequest, RefreshSelection,
};
pub use engine::ReconciliationEngine;
pub use notify::{Event, EventBus};
pub use providers::{MetadataProvider, ProviderRegistry};
pub use tasks::TaskTracker;
pub use writer::MetadataWriter;
