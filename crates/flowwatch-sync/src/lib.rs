//! Run-state synchronization engine.
//!
//! A [`WatchSession`] owns every piece of mutable watch state and is driven by
//! a single event loop: fetch completions and poll ticks arrive as
//! [`SyncMessage`]s on one channel and are applied one at a time.
//!
//! - [`palette`] maps execution status to a style token.
//! - [`output`] decodes a run's final payload into an [`OutputView`].
//! - [`annotate`] merges the static graph with the latest snapshot.
//! - [`highlight`] is the self-expiring single-node emphasis.
//! - [`store`] holds the fetched summary and snapshot, with stale-response guards.
//! - [`poller`] is the cancellable refresh timer gated by the live flag.

pub mod annotate;
pub mod highlight;
pub mod output;
pub mod palette;
pub mod poller;
pub mod session;
pub mod store;

pub use annotate::{AnnotatedGraph, AnnotatedNode, GraphAnnotator};
pub use highlight::HighlightController;
pub use output::{ExecutionPreview, OutputExtractor, OutputSection, OutputView, SectionKind};
pub use palette::{style_for, Rgb, StyleToken, Tone};
pub use poller::{PollTick, PollingController};
pub use session::{Notice, NoticeLevel, SessionSettings, SyncMessage, WatchSession};
pub use store::RunStateStore;
