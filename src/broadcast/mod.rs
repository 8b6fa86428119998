//! Real-time fan-out of counter changes to live subscriptions.

pub mod event;
pub mod pipeline;

pub use event::{ChangeEvent, DispatchReport};
pub use pipeline::{BroadcastPipeline, PipelineHandle};
