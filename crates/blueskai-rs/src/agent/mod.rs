//! Agent runtime: the [`Harness`] agentic loop and the streamed-run layer on
//! top of it.
//!
//! - [`harness::Harness`] is the core tool-use loop. Start here.
//! - [`config::HarnessConfig`] holds the model, round limit and request
//!   options.
//! - [`events`] has the [`EventHandler`] trait and [`HarnessEvent`] enum for
//!   observing the loop, plus [`LoggingHandler`], [`CompositeEventHandler`]
//!   and [`FnEventHandler`].
//! - [`definition::Agent`] describes who runs: name, instructions, model and
//!   tool servers.
//! - [`engine`] runs an [`Agent`] and returns a [`RunStream`] of
//!   [`StreamEvent`]s; [`classify`] turns those into progress lines.

pub mod classify;
pub mod config;
pub mod definition;
pub mod engine;
pub mod events;
pub mod execution;
pub mod harness;
pub mod stream;

pub use classify::{LogSink, RenderSink, RenderedEvent, classify};
pub use config::{DEFAULT_MAX_TURNS, HarnessConfig};
pub use definition::Agent;
pub use engine::{CompletionEngine, HarnessEngine};
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, HarnessEvent, HarnessResult,
    LoggingHandler, NoopHandler,
};
pub use harness::Harness;
pub use stream::{
    ContentPart, RunItem, RunStream, StreamEvent, StreamForwarder, StreamedRun,
    text_message_output,
};
