//! # diybyt-renderer
//!
//! Everything that turns one program into a published slot file:
//!
//! - [`engine`]: the [`Renderer`] seam and the `pixlet` implementation
//! - [`publish`]: [`SlotTable`], generation-guarded atomic slot writes
//! - [`render_loop`]: the per-program [`RenderLoop`] state machine and its
//!   [`RenderTaskHandle`]

pub mod engine;
pub mod error;
pub mod publish;
pub mod render_loop;

pub use engine::{PixletRenderer, RenderJob, Renderer};
pub use error::RenderError;
pub use publish::{Generation, PublishOutcome, SlotTable};
pub use render_loop::{LoopSettings, LoopState, LoopStats, RenderLoop, RenderTaskHandle};
