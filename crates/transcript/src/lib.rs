//! Turns the research workflow's log stream into a transcript.
//!
//! [`TranscriptReducer`] consumes [`LogEvent`](marketlens_core::LogEvent)s and
//! [`StreamFrame`](marketlens_core::StreamFrame)s in delivery order and drives
//! a [`TranscriptView`]. [`TranscriptTree`] is the in-memory view.

pub mod lexicon;
pub mod reducer;
pub mod state;
pub mod status;
pub mod tree;
pub mod view;

pub use reducer::{FrameOutcome, TranscriptReducer};
pub use state::{PlanPhase, RenderedEntry, TranscriptState};
pub use status::RunStatus;
pub use tree::{Node, TranscriptTree};
pub use view::{Entry, EntryId, TranscriptView};
