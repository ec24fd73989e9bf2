pub mod client;
pub mod sse;

pub use client::{ApiClient, SubmittedRun};
pub use marketlens_api;
pub use sse::{FrameStream, SseDecoder, StreamError, frame_stream};
