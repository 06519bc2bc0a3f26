//! Transport increments in, rendered structure out.

pub mod consumer;
pub mod session;
pub mod sse;

pub use consumer::{CancelHandle, CancelSignal, StreamError, StreamOutcome, cancel_pair, consume};
pub use session::RenderSession;
pub use sse::{DONE_PAYLOAD, SseLineDecoder};
