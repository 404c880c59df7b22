pub mod events;
pub mod runner;
pub mod transcoder;

pub use events::{AgentEvent, ChatMessage, ChatRole};
pub use runner::AgentRunner;
pub use transcoder::StreamTranscoder;
