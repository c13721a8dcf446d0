//! Session recording
//!
//! Writes screenshots, tool outputs and the conversation history of one
//! session to disk.

mod recorder;

pub use recorder::SessionRecorder;
