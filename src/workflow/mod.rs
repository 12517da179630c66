pub mod event_flow;

pub use event_flow::{EventFlow, Flow, SessionState};
