//! Request handlers for the agent.

mod websocket;

pub use websocket::*;
