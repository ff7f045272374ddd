//! Infrastructure adapters

pub mod websocket;
