//! Connection lifecycle state.

pub mod connection;

pub use connection::ConnectionPhase;
