//! Connections to the canvas server.

pub mod connection;

pub use connection::{Connection, ConnectionSettings, Endpoint, FloodConnection};
