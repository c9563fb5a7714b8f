//! # pxflood
//!
//! Command-line client that keeps an image painted on a shared
//! flood-drawing canvas. The protocol, tiling and connection pool live in
//! `pxflood-core`; this crate adds configuration and the entry point.

pub mod config;
