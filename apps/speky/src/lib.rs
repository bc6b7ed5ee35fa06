//! # speky
//!
//! Library side of the Speky binary: file sources and the query server.
//! The `speky` executable wires these to the command line.

pub mod mcp;
pub mod sources;
