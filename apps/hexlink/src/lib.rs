//! # Hexlink application library
//!
//! The HTTP API and CLI of the Hexlink binary, exposed as a library so
//! integration tests can build the router without a listening socket.

pub mod api;
pub mod cli;
