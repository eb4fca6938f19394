//! Types shared by the stash client and the relay server.
//!
//! The relay speaks JSON over HTTP: each endpoint is a `POST` with a JSON request body
//! and a JSON response body that carries either the result or an `error` message.
//! Blob payloads travel as standard padded base64.

pub mod endpoints;
mod id;

pub use crate::id::StashId;
