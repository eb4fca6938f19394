//! Building blocks of `stash`: archiving, stream encryption, blob stores and the
//! copy/paste pipeline that chains them.

pub mod archive;
pub mod crypto;
pub mod pipeline;
pub mod storage;
mod util;

pub use stash_protocol::StashId;
