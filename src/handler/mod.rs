//! Request handler module
//!
//! Method and path checks, then the file gateway that streams from the
//! upstream store.

pub mod gateway;
pub mod path;
pub mod router;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
