//! Webhook envelope verification and event classification.

pub mod event;
pub mod headers;
pub mod timestamp;
pub mod verifier;

pub use event::*;
pub use headers::*;
pub use timestamp::*;
pub use verifier::*;
