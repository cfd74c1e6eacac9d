//! Background workers for processing verified webhooks.

pub mod webhook_processor;

pub use webhook_processor::*;
