//! Shared Kernel
//!
//! The few pieces of vocabulary every backend crate agrees on:
//! - The unified error type ([`error::app_error::AppError`]) and its HTTP classification
//! - Typed identifier wrappers ([`id::Id`])
//!
//! Anything with domain meaning (accounts, sessions, roles) lives in the owning crate.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
