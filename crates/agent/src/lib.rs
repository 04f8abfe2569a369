//! Agent-facing action layer for the showroom backend.
//!
//! The agent platform invokes named actions with parameters in one of several
//! envelope shapes and expects a uniform response envelope back. This crate
//! provides:
//!
//! - `envelope` - inbound identity fields and the outbound response envelope
//! - `tools` - the [`tools::Tool`] trait, the four showroom actions, and the
//!   alias-aware [`tools::ToolRegistry`]
//! - `runtime` - [`runtime::ActionRouter`], which extracts parameters, dispatches
//!   to exactly one tool, and renders every outcome (including a panicking
//!   handler) as an envelope
//!
//! The router never decides availability or booking outcomes itself; those come
//! from `showroom-core`.

pub mod envelope;
pub mod runtime;
pub mod tools;

pub use envelope::{ActionRequest, ActionResponse, ErrorBody, MESSAGE_VERSION};
pub use runtime::ActionRouter;
pub use tools::{ActionServices, Tool, ToolContext, ToolRegistry};
