//! Privacy-aware middleware for distributed request processing.
//!
//! Participating nodes declare, per request path, the computation levels
//! they can serve (full answer, raw data, or nothing), and nodes fronting a
//! relational store declare data policies mapping requester identities to
//! per-table column exclusions and value transforms. The middleware
//! resolves these policies to decide whether a request is served locally by
//! the client, forwarded to a remote handler, downgraded from full result
//! to raw data, or refused. Reads against the backing database are
//! rewritten so a requester only ever observes the policy-applied view of
//! a table.

pub mod client;
pub mod db;
pub mod http;
pub mod policy;
pub mod proxy;

pub use crate::http::{Handler, PamRequest, PamResponse, Request, Response, handler_fn};
pub use crate::policy::{ComputationLevel, ProcessingLocation, RequestPolicy};
