//! Meetbot - meeting attendance bot fleet.
//!
//! The control plane accepts bot requests over HTTP, admits them
//! against per-tenant daily quotas, places them on a warm pool of
//! pre-provisioned container slots (queueing when saturated), recycles
//! and self-heals slots, and mediates the per-bot lifecycle protocol.
//! The agent runtime runs inside each container and drives one
//! attendance end to end.

pub mod adapters;
pub mod agent;
pub mod api;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
