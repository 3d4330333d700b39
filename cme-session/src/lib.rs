//! One user's view of the census map explorer.
//!
//! `Session` is the synchronous state machine (region, dataset, map layer,
//! selection, detail, chart) wired through an explicit `DependencyGraph`.
//! `Dashboard` drives a session from UI events, running fetches as tokio
//! tasks and discarding results of superseded requests.

pub mod driver;
pub mod graph;
pub mod selection;
pub mod state;
pub mod surface;
#[cfg(test)]
mod testing;
pub mod ticket;

pub use driver::{Dashboard, DashboardHandle, Event};
pub use state::{Applied, Node, Notice, Phase, Session, SessionConfig, SessionError};
