//! The term lifecycle and consistency engine.
//!
//! Terms and semesters are time-boxed periods; everything else in the system
//! (organizations, councils, coordinators, documents, rosters, event
//! approvals, notifications) is only valid relative to the currently active
//! period. The modules here keep that constellation consistent:
//!
//! - `engine`: term/semester state transitions and the archive cascade
//! - `reset`: reassigns or clears dependent entities on term transitions
//! - `retention`: purges transient rows owned by archived/missing periods
//! - `notify`: deletes stale notifications and the notification create API
//! - `store`: shared "what is active now" lookups
//! - `trigger`: the login-path hook and the scheduled-task adapter
//! - `handlers`: the HTTP surface over all of the above

pub mod engine;
pub mod handlers;
pub mod notify;
pub mod reset;
pub mod retention;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub mod testing;
