//! Onboarding Task Tracker.
//!
//! Reads go through a per-user cache with a freshness window; the
//! authoritative copy of completion state lives in `user_task_states`.

pub mod cache;
pub mod catalog;
pub mod handlers;
pub mod store;
pub mod tracker;
