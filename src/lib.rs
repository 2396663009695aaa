#![warn(missing_docs)]
//! Cirrus is a weather alert monitoring tool: it watches a user's tracked
//! cities, evaluates conditions against per-user thresholds, and delivers
//! alerts over push and a durable email queue.

pub mod cmd;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod providers;
pub mod supervisor;
pub mod test_helpers;
