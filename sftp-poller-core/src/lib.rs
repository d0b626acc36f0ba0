#![doc = "sftp-poller-core: resilience core for the sftp-poller agent."]

//! This crate holds everything that decides *when* and *how often* things are
//! tried: session supervision, the per-file transfer sequence, the polling loop
//! and log rotation. Talking SFTP, reading config files and looking up
//! credentials happen in the `sftp-poller` crate behind the traits in
//! [`contract`].
//!
//! # Usage
//! Build a [`polling::PollingLoop`] from a [`config::PollerConfig`], a
//! [`contract::TransferClient`] and session options, then `run` it with a
//! cancellation token.

pub mod config;
pub mod contract;
pub mod error;
pub mod log_rotation;
pub mod polling;
pub mod supervisor;
pub mod transfer;
