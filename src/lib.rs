//! # OCPP 1.6-J Central System processor
//!
//! Architecture, leaf-first:
//! - `support`: cross-cutting error types and shutdown coordination.
//! - `domain`: charge point, connector and transaction entities; no
//!   knowledge of the bus, the store or HTTP.
//! - `state_store`: the distributed key/value contract (C1) and an
//!   in-process reference implementation.
//! - `bus`: the message bus contract (C2) and an in-process reference
//!   implementation.
//! - `config_registry`: per-key configuration defaults and validation (C3).
//! - `correlation`: the outbound request/response correlator (C4).
//! - `transactions`: the transaction and connector state machine (C5).
//! - `dispatcher`: the inbound protocol dispatcher (C6).
//! - `orchestrator`: the outbound operation orchestrator (C7).
//! - `http`: the operator-facing HTTP façade (C8).
//!
//! `main.rs` is the composition root: it wires these together, nothing
//! more.

pub mod bus;
pub mod config;
pub mod config_registry;
pub mod correlation;
pub mod dispatcher;
pub mod domain;
pub mod http;
pub mod orchestrator;
pub mod state_store;
pub mod support;
pub mod transactions;
