//! In-memory participant cache.
//!
//! This module provides the `ParticipantCache`, a read-through cache over the
//! record store keyed by ticket id. The whole mapping shares one refresh
//! timestamp and is considered stale 30 seconds after the last full reload.
//!
//! - Reloads replace the mapping wholesale and never blank it on failure
//! - Check-ins write to the store first and patch memory only on success

pub mod participant;

pub use participant::{CacheStats, CheckInError, Lookup, ParticipantCache, DEFAULT_TTL};
