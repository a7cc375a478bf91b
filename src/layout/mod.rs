//! # Layout Module
//!
//! Presentation state derived from engine output that owns no measurement data.
//!
//! This module handles:
//! - Proportional width shares for partition bars
//! - The user-reorderable overview card order and card catalog

pub mod cards;
pub mod partition;
