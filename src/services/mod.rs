// src/services/mod.rs

//! Operations that span the store and the session registry.

pub mod competition;
pub mod navigator;
pub mod preferences;
