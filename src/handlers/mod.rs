// src/handlers/mod.rs

pub mod auth;
pub mod competition;
pub mod preferences;
pub mod profile;
pub mod questions;
pub mod quiz;
pub mod session;
