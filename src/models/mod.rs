// src/models/mod.rs

pub mod competition;
pub mod preferences;
pub mod question;
pub mod quiz_result;
pub mod user;
