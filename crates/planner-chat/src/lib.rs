//! Thread persistence and streaming protocol engine for event-planning
//! assistants.

pub mod agent;
pub mod api;
pub mod auth;
pub mod db;
pub mod protocol;
pub mod threads;
