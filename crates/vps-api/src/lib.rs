pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod orders;
pub mod reaper;
pub mod routes;
pub mod state;
