// src/handlers/mod.rs

pub mod auth;
pub mod questions;
pub mod results;
pub mod users;
