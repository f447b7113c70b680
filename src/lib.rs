//! bizmap - A multi-tenant company directory with proximity search
//!
//! Companies register, describe themselves (address, coordinates, weekly
//! business hours, photos) and are found by clients searching around a
//! point, optionally only among those open right now.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
