// src/lib.rs
pub mod config;
pub mod errors;
pub mod models;
pub mod service;
pub mod poller;
pub mod report;
pub mod runner;
pub mod banner;
pub mod api;
