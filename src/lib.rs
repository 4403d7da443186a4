// Configuration
pub mod config;

// Bearer-token user identification
pub mod auth;

// Encrypted credential storage
pub mod credentials;

// Local order mirror
pub mod orders;

// Login flow, session materialization, brokerage gateway
pub mod broker;

// HTTP API
pub mod api;
