// Agent OS client - authenticated access to the Agent OS Platform API

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
