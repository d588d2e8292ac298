pub mod config;
pub mod humanize;
pub mod ingest;
pub mod observability;
pub mod rotation;
