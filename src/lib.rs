pub mod api;
pub mod clock;
pub mod config;
pub mod export;
pub mod humanize;
pub mod observability;
pub mod pipeline;
pub mod profiles;
