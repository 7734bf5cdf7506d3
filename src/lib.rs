pub mod cache;
pub mod clock;
pub mod config;
pub mod effects;
pub mod engine;
pub mod journal;
pub mod limits;
pub mod messages;
pub mod model;
pub mod notify;
pub mod observability;
pub mod repository;
pub mod sweeper;
