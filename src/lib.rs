pub mod aggregate;
pub mod app;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod rank;
pub mod render;
pub mod snapshot;
pub mod terminal;
pub mod view;
