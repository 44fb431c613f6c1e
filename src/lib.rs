#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod ranking;
pub mod scheduler;
pub mod store;
pub mod util;
