//! Core business logic module

pub mod access_point;
pub mod completion;
pub mod connector;
pub mod error;
pub mod listener;
pub mod profile;
pub(crate) mod radio;
pub mod scanner;
pub mod service;
pub mod types;
pub mod wait;
pub mod watcher;
