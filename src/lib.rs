pub mod app;
pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod output;
pub mod tools;
