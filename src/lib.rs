pub mod config;
pub mod error;
pub mod photo;
pub mod session;
pub mod source;
pub mod view;
