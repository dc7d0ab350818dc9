//! Server-side rendering support: views, flash feedback and the message bundle.

pub mod flash;
pub mod messages;
pub mod views;
