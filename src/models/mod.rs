//! Data models shared across waypost: events, routes, outputs and templates.

pub mod event;
pub mod notification;
pub mod output;
pub mod route;
pub mod template;
