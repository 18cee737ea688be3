pub mod api_router;
pub mod auth;
pub mod bootstrap;
pub mod classify;
pub mod comments;
pub mod config;
pub mod kb;
pub mod notify;
pub mod portal;
pub mod requests;
pub mod shared;
