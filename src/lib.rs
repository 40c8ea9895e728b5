pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod filters;
pub mod mailer;
pub mod middleware;
pub mod movies;
pub mod permissions;
pub mod state;
pub mod tokens;
pub mod users;
pub mod validator;
