/// API route handlers, one module per resource

pub mod auth;
pub mod companies;
pub mod contracts;
pub mod health;
pub mod users;
