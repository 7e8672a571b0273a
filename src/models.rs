pub mod auth;
pub mod client;
pub mod pipeline;
pub mod portfolio;
pub mod quote;
pub mod tenancy;
