pub mod auth;
pub mod clients;
pub mod pipeline;
pub mod portfolio;
pub mod quotes;
pub mod tenancy;
