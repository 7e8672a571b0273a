pub mod auth;
pub mod board_service;
pub mod client_service;
pub mod pipeline_service;
pub mod portfolio_service;
pub mod quote_service;
pub mod tenancy_service;
