pub mod user_repo;
pub use user_repo::UserRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod pipeline_repo;
pub use pipeline_repo::PipelineRepository;
pub mod quote_repo;
pub use quote_repo::QuoteRepository;
pub mod portfolio_repo;
pub use portfolio_repo::PortfolioRepository;
