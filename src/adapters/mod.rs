// Adapters layer: concrete clients for the two remote systems.

pub mod auth;
pub mod board;
pub mod crm;
pub mod http;

pub use board::BoardClient;
pub use crm::CrmClient;
