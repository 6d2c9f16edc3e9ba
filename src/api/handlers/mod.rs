//! REST endpoint handlers.

pub mod products;
pub mod system;

pub use products::list_products;
pub use system::health_handler;
