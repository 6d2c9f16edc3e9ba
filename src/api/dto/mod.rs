//! Data Transfer Objects for REST response serialization.

pub mod product_dto;

pub use product_dto::ProductDto;
