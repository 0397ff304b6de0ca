pub mod api;
pub mod service;

pub use service::OrderService;
