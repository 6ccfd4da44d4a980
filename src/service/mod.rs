pub mod driver_service;
pub mod proxy;
