//! Payment gateway adapters

mod midtrans;

pub use midtrans::MidtransGateway;
