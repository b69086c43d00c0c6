pub mod gateway;
pub mod refund;
pub mod transaction;
