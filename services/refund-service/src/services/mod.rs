pub mod dispatcher;
pub mod locator;
pub mod notifier;
pub mod refund_service;
