//! Refund service: refunds captured gateway payments, keeps the local refund
//! ledger in step with the gateway and mirrors refund state onto the owning
//! transaction.

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod repositories;
pub mod routes;
pub mod services;
