//! Utilities yang dipakai bersama oleh service Big Auto.

pub mod utils;
