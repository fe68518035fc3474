pub mod shared;
pub mod time_off_balances;
pub mod time_off_requests;
pub mod time_off_types;
