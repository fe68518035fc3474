pub mod employee;
pub mod time_off_balance;
pub mod time_off_request;
pub mod time_off_type;
