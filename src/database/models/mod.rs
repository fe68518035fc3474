pub mod balance;
pub mod employee;
pub mod leave_type;
pub mod macros;
pub mod request;

// Re-export all models for easy importing
pub use balance::*;
pub use employee::*;
pub use leave_type::*;
pub use request::*;
