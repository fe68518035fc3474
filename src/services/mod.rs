pub mod business_days;
pub mod calendar;
pub mod caller;
pub mod leave_types;
pub mod ledger;
pub mod requests;

pub use calendar::CalendarSync;
pub use caller::Claims;
pub use leave_types::LeaveTypeService;
pub use ledger::BalanceLedger;
pub use requests::RequestEngine;
