pub mod customer;
pub mod quota;
pub mod reset;

pub use customer::{Customer, CustomerPage};
pub use quota::{is_allowed, QuotaEncoding, QuotaParseError, QuotaValue};
pub use reset::{PendingReset, ResetSnapshot, ResetSource, SentNotification};
