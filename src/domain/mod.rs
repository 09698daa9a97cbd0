pub mod refund;
pub mod user;

pub use refund::*;
pub use user::*;
