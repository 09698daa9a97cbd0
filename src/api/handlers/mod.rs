pub mod iban;
pub mod refunds;
pub mod root;
pub mod tokens;
