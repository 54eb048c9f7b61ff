pub mod check;
pub mod error;
