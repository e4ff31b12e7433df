pub mod accrual;
pub mod errors;
pub mod events;
pub mod fields;
pub mod mining;
pub mod model;
pub mod profile;
pub mod requests;
pub mod session;
pub mod user;
