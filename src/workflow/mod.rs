pub mod analyze;
pub mod step;
pub mod ticket;
