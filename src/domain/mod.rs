pub mod event;
pub mod notification;
pub mod ticket;
pub mod triage;
pub mod user;
