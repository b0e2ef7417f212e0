pub mod language_model;
pub mod mailer;
pub mod ticket_store;
pub mod user_directory;

pub use language_model::LanguageModelService;
pub use mailer::{DeliveryLedger, MailService};
pub use ticket_store::TicketStore;
pub use user_directory::UserDirectory;
