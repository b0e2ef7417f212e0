use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{DeliveryLedger, LanguageModelService, MailService, TicketStore, UserDirectory};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub tickets: Arc<dyn TicketStore>,
    pub users: Arc<dyn UserDirectory>,
    pub deliveries: Arc<dyn DeliveryLedger>,
    pub language_model: Arc<dyn LanguageModelService>,
    pub mailer: Arc<dyn MailService>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserDirectory>,
        deliveries: Arc<dyn DeliveryLedger>,
        language_model: Arc<dyn LanguageModelService>,
        mailer: Arc<dyn MailService>,
    ) -> Self {
        Self {
            config,
            tickets,
            users,
            deliveries,
            language_model,
            mailer,
        }
    }
}
