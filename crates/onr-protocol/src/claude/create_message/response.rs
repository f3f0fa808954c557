use super::types::BetaMessage;

pub type CreateMessageResponse = BetaMessage;
