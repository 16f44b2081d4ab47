//! Admin and payment lifecycle requests

use serde::{Deserialize, Serialize};

use crate::models::order::OrderStatus;

/// Admin status transition: `{status, description?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub description: Option<String>,
}

/// Admin cancel: `{reason?}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Client-initiated payment confirmation: `{payment_intent_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmRequest {
    pub payment_intent_id: String,
}
