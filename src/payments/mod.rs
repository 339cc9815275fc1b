//! Mobile-money provider seam. `DarajaClient` talks to Safaricom; tests plug
//! in their own `MobileMoneyGateway`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{domain::PhoneNumber, error::Result};

pub mod callback;
pub mod daraja;

pub use callback::{CallbackAck, StkCallback, StkCallbackEnvelope};
pub use daraja::DarajaClient;

#[derive(Debug, Clone)]
pub struct StkPushRequest {
    pub phone: PhoneNumber,
    pub amount: Decimal,
}

/// Provider acknowledgement of an STK push. Serialized back to the client
/// with Daraja's field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StkPushAccepted {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

impl StkPushAccepted {
    pub fn is_accepted(&self) -> bool {
        self.response_code == "0"
    }
}

/// Provider-side view of an STK push, from the status query API.
#[derive(Debug, Clone, PartialEq)]
pub enum StkQueryResult {
    /// The customer has not answered the prompt yet.
    Processing,
    Completed {
        merchant_request_id: String,
        result_code: i64,
        result_desc: String,
    },
}

#[async_trait]
pub trait MobileMoneyGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Submits a charge prompt to the customer's handset. Returns once the
    /// provider has accepted or rejected the request, not when the customer pays.
    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted>;

    async fn query_status(&self, checkout_request_id: &str) -> Result<StkQueryResult>;
}
