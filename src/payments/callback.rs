use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::PaymentResolution;

/// Body Daraja POSTs to the callback URL once the customer answers the prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "deserialize_result_code")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

impl StkCallbackEnvelope {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn into_callback(self) -> StkCallback {
        self.body.stk_callback
    }
}

impl StkCallback {
    pub fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    pub fn receipt_number(&self) -> Option<String> {
        match self.metadata_value("MpesaReceiptNumber")? {
            Value::String(receipt) => Some(receipt.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn into_resolution(self) -> PaymentResolution {
        let mpesa_receipt_number = self.receipt_number();
        PaymentResolution {
            checkout_request_id: self.checkout_request_id,
            result_code: self.result_code,
            message: self.result_desc,
            mpesa_receipt_number,
        }
    }
}

/// Acknowledgement Daraja expects; anything else makes it retry.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

/// Result codes arrive as numbers in callbacks and as strings from the query API.
pub fn deserialize_result_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    result_code_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid ResultCode: {}", value)))
}

pub fn result_code_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
