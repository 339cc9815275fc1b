use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    config::MpesaConfig,
    error::{AppError, Result},
    payments::{
        callback::result_code_from_value, MobileMoneyGateway, StkPushAccepted, StkPushRequest,
        StkQueryResult,
    },
};

/// Daraja keeps answering the query API with this code until the customer responds.
const STILL_PROCESSING: &str = "500.001.1001";

/// Refresh the OAuth token this long before Daraja says it expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > Utc::now()
    }
}

#[derive(Deserialize)]
struct OAuthResponse {
    access_token: String,
    // "3599", as a string
    expires_in: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushPayload<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkQueryPayload<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

#[derive(Deserialize)]
struct DarajaErrorBody {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Safaricom Daraja M-Pesa Express (STK push) client.
pub struct DarajaClient {
    http: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    shortcode: String,
    passkey: String,
    callback_url: String,
    oauth_url: String,
    stk_push_url: String,
    stk_query_url: String,
    account_reference: String,
    transaction_desc: String,
    token: RwLock<Option<AccessToken>>,
}

impl DarajaClient {
    pub fn new(config: &MpesaConfig) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Internal(format!("M-Pesa enabled but {} is missing", name)))
        };

        let timeout = std::time::Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            consumer_key: required(&config.consumer_key, "consumer_key")?,
            consumer_secret: required(&config.consumer_secret, "consumer_secret")?,
            shortcode: required(&config.shortcode, "shortcode")?,
            passkey: required(&config.passkey, "passkey")?,
            callback_url: required(&config.callback_url, "callback_url")?,
            oauth_url: config.oauth_url.clone(),
            stk_push_url: config.stk_push_url.clone(),
            stk_query_url: config.stk_query_url.clone(),
            account_reference: config.account_reference.clone(),
            transaction_desc: config.transaction_desc.clone(),
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let mut cached = self.token.write().await;
        // Another request may have refreshed it while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_access_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_access_token(&self) -> Result<AccessToken> {
        let response = self
            .http
            .get(&self.oauth_url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(AppError::Provider(describe_error(status, &body)));
        }

        let oauth: OAuthResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Provider(format!("Unexpected OAuth response: {}", e)))?;
        let expires_in = oauth
            .expires_in
            .as_ref()
            .and_then(result_code_from_value)
            .unwrap_or(3599);

        tracing::debug!("Obtained M-Pesa access token valid for {}s", expires_in);

        Ok(AccessToken {
            value: oauth.access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// POSTs to Daraja and returns the raw status and body.
    async fn post_json<T: Serialize>(&self, url: &str, payload: &T) -> Result<(reqwest::StatusCode, String)> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let body = response.text().await.map_err(transport_error)?;
        Ok((status, body))
    }
}

#[async_trait]
impl MobileMoneyGateway for DarajaClient {
    fn name(&self) -> &str {
        "M-Pesa Daraja"
    }

    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted> {
        let timestamp = daraja_timestamp(Utc::now());
        let payload = StkPushPayload {
            business_short_code: &self.shortcode,
            password: stk_password(&self.shortcode, &self.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: whole_shillings(request.amount)?,
            party_a: request.phone.as_str(),
            party_b: &self.shortcode,
            phone_number: request.phone.as_str(),
            callback_url: &self.callback_url,
            account_reference: &self.account_reference,
            transaction_desc: &self.transaction_desc,
        };

        let (status, body) = self.post_json(&self.stk_push_url, &payload).await?;
        if !status.is_success() {
            return Err(AppError::Provider(describe_error(status, &body)));
        }

        let accepted: StkPushAccepted = serde_json::from_str(&body)
            .map_err(|e| AppError::Provider(format!("Unexpected STK push response: {}", e)))?;
        if !accepted.is_accepted() {
            return Err(AppError::Provider(format!(
                "{}: {}",
                accepted.response_code, accepted.response_description
            )));
        }

        tracing::info!(
            "STK push accepted for {} (checkout {})",
            request.phone,
            accepted.checkout_request_id
        );
        Ok(accepted)
    }

    async fn query_status(&self, checkout_request_id: &str) -> Result<StkQueryResult> {
        let timestamp = daraja_timestamp(Utc::now());
        let payload = StkQueryPayload {
            business_short_code: &self.shortcode,
            password: stk_password(&self.shortcode, &self.passkey, &timestamp),
            timestamp,
            checkout_request_id,
        };

        let (status, body) = self.post_json(&self.stk_query_url, &payload).await?;
        parse_query_response(status, &body)
    }
}

fn parse_query_response(status: reqwest::StatusCode, body: &str) -> Result<StkQueryResult> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| AppError::Provider(describe_error(status, body)))?;

    if let Some(result_code) = value.get("ResultCode").and_then(result_code_from_value) {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        return Ok(StkQueryResult::Completed {
            merchant_request_id: text("MerchantRequestID"),
            result_code,
            result_desc: text("ResultDesc"),
        });
    }

    if value.get("errorCode").and_then(Value::as_str) == Some(STILL_PROCESSING) {
        return Ok(StkQueryResult::Processing);
    }

    Err(AppError::Provider(describe_error(status, body)))
}

/// `YYYYMMDDHHmmss` in East Africa Time (UTC+3), as Daraja expects.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    (now.naive_utc() + Duration::hours(3))
        .format("%Y%m%d%H%M%S")
        .to_string()
}

/// base64(shortcode + passkey + timestamp)
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Daraja only charges whole shillings; fractions round up.
pub fn whole_shillings(amount: Decimal) -> Result<u64> {
    amount
        .ceil()
        .to_u64()
        .filter(|shillings| *shillings > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Amount {} cannot be charged", amount)))
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Provider("M-Pesa request timed out".to_string())
    } else {
        AppError::Provider(format!("M-Pesa request failed: {}", err))
    }
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<DarajaErrorBody>(body) {
        Ok(DarajaErrorBody {
            error_code: Some(code),
            error_message,
        }) => format!("{}: {}", code, error_message.unwrap_or_default()),
        _ => {
            let snippet: String = body.chars().take(200).collect();
            format!("HTTP {}: {}", status.as_u16(), snippet)
        }
    }
}
