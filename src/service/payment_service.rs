use std::sync::Arc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        money, MpesaPayment, NewMpesaPayment, PaymentResolution, PaymentStatus,
        PaymentStatusView, PaymentWithUser, PhoneNumber, Role, User,
    },
    error::{AppError, Result},
    payments::{MobileMoneyGateway, StkCallback, StkPushAccepted, StkPushRequest, StkQueryResult},
    repository::{CartRepository, PaymentRepository, UserRepository},
};

/// What a provider outcome did to the stored record.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// This call moved the record out of `Pending`.
    Applied(MpesaPayment),
    /// The record had already left `Pending`; nothing changed.
    AlreadyResolved(MpesaPayment),
    /// No record for the checkout request id.
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RequeryOutcome {
    StillPending,
    Applied,
    AlreadyResolved,
    /// No local record existed; one was created from the provider's answer.
    Recovered,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequeryResult {
    pub outcome: RequeryOutcome,
    pub payment: Option<MpesaPayment>,
}

pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    cart_repo: Arc<dyn CartRepository>,
    user_repo: Arc<dyn UserRepository>,
    gateway: Option<Arc<dyn MobileMoneyGateway>>,
    restrict_clear_to_success: bool,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        cart_repo: Arc<dyn CartRepository>,
        user_repo: Arc<dyn UserRepository>,
        gateway: Option<Arc<dyn MobileMoneyGateway>>,
        restrict_clear_to_success: bool,
    ) -> Self {
        Self {
            payment_repo,
            cart_repo,
            user_repo,
            gateway,
            restrict_clear_to_success,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn MobileMoneyGateway>> {
        self.gateway.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("M-Pesa payments are not configured".to_string())
        })
    }

    /// Sends an STK push and records it as `Pending`. Returns as soon as the
    /// provider has accepted the request; the outcome arrives later through
    /// `reconcile` or `requery`.
    ///
    /// Without an explicit amount the caller's current cart total is charged.
    pub async fn initiate(
        &self,
        user_id: Option<Uuid>,
        phone: &str,
        amount: Option<Decimal>,
    ) -> Result<StkPushAccepted> {
        let phone = PhoneNumber::parse(phone)?;
        let amount = match (amount, user_id) {
            (Some(amount), _) => amount,
            (None, Some(owner_id)) => {
                let lines = self.cart_repo.list_details(owner_id).await?;
                if lines.is_empty() {
                    return Err(AppError::BadRequest("Cart is empty".to_string()));
                }
                crate::domain::cart_total(&lines)?
            }
            (None, None) => {
                return Err(AppError::BadRequest("Amount is required".to_string()));
            }
        };
        money::validate_charge_amount(amount)?;

        let gateway = self.gateway()?;
        let request = StkPushRequest { phone: phone.clone(), amount };
        let accepted = gateway.stk_push(&request).await.map_err(|e| {
            tracing::warn!("{} rejected STK push to {}: {}", gateway.name(), phone, e);
            e
        })?;

        let record = NewMpesaPayment {
            user_id,
            merchant_request_id: accepted.merchant_request_id.clone(),
            checkout_request_id: accepted.checkout_request_id.clone(),
            response_code: accepted.response_code.clone(),
            response_description: accepted.response_description.clone(),
            customer_message: accepted.customer_message.clone(),
            phone_number: phone.to_string(),
            amount,
            status: PaymentStatus::Pending,
            result_code: None,
        };

        if let Err(e) = self.payment_repo.create(record).await {
            // The customer has been prompted but we hold no record of it.
            tracing::error!(
                "Orphaned STK push: checkout_request_id={} merchant_request_id={} user_id={:?} phone={} amount={} error={}",
                accepted.checkout_request_id,
                accepted.merchant_request_id,
                user_id,
                phone,
                amount,
                e
            );
            return Err(AppError::Internal(format!(
                "Payment {} accepted but not recorded",
                accepted.checkout_request_id
            )));
        }

        tracing::info!(
            "STK push {} pending for {} (KES {})",
            accepted.checkout_request_id,
            phone,
            amount
        );
        Ok(accepted)
    }

    /// Applies a provider callback. Only the first terminal outcome for a
    /// request is recorded; repeats and unknown ids change nothing.
    pub async fn reconcile(&self, callback: StkCallback) -> Result<ReconcileOutcome> {
        self.apply_resolution(callback.into_resolution()).await
    }

    async fn apply_resolution(&self, resolution: PaymentResolution) -> Result<ReconcileOutcome> {
        let applied = self.payment_repo.resolve_pending(&resolution).await?;
        let payment = self
            .payment_repo
            .find_by_checkout_id(&resolution.checkout_request_id)
            .await?;

        let payment = match (applied, payment) {
            (_, None) => {
                tracing::warn!(
                    "Callback for unknown checkout request {}",
                    resolution.checkout_request_id
                );
                return Ok(ReconcileOutcome::Unknown);
            }
            (false, Some(payment)) => {
                tracing::debug!(
                    "Checkout request {} already {}; ignoring result code {}",
                    payment.checkout_request_id,
                    payment.status,
                    resolution.result_code
                );
                return Ok(ReconcileOutcome::AlreadyResolved(payment));
            }
            (true, Some(payment)) => payment,
        };

        tracing::info!(
            "Payment {} is now {} ({})",
            payment.checkout_request_id,
            payment.status,
            resolution.message
        );

        if payment.status == PaymentStatus::Success {
            self.complete_checkout(&payment).await;
        }

        Ok(ReconcileOutcome::Applied(payment))
    }

    /// Empties the payer's cart once the money is in.
    async fn complete_checkout(&self, payment: &MpesaPayment) {
        let Some(user_id) = payment.user_id else {
            return;
        };
        match self.cart_repo.clear(user_id).await {
            Ok(removed) => {
                tracing::debug!("Cleared {} cart lines for {}", removed, user_id);
            }
            Err(e) => {
                tracing::warn!(
                    "Payment {} succeeded but clearing cart for {} failed: {}",
                    payment.checkout_request_id,
                    user_id,
                    e
                );
            }
        }
    }

    /// Read only. Unknown ids report `Pending` with an empty message.
    pub async fn status(&self, checkout_request_id: &str) -> Result<PaymentStatusView> {
        let view = self
            .payment_repo
            .find_by_checkout_id(checkout_request_id)
            .await?
            .map(|payment| PaymentStatusView {
                status: payment.status,
                message: payment.customer_message,
            })
            .unwrap_or_else(PaymentStatusView::pending);

        Ok(view)
    }

    /// Marks a payment as ready to ship. Clearing an already cleared
    /// payment succeeds without changing it.
    pub async fn clear(&self, payment_id: Uuid) -> Result<MpesaPayment> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status == PaymentStatus::Cleared {
            return Ok(payment);
        }

        let clearable = self.clearable_statuses();
        if !clearable.contains(&payment.status) {
            return Err(AppError::Conflict(format!(
                "Cannot clear a {} payment",
                payment.status
            )));
        }

        let transitioned = self
            .payment_repo
            .transition(payment_id, clearable, PaymentStatus::Cleared)
            .await?;

        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if !transitioned && payment.status != PaymentStatus::Cleared {
            // Status moved underneath us to something we may not clear.
            return Err(AppError::Conflict(format!(
                "Cannot clear a {} payment",
                payment.status
            )));
        }

        tracing::info!("Payment {} cleared", payment.id);
        Ok(payment)
    }

    fn clearable_statuses(&self) -> &'static [PaymentStatus] {
        if self.restrict_clear_to_success {
            &[PaymentStatus::Success]
        } else {
            &[PaymentStatus::Pending, PaymentStatus::Success, PaymentStatus::Failed]
        }
    }

    /// Asks the provider for the outcome of a request whose callback never
    /// arrived, and records it the same way a callback would.
    pub async fn requery(&self, checkout_request_id: &str) -> Result<RequeryResult> {
        let gateway = self.gateway()?;
        let existing = self.payment_repo.find_by_checkout_id(checkout_request_id).await?;

        let (merchant_request_id, result_code, result_desc) =
            match gateway.query_status(checkout_request_id).await? {
                StkQueryResult::Processing => {
                    return Ok(RequeryResult {
                        outcome: RequeryOutcome::StillPending,
                        payment: existing,
                    });
                }
                StkQueryResult::Completed {
                    merchant_request_id,
                    result_code,
                    result_desc,
                } => (merchant_request_id, result_code, result_desc),
            };

        if existing.is_none() {
            return self
                .recover_orphan(checkout_request_id, merchant_request_id, result_code, result_desc)
                .await;
        }

        let resolution = PaymentResolution {
            checkout_request_id: checkout_request_id.to_string(),
            result_code,
            message: result_desc,
            mpesa_receipt_number: None,
        };

        let result = match self.apply_resolution(resolution).await? {
            ReconcileOutcome::Applied(payment) => RequeryResult {
                outcome: RequeryOutcome::Applied,
                payment: Some(payment),
            },
            ReconcileOutcome::AlreadyResolved(payment) => RequeryResult {
                outcome: RequeryOutcome::AlreadyResolved,
                payment: Some(payment),
            },
            ReconcileOutcome::Unknown => RequeryResult {
                outcome: RequeryOutcome::StillPending,
                payment: None,
            },
        };
        Ok(result)
    }

    async fn recover_orphan(
        &self,
        checkout_request_id: &str,
        merchant_request_id: String,
        result_code: i64,
        result_desc: String,
    ) -> Result<RequeryResult> {
        let record = NewMpesaPayment {
            user_id: None,
            merchant_request_id,
            checkout_request_id: checkout_request_id.to_string(),
            response_code: "0".to_string(),
            response_description: "Recovered from status query".to_string(),
            customer_message: result_desc,
            phone_number: String::new(),
            amount: Decimal::ZERO,
            status: PaymentStatus::from_result_code(result_code),
            result_code: Some(result_code),
        };

        let payment = match self.payment_repo.create(record).await {
            Ok(payment) => payment,
            // A concurrent callback or requery got there first.
            Err(e) if e.is_unique_violation() => {
                let payment = self.payment_repo.find_by_checkout_id(checkout_request_id).await?;
                return Ok(RequeryResult {
                    outcome: RequeryOutcome::AlreadyResolved,
                    payment,
                });
            }
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Recovered orphaned payment {} as {}",
            payment.checkout_request_id,
            payment.status
        );
        Ok(RequeryResult {
            outcome: RequeryOutcome::Recovered,
            payment: Some(payment),
        })
    }

    /// Newest first, with the paying user's name and email when known.
    pub async fn list_with_users(&self) -> Result<Vec<PaymentWithUser>> {
        self.payment_repo.list_with_users().await
    }

    pub async fn list_customers(&self) -> Result<Vec<User>> {
        self.user_repo.list_by_role(Role::Customer).await
    }
}
