//! Delivery strategies.
//!
//! Every message is first sent through [`StandardDelivery`]. When that fails,
//! the [`DeliveryPlan`] looks for a fallback strategy whose predicate matches
//! the recipient and, if one exists, the rest of the retries for that message
//! go through it instead of the standard retry path.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use courier_core::{ClientError, MessageBody, Recipient, Session, TaskLimits};

use crate::retry::RetryPolicy;

/// Recipient identifiers made of exactly fifteen ASCII digits.
static FIFTEEN_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{15}$").unwrap());

pub fn is_fifteen_digit_id(recipient: &str) -> bool {
    FIFTEEN_DIGITS.is_match(recipient)
}

/// One way of getting a message to a recipient.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync + 'static {
    /// Short label used in task logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy should take over after a standard failure.
    fn matches(&self, recipient: &str) -> bool;

    fn policy(&self) -> RetryPolicy;

    /// When true, a [`ClientError::Fault`] aborts the session (the task
    /// restarts). When false it is just another failed attempt.
    fn escalates_faults(&self) -> bool {
        true
    }

    /// Make a single delivery round.
    async fn attempt(
        &self,
        session: &dyn Session,
        body: &str,
        recipient: &str,
    ) -> Result<(), ClientError>;
}

/// Plain body to the identifier as given.
pub struct StandardDelivery {
    policy: RetryPolicy,
}

impl StandardDelivery {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl DeliveryStrategy for StandardDelivery {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn matches(&self, _recipient: &str) -> bool {
        true
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(
        &self,
        session: &dyn Session,
        body: &str,
        recipient: &str,
    ) -> Result<(), ClientError> {
        session
            .send(
                &MessageBody::Plain(body.to_string()),
                &Recipient::Text(recipient.to_string()),
            )
            .await
    }
}

/// Fallback for fifteen-digit identifiers.
///
/// Each round tries a composite body addressed to the string identifier,
/// then a plain body addressed to the identifier as a number.
pub struct NumericRecipientDelivery {
    policy: RetryPolicy,
}

impl NumericRecipientDelivery {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl DeliveryStrategy for NumericRecipientDelivery {
    fn name(&self) -> &'static str {
        "15-digit"
    }

    fn matches(&self, recipient: &str) -> bool {
        is_fifteen_digit_id(recipient)
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn escalates_faults(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        session: &dyn Session,
        body: &str,
        recipient: &str,
    ) -> Result<(), ClientError> {
        let composite = MessageBody::Composite {
            body: body.to_string(),
        };
        if session
            .send(&composite, &Recipient::Text(recipient.to_string()))
            .await
            .is_ok()
        {
            return Ok(());
        }

        let numeric: u64 = recipient
            .parse()
            .map_err(|e| ClientError::Rejected(format!("recipient {recipient} is not numeric: {e}")))?;
        session
            .send(&MessageBody::Plain(body.to_string()), &Recipient::Numeric(numeric))
            .await
    }
}

/// The standard strategy plus the fallbacks that may replace it.
pub struct DeliveryPlan {
    standard: Arc<dyn DeliveryStrategy>,
    fallbacks: Vec<Arc<dyn DeliveryStrategy>>,
}

impl DeliveryPlan {
    pub fn new(standard: Arc<dyn DeliveryStrategy>) -> Self {
        Self {
            standard,
            fallbacks: Vec::new(),
        }
    }

    /// Standard delivery with the fifteen-digit fallback, tuned from `limits`.
    pub fn from_limits(limits: &TaskLimits) -> Self {
        Self::new(Arc::new(StandardDelivery::new(RetryPolicy::new(
            limits.max_send_retries,
            limits.send_retry_delay,
        ))))
        .with_fallback(Arc::new(NumericRecipientDelivery::new(RetryPolicy::new(
            limits.max_alternate_retries,
            limits.alternate_retry_delay,
        ))))
    }

    pub fn with_fallback(mut self, strategy: Arc<dyn DeliveryStrategy>) -> Self {
        self.fallbacks.push(strategy);
        self
    }

    pub fn standard(&self) -> &Arc<dyn DeliveryStrategy> {
        &self.standard
    }

    /// First fallback whose predicate matches `recipient`.
    pub fn fallback_for(&self, recipient: &str) -> Option<Arc<dyn DeliveryStrategy>> {
        self.fallbacks
            .iter()
            .find(|strategy| strategy.matches(recipient))
            .cloned()
    }
}

impl Default for DeliveryPlan {
    fn default() -> Self {
        Self::from_limits(&TaskLimits::default())
    }
}
