//! Push notification service for Web Push.

use std::sync::Arc;

use apollusia_common::{config::PushConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use validator::Validate;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, URL_SAFE_NO_PAD, VapidSignature,
    VapidSignatureBuilder, WebPushClient, WebPushMessageBuilder,
};

/// Browser push subscription as produced by `PushManager.subscribe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PushSubscription {
    /// Push service endpoint URL
    #[validate(url)]
    pub endpoint: String,
    /// Client keys
    pub keys: PushKeys,
}

/// Client keys of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    /// P256DH public key (base64 URL-safe encoded)
    pub p256dh: String,
    /// Auth secret (base64 URL-safe encoded)
    pub auth: String,
}

impl PushSubscription {
    /// Decode a subscription stored as JSON.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Push notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// URL to open when clicked
    pub url: String,
}

/// Push notification service.
#[derive(Clone)]
pub struct PushNotificationService {
    config: PushConfig,
    client: Arc<IsahcWebPushClient>,
}

impl PushNotificationService {
    /// Create a new push notification service.
    pub fn new(config: PushConfig) -> AppResult<Self> {
        let client = IsahcWebPushClient::new()
            .map_err(|e| AppError::Config(format!("Failed to create push client: {e}")))?;

        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// VAPID signature for one subscription.
    fn sign(&self, info: &SubscriptionInfo) -> AppResult<VapidSignature> {
        let mut signature =
            VapidSignatureBuilder::from_base64(&self.config.private_key, URL_SAFE_NO_PAD, info)
                .map_err(|e| AppError::Config(format!("Invalid VAPID key: {e}")))?;
        signature.add_claim("sub", self.config.subject.as_str());
        signature
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to sign push message: {e}")))
    }

    /// Send a notification to one subscription.
    pub async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> AppResult<()> {
        let content = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))?;

        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let signature = self.sign(&info)?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &content);
        builder.set_vapid_signature(signature);
        let message = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build push message: {e}")))?;

        self.client
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("Push delivery failed: {e}")))?;

        tracing::debug!(endpoint = %subscription.endpoint, "Push notification sent");
        Ok(())
    }
}
