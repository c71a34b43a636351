use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::CancellationNotice;

/// Best-effort dispatch of cancellation notices to the configured webhook.
/// Delivery failures are logged with enough context to retry by hand and
/// never propagate — a lost notification must not undo a reconciliation.
pub struct NotificationGateway {
    client: Client,
    webhook_url: String,
    anon_key: String,
}

impl NotificationGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.cancellation_webhook_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    pub async fn notify_cancellations(&self, notices: &[CancellationNotice]) {
        if notices.is_empty() {
            return;
        }

        let appointment_ids: Vec<_> = notices.iter().map(|n| n.appointment_id).collect();

        if self.webhook_url.is_empty() {
            warn!(
                "Cancellation webhook not configured; {} notices dropped (appointments {:?})",
                notices.len(),
                appointment_ids
            );
            return;
        }

        let body = json!({ "cancellations": notices });

        match self
            .client
            .post(&self.webhook_url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!("Dispatched {} cancellation notices", notices.len());
            }
            Ok(response) => {
                warn!(
                    "Cancellation webhook returned {}; appointments {:?} need manual notification",
                    response.status(),
                    appointment_ids
                );
            }
            Err(err) => {
                warn!(
                    "Cancellation webhook unreachable ({}); appointments {:?} need manual notification",
                    err, appointment_ids
                );
            }
        }
    }
}
