use reqwest::Client;
use serde_json::json;
use tracing::warn;

/// Mirrors clinic-service records to the legacy clinic directory.
///
/// Delivery is best-effort: a failed mirror is logged and never fails the
/// local write it accompanies.
pub struct ClinicMirror {
    client: Client,
    base_url: Option<String>,
}

impl ClinicMirror {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Fire-and-forget push of one clinic-service record.
    pub fn push(&self, clinic_id: i64, facility_slug: &str, name: &str, description: Option<&str>) {
        let Some(base_url) = self.base_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let body = json!({
            "clinic_id": clinic_id,
            "facility": facility_slug,
            "name": name,
            "description": description,
        });

        tokio::spawn(async move {
            let result = client
                .post(format!("{base_url}/clinic-services"))
                .json(&body)
                .send()
                .await;
            match result {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("Clinic mirror rejected record {clinic_id}: HTTP {}", resp.status());
                }
                Err(e) => {
                    warn!("Clinic mirror push for record {clinic_id} failed: {e}");
                }
                Ok(_) => {}
            }
        });
    }
}
