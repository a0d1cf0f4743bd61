use tracing::info;

use super::models::{RetentionSetting, RetentionSpec, DEFAULT_RETENTION_DAYS, RETENTION_SETTING_NAME};
use crate::store::{Extension, ExtensionClient, Spec as _, StoreError, StoreResult};

/// Access to the singleton retention setting
#[derive(Debug, Clone)]
pub struct RetentionSettings {
    client: ExtensionClient,
}

impl RetentionSettings {
    pub fn new(client: ExtensionClient) -> Self {
        Self { client }
    }

    /// Configured days, or the default when nothing is stored. Never writes.
    pub async fn days(&self) -> StoreResult<u32> {
        Ok(self
            .client
            .fetch::<RetentionSpec>(RETENTION_SETTING_NAME)
            .await?
            .filter(|setting| !setting.is_deleted())
            .map_or(DEFAULT_RETENTION_DAYS, |setting| setting.spec.days))
    }

    /// Stored setting, created with the default when absent
    pub async fn get_or_create(&self) -> StoreResult<RetentionSetting> {
        if let Some(setting) = self.client.fetch::<RetentionSpec>(RETENTION_SETTING_NAME).await? {
            return Ok(setting);
        }

        let created = self
            .client
            .create(Extension::new(RETENTION_SETTING_NAME, RetentionSpec::default()))
            .await;

        match created {
            Ok(setting) => {
                info!(days = setting.spec.days, "Created default retention setting");
                Ok(setting)
            },
            // lost a creation race; the winner's copy is as good as ours
            Err(StoreError::AlreadyExists { .. }) => self
                .client
                .fetch::<RetentionSpec>(RETENTION_SETTING_NAME)
                .await?
                .ok_or_else(|| StoreError::not_found(RetentionSpec::KIND, RETENTION_SETTING_NAME)),
            Err(e) => Err(e),
        }
    }

    pub async fn set_days(&self, days: u32) -> StoreResult<RetentionSetting> {
        let mut setting = self.get_or_create().await?;
        setting.spec.days = days;
        let updated = self.client.update(setting).await?;
        info!(days, "Retention setting updated");
        Ok(updated)
    }
}
