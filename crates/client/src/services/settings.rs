//! Workflow configuration and the contract field catalog.

use bytes::Bytes;
use desk_core::{FieldConfig, FieldConfigCreate, FieldConfigList, Result, WorkflowConfig, WorkflowConfigUpdate};
use tracing::info;
use validator::Validate;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

/// Stage owners and activity drive the approval stats.
const WORKFLOW_FAMILIES: [&str; 3] = [
    families::SETTINGS,
    families::APPROVAL_STAGE_SUMMARY,
    families::APPROVAL_OVERVIEW,
];

/// New columns change what contract listings return.
const FIELD_FAMILIES: [&str; 2] = [families::SETTINGS, families::CONTRACTS];

pub fn workflow_key() -> QueryKey {
    QueryKey::new(families::SETTINGS, "workflow")
}

pub fn fields_key() -> QueryKey {
    QueryKey::new(families::SETTINGS, "fields")
}

#[derive(Clone)]
pub struct SettingsService {
    client: ApiClient,
    cache: QueryCache,
}

impl SettingsService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub async fn workflow(&self) -> Result<WorkflowConfig> {
        self.cache
            .get_or_fetch(
                workflow_key(),
                self.client.fetch(ApiRequest::get("/settings/workflow")),
            )
            .await
    }

    pub async fn update_workflow(&self, update: &WorkflowConfigUpdate) -> Result<WorkflowConfig> {
        update.validate()?;
        let config: WorkflowConfig = self
            .client
            .fetch(ApiRequest::put("/settings/workflow").json(update)?)
            .await?;
        self.cache.invalidate_families(&WORKFLOW_FAMILIES).await;
        info!(stages = update.stages.len(), "Workflow configuration updated");
        Ok(config)
    }

    pub async fn fields(&self) -> Result<FieldConfigList> {
        self.cache
            .get_or_fetch(
                fields_key(),
                self.client.fetch(ApiRequest::get("/settings/fields")),
            )
            .await
    }

    pub async fn create_field(&self, field: &FieldConfigCreate) -> Result<FieldConfig> {
        field.validate()?;
        let created = self
            .client
            .fetch(ApiRequest::post("/settings/fields").json(field)?)
            .await?;
        self.cache.invalidate_families(&FIELD_FAMILIES).await;
        Ok(created)
    }

    /// Field catalog as a spreadsheet download.
    pub async fn export_fields(&self) -> Result<Bytes> {
        self.client
            .fetch_bytes(ApiRequest::get("/settings/fields/export"))
            .await
    }
}
