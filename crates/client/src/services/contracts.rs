//! Contract ledger endpoints and dashboard statistics.

use bytes::Bytes;
use desk_core::{
    Contract, ContractLifecycleDetail, ContractQuery, DashboardStats, Error, ImportContractsResponse,
    OcrResult, Paginated, Result, SidebarSummary,
};
use serde::Serialize;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

const MUTATED_FAMILIES: [&str; 2] = [families::CONTRACTS, families::DASHBOARD];

#[derive(Clone)]
pub struct ContractService {
    client: ApiClient,
    cache: QueryCache,
}

impl ContractService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub async fn list(&self, query: &ContractQuery) -> Result<Paginated<Contract>> {
        let key = QueryKey::new(families::CONTRACTS, query.cache_params());
        let request = ApiRequest::get("/contracts").query_pairs(query.to_pairs());
        self.cache.get_or_fetch(key, self.client.fetch(request)).await
    }

    pub async fn get(&self, id: &str) -> Result<Contract> {
        require_id(id)?;
        let key = QueryKey::new(families::CONTRACTS, format!("id={}", id));
        self.cache
            .get_or_fetch(key, self.client.fetch(ApiRequest::get(format!("/contracts/{}", id))))
            .await
    }

    /// Timeline, attachments and change log for one contract.
    pub async fn lifecycle(&self, id: &str) -> Result<ContractLifecycleDetail> {
        require_id(id)?;
        let key = QueryKey::new(families::CONTRACTS, format!("lifecycle={}", id));
        let request = ApiRequest::get(format!("/contracts/{}/lifecycle", id));
        self.cache.get_or_fetch(key, self.client.fetch(request)).await
    }

    /// Create a contract. Business rejections come back as
    /// `CONTRACT_CREATE` errors carrying the server detail, with no global
    /// notice.
    pub async fn create<T: Serialize>(&self, fields: &T) -> Result<Contract> {
        let contract = self
            .client
            .fetch(ApiRequest::post("/contracts").json(fields)?)
            .await?;
        self.invalidate().await;
        Ok(contract)
    }

    /// Partial update.
    pub async fn update<T: Serialize>(&self, id: &str, fields: &T) -> Result<Contract> {
        require_id(id)?;
        let contract = self
            .client
            .fetch(ApiRequest::patch(format!("/contracts/{}", id)).json(fields)?)
            .await?;
        self.invalidate().await;
        Ok(contract)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require_id(id)?;
        self.client
            .execute(ApiRequest::delete(format!("/contracts/{}", id)))
            .await?;
        self.invalidate().await;
        Ok(())
    }

    /// Spreadsheet export of the filtered ledger.
    pub async fn export(&self, query: &ContractQuery) -> Result<Bytes> {
        self.client
            .fetch_bytes(ApiRequest::get("/contracts/export").query_pairs(query.to_pairs()))
            .await
    }

    /// Blank import template.
    pub async fn template(&self) -> Result<Bytes> {
        self.client
            .fetch_bytes(ApiRequest::get("/contracts/template"))
            .await
    }

    /// Bulk import from a spreadsheet.
    pub async fn import(&self, file_name: &str, bytes: impl Into<Bytes>) -> Result<ImportContractsResponse> {
        let response = self
            .client
            .fetch(ApiRequest::post("/contracts/import").file("file", file_name, bytes))
            .await?;
        self.invalidate().await;
        Ok(response)
    }

    /// Upload a scanned contract for OCR extraction. Nothing is stored
    /// until the extracted fields are submitted through `create`.
    pub async fn upload(&self, file_name: &str, bytes: impl Into<Bytes>) -> Result<OcrResult> {
        self.client
            .fetch(ApiRequest::post("/contracts/upload").file("file", file_name, bytes))
            .await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.cache
            .get_or_fetch(
                QueryKey::new(families::DASHBOARD, "stats"),
                self.client.fetch(ApiRequest::get("/contracts/stats/dashboard")),
            )
            .await
    }

    pub async fn dashboard_summary(&self) -> Result<SidebarSummary> {
        self.cache
            .get_or_fetch(
                QueryKey::new(families::DASHBOARD, "summary"),
                self.client.fetch(ApiRequest::get("/contracts/stats/dashboard/summary")),
            )
            .await
    }

    async fn invalidate(&self) {
        self.cache.invalidate_families(&MUTATED_FAMILIES).await;
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::validation("contract id is required"));
    }
    Ok(())
}
