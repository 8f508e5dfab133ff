//! Campus announcements.

use desk_core::{
    AnnouncementCreated, AnnouncementDeleted, AnnouncementList, AnnouncementPayload,
    AnnouncementQuery, Error, Result,
};
use validator::Validate;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

#[derive(Clone)]
pub struct AnnouncementService {
    client: ApiClient,
    cache: QueryCache,
}

impl AnnouncementService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub async fn list(&self, query: &AnnouncementQuery) -> Result<AnnouncementList> {
        let key = QueryKey::new(
            families::ANNOUNCEMENTS,
            format!("skip={}&limit={}", query.skip, query.limit),
        );
        let request = ApiRequest::get("/announcements").query_struct(query)?;
        self.cache.get_or_fetch(key, self.client.fetch(request)).await
    }

    pub async fn create(&self, payload: &AnnouncementPayload) -> Result<AnnouncementCreated> {
        payload.validate()?;
        let created = self
            .client
            .fetch(ApiRequest::post("/announcements").json(payload)?)
            .await?;
        self.cache.invalidate_family(families::ANNOUNCEMENTS).await;
        Ok(created)
    }

    pub async fn delete(&self, id: &str) -> Result<AnnouncementDeleted> {
        if id.trim().is_empty() {
            return Err(Error::validation("announcement id is required"));
        }
        let deleted = self
            .client
            .fetch(ApiRequest::delete(format!("/announcements/{}", id)))
            .await?;
        self.cache.invalidate_family(families::ANNOUNCEMENTS).await;
        Ok(deleted)
    }
}
