//! Profile and notification center.

use bytes::Bytes;
use desk_core::{
    Ack, AvatarUploadResponse, ChangePasswordData, MarkReadRequest, NotificationList,
    NotificationQuery, Result, UnreadCount, UpdateProfileData, UserProfile,
};
use validator::Validate;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

const NOTIFICATION_FAMILIES: [&str; 3] = [
    families::NOTIFICATIONS,
    families::UNREAD_COUNT,
    families::PROFILE,
];

#[derive(Clone)]
pub struct ProfileService {
    client: ApiClient,
    cache: QueryCache,
}

impl ProfileService {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        self.cache
            .get_or_fetch(
                QueryKey::family(families::PROFILE),
                self.client.fetch(ApiRequest::get("/profile/me")),
            )
            .await
    }

    pub async fn update_profile(&self, data: &UpdateProfileData) -> Result<UserProfile> {
        data.validate()?;
        let profile = self
            .client
            .fetch(ApiRequest::patch("/profile/me").json(data)?)
            .await?;
        self.cache.invalidate_family(families::PROFILE).await;
        Ok(profile)
    }

    pub async fn upload_avatar(&self, file_name: &str, bytes: impl Into<Bytes>) -> Result<AvatarUploadResponse> {
        let response = self
            .client
            .fetch(ApiRequest::post("/profile/avatar").file("file", file_name, bytes))
            .await?;
        self.cache.invalidate_family(families::PROFILE).await;
        Ok(response)
    }

    /// Change the password; confirmation and length are checked locally.
    pub async fn change_password(&self, data: &ChangePasswordData) -> Result<Ack> {
        data.validate()?;
        self.client
            .fetch(ApiRequest::post("/profile/change-password").json(data)?)
            .await
    }

    pub async fn notifications(&self, query: &NotificationQuery) -> Result<NotificationList> {
        let key = QueryKey::new(families::NOTIFICATIONS, query.cache_params());
        let request = ApiRequest::get("/profile/notifications").query_struct(query)?;
        self.cache.get_or_fetch(key, self.client.fetch(request)).await
    }

    /// Fresh notification list, for polling.
    pub async fn reload_notifications(&self, query: &NotificationQuery) -> Result<NotificationList> {
        let key = QueryKey::new(families::NOTIFICATIONS, query.cache_params());
        let request = ApiRequest::get("/profile/notifications").query_struct(query)?;
        self.cache.fetch_and_store(key, self.client.fetch(request)).await
    }

    pub async fn unread_count(&self) -> Result<u64> {
        let count: UnreadCount = self
            .cache
            .get_or_fetch(
                QueryKey::family(families::UNREAD_COUNT),
                self.client.fetch(ApiRequest::get("/profile/notifications/unread-count")),
            )
            .await?;
        Ok(count.unread_count)
    }

    /// Fresh unread count, for polling.
    pub async fn reload_unread_count(&self) -> Result<u64> {
        let count: UnreadCount = self
            .cache
            .fetch_and_store(
                QueryKey::family(families::UNREAD_COUNT),
                self.client.fetch(ApiRequest::get("/profile/notifications/unread-count")),
            )
            .await?;
        Ok(count.unread_count)
    }

    pub async fn mark_read(&self, notification_ids: Vec<String>) -> Result<Ack> {
        let request = ApiRequest::post("/profile/notifications/mark-read")
            .json(&MarkReadRequest { notification_ids })?;
        let ack = self.client.fetch(request).await?;
        self.invalidate().await;
        Ok(ack)
    }

    pub async fn mark_all_read(&self) -> Result<Ack> {
        let ack = self
            .client
            .fetch(ApiRequest::post("/profile/notifications/mark-all-read"))
            .await?;
        self.invalidate().await;
        Ok(ack)
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<Ack> {
        let ack = self
            .client
            .fetch(ApiRequest::delete(format!("/profile/notifications/{}", notification_id)))
            .await?;
        self.invalidate().await;
        Ok(ack)
    }

    async fn invalidate(&self) {
        self.cache.invalidate_families(&NOTIFICATION_FAMILIES).await;
    }
}
