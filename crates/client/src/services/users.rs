//! User administration.

use desk_core::{
    AuthUser, CreateUserPayload, Error, Result, RoleListResponse, UpdateUserPayload, UserListQuery,
    UserListResponse,
};
use validator::Validate;

use crate::api::ApiClient;
use crate::cache::{families, QueryCache, QueryKey};
use crate::transport::ApiRequest;

#[derive(Clone)]
pub struct UserAdmin {
    client: ApiClient,
    cache: QueryCache,
}

impl UserAdmin {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub async fn list(&self, query: &UserListQuery) -> Result<UserListResponse> {
        let key = QueryKey::new(families::USERS, serde_json::to_string(query)?);
        let request = ApiRequest::get("/users").query_struct(query)?;
        self.cache
            .get_or_fetch(key, self.client.fetch(request))
            .await
    }

    pub async fn roles(&self) -> Result<RoleListResponse> {
        self.cache
            .get_or_fetch(
                QueryKey::new(families::USERS, "roles"),
                self.client.fetch(ApiRequest::get("/users/roles")),
            )
            .await
    }

    pub async fn create(&self, payload: &CreateUserPayload) -> Result<AuthUser> {
        payload.validate()?;
        let user = self
            .client
            .fetch(ApiRequest::post("/users").json(payload)?)
            .await?;
        self.cache.invalidate_family(families::USERS).await;
        Ok(user)
    }

    pub async fn update(&self, user_id: &str, payload: &UpdateUserPayload) -> Result<AuthUser> {
        require_id(user_id)?;
        payload.validate()?;
        let user = self
            .client
            .fetch(ApiRequest::patch(format!("/users/{}", user_id)).json(payload)?)
            .await?;
        self.cache.invalidate_family(families::USERS).await;
        Ok(user)
    }

    pub async fn delete(&self, user_id: &str) -> Result<()> {
        require_id(user_id)?;
        self.client
            .execute(ApiRequest::delete(format!("/users/{}", user_id)))
            .await?;
        self.cache.invalidate_family(families::USERS).await;
        Ok(())
    }
}

fn require_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("user id is required"));
    }
    Ok(())
}
