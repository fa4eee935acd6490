//! Write operations that keep cached lists honest
//!
//! Each method issues one request. Only a successful answer publishes the
//! mutation's prefixes on the invalidation bus; a failed write returns its
//! error and leaves the cache as it was. Nothing is patched optimistically.

use crate::api_client::ApiClient;
use crate::mutations::Mutation;
use blogdesk_core::types::{
    BlogTopicPayload, CategoryPayload, SocialMediaPostPayload, SubscriptionPlan, User,
    UserParameters,
};
use blogdesk_core::{Error, Result};
use blogdesk_query::{Invalidates, InvalidationBus, QueryPrefix};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Result of a successful write
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// Response body, `null` when the API sent none
    pub response: Value,
    /// Prefixes published on the bus
    pub invalidated: Vec<QueryPrefix>,
    /// Cached entries marked stale
    pub marked: usize,
}

/// Dashboard writes bound to an invalidation bus
#[derive(Debug, Clone)]
pub struct AdminApi {
    client: ApiClient,
    bus: InvalidationBus,
}

impl AdminApi {
    /// Create an admin API over `client`, publishing on `bus`
    #[must_use]
    pub const fn new(client: ApiClient, bus: InvalidationBus) -> Self {
        Self { client, bus }
    }

    /// The bus successful writes are published on
    #[must_use]
    pub const fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// Run `mutation` with an optional body
    ///
    /// # Errors
    ///
    /// Returns the request's error; nothing is invalidated in that case.
    pub async fn execute<B>(&self, mutation: Mutation, body: Option<&B>) -> Result<MutationOutcome>
    where
        B: Serialize + Sync + ?Sized,
    {
        let (method, path) = mutation.endpoint();
        let response = self.client.send_json(method, &path, body).await;
        self.settle(mutation, response)
    }

    fn settle(&self, mutation: Mutation, response: Result<Value>) -> Result<MutationOutcome> {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(?mutation, error = %e, "Mutation failed, cache untouched");
                return Err(e);
            }
        };

        let invalidated = mutation.invalidates();
        let marked = self.bus.publish(&mutation);
        Ok(MutationOutcome {
            response,
            invalidated,
            marked,
        })
    }

    async fn execute_empty(&self, mutation: Mutation) -> Result<MutationOutcome> {
        self.execute::<Value>(mutation, None).await
    }

    /// Create a user
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_user(&self, user: &User) -> Result<MutationOutcome> {
        self.execute(Mutation::AddUser, Some(user)).await
    }

    /// Replace a user; the record must carry its id
    ///
    /// # Errors
    ///
    /// Returns a validation error for a user without an id, or the
    /// request's error.
    pub async fn edit_user(&self, user: &User) -> Result<MutationOutcome> {
        let id = user
            .id
            .ok_or_else(|| Error::validation("id", "an existing user is required"))?;
        self.execute(Mutation::EditUser { id }, Some(user)).await
    }

    /// Delete a user
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_user(&self, id: u64) -> Result<MutationOutcome> {
        self.execute_empty(Mutation::DeleteUser { id }).await
    }

    /// Push a blog to WordPress
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_blog(&self, id: u64, changes: &Value) -> Result<MutationOutcome> {
        self.execute(Mutation::EditBlog { id }, Some(changes)).await
    }

    /// Schedule a topic
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_topic(&self, topic: &BlogTopicPayload) -> Result<MutationOutcome> {
        self.execute(Mutation::AddTopic { user_id: topic.user }, Some(topic))
            .await
    }

    /// Update a scheduled topic
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_topic(&self, id: u64, topic: &BlogTopicPayload) -> Result<MutationOutcome> {
        self.execute(
            Mutation::EditTopic {
                id,
                user_id: topic.user,
            },
            Some(topic),
        )
        .await
    }

    /// Delete a scheduled topic
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_topic(&self, id: u64) -> Result<MutationOutcome> {
        self.execute_empty(Mutation::DeleteTopic { id }).await
    }

    /// Record a social media post
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_social_post(&self, post: &SocialMediaPostPayload) -> Result<MutationOutcome> {
        self.execute(
            Mutation::AddSocialPost {
                platform: post.platform,
            },
            Some(post),
        )
        .await
    }

    /// Update a social media post
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_social_post(
        &self,
        id: u64,
        post: &SocialMediaPostPayload,
    ) -> Result<MutationOutcome> {
        self.execute(
            Mutation::EditSocialPost {
                id,
                platform: post.platform,
            },
            Some(post),
        )
        .await
    }

    /// Create a category with subcategories
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_category(&self, category: &CategoryPayload) -> Result<MutationOutcome> {
        self.execute(Mutation::AddCategory, Some(category)).await
    }

    /// Replace a category's subcategories
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_category(&self, id: u64, category: &CategoryPayload) -> Result<MutationOutcome> {
        self.execute(Mutation::UpdateCategory { id }, Some(category))
            .await
    }

    /// Create or update a user's generation parameters
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_user_parameters(&self, parameters: &UserParameters) -> Result<MutationOutcome> {
        self.execute(
            Mutation::UpdateUserParameters {
                user_id: parameters.user_id,
            },
            Some(parameters),
        )
        .await
    }

    /// Add a blog setting for `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_blog_setting(&self, user_id: u64, setting: &Value) -> Result<MutationOutcome> {
        self.execute(Mutation::AddBlogSetting { user_id }, Some(setting))
            .await
    }

    /// Update one of `user_id`'s blog settings
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_blog_setting(
        &self,
        id: u64,
        user_id: u64,
        setting: &Value,
    ) -> Result<MutationOutcome> {
        self.execute(Mutation::EditBlogSetting { id, user_id }, Some(setting))
            .await
    }

    /// Delete a blog setting
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_blog_setting(&self, id: u64) -> Result<MutationOutcome> {
        self.execute_empty(Mutation::DeleteBlogSetting { id }).await
    }

    /// Add WordPress credentials for `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_wordpress_key(&self, user_id: u64, keys: &Value) -> Result<MutationOutcome> {
        self.execute(Mutation::AddWordpressKey { user_id }, Some(keys))
            .await
    }

    /// Update one of `user_id`'s WordPress credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_wordpress_key(
        &self,
        id: u64,
        user_id: u64,
        keys: &Value,
    ) -> Result<MutationOutcome> {
        self.execute(Mutation::EditWordpressKey { id, user_id }, Some(keys))
            .await
    }

    /// Delete WordPress credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_wordpress_key(&self, id: u64) -> Result<MutationOutcome> {
        self.execute_empty(Mutation::DeleteWordpressKey { id }).await
    }

    /// Create a subscription plan
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn add_subscription_plan(&self, plan: &SubscriptionPlan) -> Result<MutationOutcome> {
        self.execute(Mutation::AddSubscriptionPlan, Some(plan)).await
    }

    /// Update a subscription plan; the plan must carry its id
    ///
    /// # Errors
    ///
    /// Returns a validation error for a plan without an id, or the
    /// request's error.
    pub async fn edit_subscription_plan(&self, plan: &SubscriptionPlan) -> Result<MutationOutcome> {
        let id = plan
            .id
            .ok_or_else(|| Error::validation("id", "an existing plan is required"))?;
        self.execute(Mutation::EditSubscriptionPlan { id }, Some(plan))
            .await
    }

    /// Upload a CSV of customer reviews for `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn upload_reviews(
        &self,
        user_id: u64,
        file_name: &str,
        csv: Vec<u8>,
    ) -> Result<MutationOutcome> {
        let file = Part::bytes(csv)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| Error::validation("file", e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("user_id", user_id.to_string());

        let mutation = Mutation::UploadReviews { user_id };
        let (method, path) = mutation.endpoint();
        let response = self.client.send_form(method, &path, form).await;
        self.settle(mutation, response)
    }

    /// End the session
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn logout(&self) -> Result<MutationOutcome> {
        self.execute_empty(Mutation::Logout).await
    }
}
