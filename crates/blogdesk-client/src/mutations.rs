//! Every write the dashboard performs and the lists it makes stale

use crate::resources::Entity;
use blogdesk_core::types::SocialPlatform;
use blogdesk_query::{Invalidates, QueryPrefix, ScopeSegment};
use reqwest::Method;

/// A write against the dashboard API
///
/// Variants carry the identifiers needed to address the endpoint and to
/// narrow the invalidation to one owner where the lists are scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Create a user
    AddUser,
    /// Replace a user
    EditUser {
        /// User id
        id: u64,
    },
    /// Delete a user
    DeleteUser {
        /// User id
        id: u64,
    },
    /// Push a blog to WordPress
    EditBlog {
        /// Blog id
        id: u64,
    },
    /// Schedule a topic for a user
    AddTopic {
        /// Owning user
        user_id: u64,
    },
    /// Update a scheduled topic
    EditTopic {
        /// Topic id
        id: u64,
        /// Owning user
        user_id: u64,
    },
    /// Delete a scheduled topic
    DeleteTopic {
        /// Topic id
        id: u64,
    },
    /// Record a social media post
    AddSocialPost {
        /// Platform the post belongs to
        platform: SocialPlatform,
    },
    /// Update a social media post
    EditSocialPost {
        /// Post id
        id: u64,
        /// Platform the post belongs to
        platform: SocialPlatform,
    },
    /// Create a category with subcategories
    AddCategory,
    /// Replace a category's subcategories
    UpdateCategory {
        /// Category id
        id: u64,
    },
    /// Create or update a user's generation parameters
    UpdateUserParameters {
        /// Owning user
        user_id: u64,
    },
    /// Add a blog setting
    AddBlogSetting {
        /// Owning user
        user_id: u64,
    },
    /// Update a blog setting
    EditBlogSetting {
        /// Setting id
        id: u64,
        /// Owning user
        user_id: u64,
    },
    /// Delete a blog setting
    DeleteBlogSetting {
        /// Setting id
        id: u64,
    },
    /// Add WordPress credentials
    AddWordpressKey {
        /// Owning user
        user_id: u64,
    },
    /// Update WordPress credentials
    EditWordpressKey {
        /// Credential id
        id: u64,
        /// Owning user
        user_id: u64,
    },
    /// Delete WordPress credentials
    DeleteWordpressKey {
        /// Credential id
        id: u64,
    },
    /// Create a subscription plan
    AddSubscriptionPlan,
    /// Update a subscription plan
    EditSubscriptionPlan {
        /// Plan id
        id: u64,
    },
    /// Import a CSV of customer reviews for a user
    UploadReviews {
        /// Reviewed user
        user_id: u64,
    },
    /// End the session
    Logout,
}

const USER_LISTS: [&str; 6] = [
    "users",
    "allActiveUsers",
    "admins",
    "profile",
    "user",
    "totalUsersCount",
];
const BLOG_LISTS: [&str; 3] = ["blogs", "totalBlogsCount", "blogStatistics"];
const TOPIC_LISTS: [&str; 2] = ["blogTopics", "blogTopicsByDate"];
const PLAN_LISTS: [&str; 3] = ["subscriptionPlans", "userSubscription", "userPlanDetails"];
const SESSION_LISTS: [&str; 5] = [
    "user",
    "profile",
    "userSubscription",
    "userPlanDetails",
    "userPaymentHistory",
];

fn user_scoped(resources: &[&str], user_id: u64) -> Vec<QueryPrefix> {
    resources
        .iter()
        .map(|resource| QueryPrefix::new(*resource).scoped("user_id", user_id.to_string()))
        .collect()
}

fn unscoped(resources: &[&str]) -> Vec<QueryPrefix> {
    resources.iter().copied().map(QueryPrefix::new).collect()
}

impl Mutation {
    /// The kind of record this write changes
    #[must_use]
    pub const fn entity(&self) -> Entity {
        match self {
            Self::AddUser | Self::EditUser { .. } | Self::DeleteUser { .. } => Entity::User,
            Self::EditBlog { .. } => Entity::Blog,
            Self::AddTopic { .. } | Self::EditTopic { .. } | Self::DeleteTopic { .. } => {
                Entity::BlogTopic
            }
            Self::AddSocialPost { .. } | Self::EditSocialPost { .. } => Entity::SocialPost,
            Self::AddCategory | Self::UpdateCategory { .. } => Entity::Category,
            Self::UpdateUserParameters { .. } => Entity::UserParameters,
            Self::AddBlogSetting { .. }
            | Self::EditBlogSetting { .. }
            | Self::DeleteBlogSetting { .. } => Entity::BlogSetting,
            Self::AddWordpressKey { .. }
            | Self::EditWordpressKey { .. }
            | Self::DeleteWordpressKey { .. } => Entity::WordpressKey,
            Self::AddSubscriptionPlan | Self::EditSubscriptionPlan { .. } => Entity::Subscription,
            Self::UploadReviews { .. } => Entity::Review,
            Self::Logout => Entity::Session,
        }
    }

    /// Scope the affected lists are confined to, if any
    #[must_use]
    pub fn scope(&self) -> Option<ScopeSegment> {
        match *self {
            Self::AddTopic { user_id }
            | Self::EditTopic { user_id, .. }
            | Self::UpdateUserParameters { user_id }
            | Self::AddBlogSetting { user_id }
            | Self::EditBlogSetting { user_id, .. }
            | Self::AddWordpressKey { user_id }
            | Self::EditWordpressKey { user_id, .. }
            | Self::UploadReviews { user_id } => {
                Some(ScopeSegment::new("user_id", user_id.to_string()))
            }
            Self::EditBlog { id } => Some(ScopeSegment::new("id", id.to_string())),
            Self::AddSocialPost { platform } | Self::EditSocialPost { platform, .. } => {
                Some(ScopeSegment::new("platform", platform.as_str()))
            }
            _ => None,
        }
    }

    /// HTTP method and path of the request
    #[must_use]
    pub fn endpoint(&self) -> (Method, String) {
        match *self {
            Self::AddUser => (Method::POST, "/users/add_user/".to_string()),
            Self::EditUser { id } => (Method::PUT, format!("/users/update_user/{id}")),
            Self::DeleteUser { id } => (Method::DELETE, format!("users/delete_user/{id}")),
            Self::EditBlog { id } => (Method::PATCH, format!("/blogs/update_blog_to_wordpress/{id}")),
            Self::AddTopic { .. } => (Method::POST, "/custom-blog-topics/add_topic/".to_string()),
            Self::EditTopic { id, .. } => (Method::PATCH, format!("/custom-blog-topics/update/{id}")),
            Self::DeleteTopic { id } => (Method::DELETE, format!("/custom-blog-topics/delete/{id}")),
            Self::AddSocialPost { .. } => (Method::POST, "/socialmedia/add_post/".to_string()),
            Self::EditSocialPost { id, .. } => {
                (Method::PATCH, format!("/socialmedia/update_post/{id}"))
            }
            Self::AddCategory => (
                Method::POST,
                "/categories/add_category_with_subcategories/".to_string(),
            ),
            Self::UpdateCategory { id } => (
                Method::PATCH,
                format!("/categories/update_category_with_subcategories/{id}/"),
            ),
            Self::UpdateUserParameters { .. } => (
                Method::PATCH,
                "/userparameter/update_or_add_parameter/".to_string(),
            ),
            Self::AddBlogSetting { .. } => (
                Method::POST,
                "/blogsettingviewset/add_blog_setting/".to_string(),
            ),
            Self::EditBlogSetting { id, .. } => (
                Method::PATCH,
                format!("/blogsettingviewset/update_blog_setting/{id}"),
            ),
            Self::DeleteBlogSetting { id } => (
                Method::DELETE,
                format!("/blogsettingviewset/delete_blog_setting/{id}"),
            ),
            Self::AddWordpressKey { .. } => {
                (Method::POST, "/wordpress/add_wordpress_setting/".to_string())
            }
            Self::EditWordpressKey { id, .. } => (
                Method::PATCH,
                format!("/wordpress/update_wordpress_setting/{id}/"),
            ),
            Self::DeleteWordpressKey { id } => (
                Method::DELETE,
                format!("/wordpress/delete_wordpress_setting/{id}/"),
            ),
            Self::AddSubscriptionPlan => (
                Method::POST,
                "/subscription-plans/add_subscription_plan/".to_string(),
            ),
            Self::EditSubscriptionPlan { id } => (
                Method::PATCH,
                format!("/subscription-plans/update_subscription_plan/{id}/"),
            ),
            Self::UploadReviews { .. } => (Method::POST, "/reviews/upload_csv/".to_string()),
            Self::Logout => (Method::POST, "/logout/".to_string()),
        }
    }
}

impl Invalidates for Mutation {
    fn invalidates(&self) -> Vec<QueryPrefix> {
        match *self {
            Self::AddUser | Self::EditUser { .. } | Self::DeleteUser { .. } => unscoped(&USER_LISTS),
            Self::EditBlog { id } => {
                let mut prefixes = unscoped(&BLOG_LISTS);
                prefixes.push(QueryPrefix::new("blog").scoped("id", id.to_string()));
                prefixes
            }
            Self::AddTopic { user_id } | Self::EditTopic { user_id, .. } => {
                user_scoped(&TOPIC_LISTS, user_id)
            }
            Self::DeleteTopic { .. } => unscoped(&TOPIC_LISTS),
            Self::AddSocialPost { platform } | Self::EditSocialPost { platform, .. } => vec![
                QueryPrefix::new("socialmedia").scoped("platform", platform.as_str()),
                QueryPrefix::new("socialMediaCount"),
                QueryPrefix::new("socialMediaStatistics").scoped("platform", platform.as_str()),
            ],
            Self::AddCategory | Self::UpdateCategory { .. } => unscoped(&["categories"]),
            Self::UpdateUserParameters { user_id } => {
                let mut prefixes = user_scoped(&["userParameters"], user_id);
                prefixes.extend(user_scoped(&TOPIC_LISTS, user_id));
                prefixes
            }
            Self::AddBlogSetting { user_id } | Self::EditBlogSetting { user_id, .. } => {
                user_scoped(&["blogSettings"], user_id)
            }
            Self::DeleteBlogSetting { .. } => unscoped(&["blogSettings"]),
            Self::AddWordpressKey { user_id } | Self::EditWordpressKey { user_id, .. } => {
                user_scoped(&["wordpress"], user_id)
            }
            Self::DeleteWordpressKey { .. } => unscoped(&["wordpress"]),
            Self::AddSubscriptionPlan | Self::EditSubscriptionPlan { .. } => unscoped(&PLAN_LISTS),
            Self::UploadReviews { user_id } => user_scoped(&["userReviews"], user_id),
            Self::Logout => unscoped(&SESSION_LISTS),
        }
    }
}
