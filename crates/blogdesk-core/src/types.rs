//! Core data types for the blogdesk dashboard
//!
//! These are the records the list endpoints return and the payloads the
//! mutation endpoints accept. Field names follow the API's wire format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction on the server-defined default sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first
    #[serde(rename = "asc")]
    Ascending,
    /// Newest first
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    /// Wire value of the `order` query parameter
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    /// The opposite direction
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Ok(Self::Ascending),
            "desc" | "descending" | "newest" => Ok(Self::Descending),
            other => Err(crate::Error::validation(
                "order",
                format!("expected asc or desc, got {other:?}"),
            )),
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Tenant administrator
    Admin,
    /// Regular customer account
    User,
    /// Platform operator
    SuperAdmin,
}

impl Role {
    /// Every role, in filter-menu order
    pub const ALL: [Self; 3] = [Self::Admin, Self::User, Self::SuperAdmin];

    /// Wire value used in filters
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
            Self::SuperAdmin => "SuperAdmin",
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Account can log in
    Active,
    /// Account is suspended
    Inactive,
}

impl UserStatus {
    /// Every status, in filter-menu order
    pub const ALL: [Self; 2] = [Self::Active, Self::Inactive];

    /// Wire value used in filters
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// A dashboard user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned identifier, absent on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Display name
    pub name: String,
    /// Role
    pub role: Role,
    /// Login email
    pub email: String,
    /// Company name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

/// A blog post published to a tenant's WordPress site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    /// Identifier
    pub id: u64,
    /// Title
    pub title: String,
    /// Public link
    pub link: String,
    /// Publication date
    pub publish_date: String,
    /// How many times the post was refreshed
    #[serde(default)]
    pub refresh_count: u32,
    /// Owning user
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Blog setting the post was generated from
    #[serde(default)]
    pub setting_id: Option<u64>,
}

/// A scheduled blog topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogTopic {
    /// Identifier
    pub id: u64,
    /// Owning user
    pub user: u64,
    /// Topic title
    pub title: String,
    /// Day the topic is scheduled for
    pub usage_date: NaiveDate,
    /// Primary keyword
    pub primary_keyword: String,
    /// Secondary keyword
    #[serde(default)]
    pub secondary_keyword: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a blog topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogTopicPayload {
    /// Owning user
    pub user: u64,
    /// Topic title
    pub title: String,
    /// Day the topic is scheduled for
    pub usage_date: NaiveDate,
    /// Primary keyword
    pub primary_keyword: String,
    /// Secondary keyword
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_keyword: Option<String>,
}

/// Social media platform a post was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    /// `LinkedIn`
    Linkedin,
    /// Facebook
    Facebook,
    /// X
    X,
    /// Instagram
    Instagram,
}

impl SocialPlatform {
    /// Every platform shown on the dashboard
    pub const ALL: [Self; 4] = [Self::Linkedin, Self::Facebook, Self::X, Self::Instagram];

    /// Wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::Facebook => "facebook",
            Self::X => "x",
            Self::Instagram => "instagram",
        }
    }

    /// Human-readable name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Linkedin => "LinkedIn",
            Self::Facebook => "Facebook",
            Self::X => "X",
            Self::Instagram => "Instagram",
        }
    }
}

impl std::str::FromStr for SocialPlatform {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::validation("platform", format!("unknown platform {s:?}")))
    }
}

/// A social media post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMediaPost {
    /// Identifier
    pub id: u64,
    /// Owning user
    pub user_id: u64,
    /// Owner's name
    #[serde(default)]
    pub username: String,
    /// Platform
    pub platform: SocialPlatform,
    /// Title
    pub title: String,
    /// Public link
    pub link: String,
    /// Publication date
    pub publish_date: String,
}

/// Create/update payload for a social media post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMediaPostPayload {
    /// Title
    pub title: String,
    /// Platform
    pub platform: SocialPlatform,
    /// Public link
    pub link: String,
    /// Publication date
    pub publish_date: NaiveDate,
    /// Owning user
    pub user_id: u64,
}

/// A blog subcategory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    /// Identifier
    pub id: u64,
    /// Name
    pub name: String,
    /// Parent category
    pub category: u64,
}

/// A blog category with its subcategories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier
    pub id: u64,
    /// Name
    pub name: String,
    /// Subcategories
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

/// Create payload for a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPayload {
    /// Name
    pub name: String,
    /// Subcategory names
    pub subcategories: Vec<String>,
}

/// Per-user content generation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserParameters {
    /// User the parameters belong to
    pub user_id: u64,
    /// Posts generated per cycle
    pub number_of_posts: u32,
    /// Target word count
    pub word_count: u32,
    /// Selected subcategory identifiers
    pub subcategories: Vec<u64>,
}

/// A subscription plan offered to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Identifier, absent before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Monthly price as a decimal string
    pub price_per_month: String,
    /// Billing currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Payment provider price identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_id: Option<String>,
    /// Blogs generated per month
    pub max_blogs_per_month: u32,
    /// Regenerations allowed
    pub max_refresh_count: u32,
    /// Billing frequency, e.g. `monthly`
    pub frequency: String,
}

/// A customer review attached to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReview {
    /// Identifier
    pub id: u64,
    /// Reviewer name
    pub name: String,
    /// Reviewer email
    pub email: String,
    /// Review text
    pub review: String,
    /// Rating, 1 to 5
    pub rating: u8,
    /// Reviewed user
    pub user: u64,
}
