//! Catalogue of list resources served by the dashboard API
//!
//! Every list the dashboard shows is addressed by a resource name. The
//! catalogue maps that name to its endpoint, how long a cached page stays
//! fresh, and which kinds of record it embeds. The embed table is what the
//! mutation table is checked against.

use blogdesk_query::{FetchError, FetchResult, ListParams};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

/// Kinds of record a write can change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    /// Dashboard users and admins
    User,
    /// Published blogs
    Blog,
    /// Scheduled blog topics
    BlogTopic,
    /// Social media posts
    SocialPost,
    /// Categories and subcategories
    Category,
    /// Per-user generation parameters
    UserParameters,
    /// Customer reviews
    Review,
    /// Blog generation settings
    BlogSetting,
    /// WordPress credentials
    WordpressKey,
    /// Subscription plans
    Subscription,
    /// The signed-in session and what hangs off it
    Session,
}

/// How an endpoint shapes its body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A list envelope or a bare array
    List,
    /// A single record, presented as a one-item list
    Record,
}

/// One list resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Name used in query keys and prefixes
    pub name: &'static str,
    /// Endpoint path; `{name}` placeholders take the matching scope value
    pub path: &'static str,
    /// Parameters always sent, ahead of the key's own
    pub fixed_params: &'static [(&'static str, &'static str)],
    /// How long a cached page is served without refetching
    pub stale_time: Duration,
    /// Page size when the caller has no preference
    pub default_limit: Option<u32>,
    /// Response shape
    pub shape: Shape,
    /// Records whose changes make this resource stale
    pub embeds: &'static [Entity],
}

/// Every resource the dashboard lists
pub const RESOURCES: &[ResourceSpec] = &[
    ResourceSpec {
        name: "users",
        path: "/users/list_users",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::User],
    },
    ResourceSpec {
        name: "allActiveUsers",
        path: "/users/list_users",
        fixed_params: &[("all", "true"), ("role", "User"), ("status", "active")],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::User],
    },
    ResourceSpec {
        name: "admins",
        path: "/superadmin/admins/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::User],
    },
    ResourceSpec {
        name: "profile",
        path: "/profile/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::User, Entity::Session],
    },
    ResourceSpec {
        name: "user",
        path: "/users/get_user/{id}",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::User, Entity::Session],
    },
    ResourceSpec {
        name: "totalUsersCount",
        path: "/dashboard/user_count/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::User],
    },
    ResourceSpec {
        name: "blogs",
        path: "/blogs/list_blogs",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::Blog],
    },
    ResourceSpec {
        name: "blog",
        path: "/blogs/get_blog_from_wordpress/{id}",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::Blog],
    },
    ResourceSpec {
        name: "totalBlogsCount",
        path: "/dashboard/blog_count/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::Blog],
    },
    ResourceSpec {
        name: "blogStatistics",
        path: "/blogs/blog_statistics/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::Blog],
    },
    ResourceSpec {
        name: "blogTopics",
        path: "/custom-blog-topics/list_topics/",
        fixed_params: &[],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::BlogTopic],
    },
    ResourceSpec {
        name: "blogTopicsByDate",
        path: "/custom-blog-topics/list_topics/",
        fixed_params: &[],
        stale_time: MINUTE,
        default_limit: Some(100),
        shape: Shape::List,
        embeds: &[Entity::BlogTopic],
    },
    ResourceSpec {
        name: "socialmedia",
        path: "/socialmedia/list_posts/",
        fixed_params: &[],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::SocialPost],
    },
    ResourceSpec {
        name: "socialMediaCount",
        path: "/dashboard/social_media_post_count",
        fixed_params: &[],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::SocialPost],
    },
    ResourceSpec {
        name: "socialMediaStatistics",
        path: "/socialmedia/social_media_statistics/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::SocialPost],
    },
    ResourceSpec {
        name: "categories",
        path: "/categories/all_categories_with_subcategories/",
        fixed_params: &[],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::Category],
    },
    ResourceSpec {
        name: "userReviews",
        path: "/reviews/list_reviews/",
        fixed_params: &[],
        stale_time: FIVE_MINUTES,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::Review],
    },
    ResourceSpec {
        name: "userParameters",
        path: "/userparameter/get_parameter",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::UserParameters],
    },
    ResourceSpec {
        name: "blogSettings",
        path: "/blogsettingviewset/list_blog_setting/{user_id}",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::BlogSetting],
    },
    ResourceSpec {
        name: "wordpress",
        path: "/wordpress/list_wordpress_settings/{user_id}",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::WordpressKey],
    },
    ResourceSpec {
        name: "subscriptionPlans",
        path: "/subscription-plans/list_subscription_plans/",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::Subscription],
    },
    ResourceSpec {
        name: "userSubscription",
        path: "/stripe/check_subscription",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::Subscription, Entity::Session],
    },
    ResourceSpec {
        name: "userPlanDetails",
        path: "/subscription-plans/get_subscription_plan",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::Record,
        embeds: &[Entity::Subscription, Entity::Session],
    },
    ResourceSpec {
        name: "userPaymentHistory",
        path: "/payments/get_user_payment",
        fixed_params: &[],
        stale_time: Duration::ZERO,
        default_limit: None,
        shape: Shape::List,
        embeds: &[Entity::Session],
    },
];

/// Find a resource by name
#[must_use]
pub fn lookup(name: &str) -> Option<&'static ResourceSpec> {
    RESOURCES.iter().find(|spec| spec.name == name)
}

/// Resources whose pages carry `entity`
pub fn embedding(entity: Entity) -> impl Iterator<Item = &'static ResourceSpec> {
    RESOURCES
        .iter()
        .filter(move |spec| spec.embeds.contains(&entity))
}

/// Endpoint path and query parameters for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Path with placeholders filled
    pub path: String,
    /// Remaining parameters, fixed ones first
    pub params: ListParams,
}

impl ResourceSpec {
    /// Fill path placeholders from `params` and keep the rest as the query
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidQuery`] if a placeholder has no
    /// matching parameter.
    pub fn resolve(&self, params: &ListParams) -> FetchResult<ResolvedRequest> {
        let mut path = self.path.to_string();
        let mut query: Vec<(String, String)> = self
            .fixed_params
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();

        for (name, value) in params.pairs() {
            let placeholder = format!("{{{name}}}");
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, value);
            } else {
                query.push((name.clone(), value.clone()));
            }
        }

        if let Some(start) = path.find('{') {
            let missing = path
                .get(start + 1..)
                .and_then(|rest| rest.split_once('}'))
                .map_or("scope", |(name, _)| name);
            return Err(FetchError::InvalidQuery {
                field: missing.to_string(),
                message: format!("{} needs a {missing} scope", self.name),
            });
        }

        Ok(ResolvedRequest {
            path,
            params: query.into_iter().collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use blogdesk_core::SortOrder;
    use blogdesk_query::{ListQueryKey, PageKey, ScopeSegment};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn key(resource: &str) -> ListQueryKey {
        ListQueryKey::new(
            resource,
            PageKey {
                page: 2,
                limit: 10,
                order: SortOrder::Descending,
            },
        )
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = RESOURCES.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), RESOURCES.len());
    }

    #[test]
    fn test_staleness_windows() {
        assert_eq!(lookup("blogTopicsByDate").unwrap().stale_time, MINUTE);
        for name in ["socialmedia", "blogTopics", "categories", "allActiveUsers", "userReviews"] {
            assert_eq!(lookup(name).unwrap().stale_time, FIVE_MINUTES, "{name}");
        }
        assert_eq!(lookup("users").unwrap().stale_time, Duration::ZERO);
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_fixed_params_come_first() {
        let spec = lookup("allActiveUsers").unwrap();
        let resolved = spec.resolve(&ListParams::from_key(&key("allActiveUsers"))).unwrap();
        assert_eq!(resolved.path, "/users/list_users");
        assert_eq!(
            resolved.params.encode().unwrap(),
            "all=true&role=User&status=active&offset=10&limit=10&order=desc"
        );
    }

    #[test]
    fn test_scope_fills_path_placeholder() {
        let spec = lookup("blogSettings").unwrap();
        let key = key("blogSettings").with_scope(ScopeSegment::new("user_id", "42"));
        let resolved = spec.resolve(&ListParams::from_key(&key)).unwrap();
        assert_eq!(resolved.path, "/blogsettingviewset/list_blog_setting/42");
        assert!(resolved.params.get("user_id").is_none());
    }

    #[test]
    fn test_missing_scope_is_rejected() {
        let spec = lookup("wordpress").unwrap();
        let err = spec.resolve(&ListParams::from_key(&key("wordpress"))).unwrap_err();
        assert!(matches!(err, FetchError::InvalidQuery { ref field, .. } if field == "user_id"));
    }

    #[test]
    fn test_embedding() {
        let names: Vec<_> = embedding(Entity::User).map(|spec| spec.name).collect();
        assert_eq!(
            names,
            vec!["users", "allActiveUsers", "admins", "profile", "user", "totalUsersCount"]
        );

        let names: Vec<_> = embedding(Entity::Session).map(|spec| spec.name).collect();
        assert_eq!(
            names,
            vec!["profile", "user", "userSubscription", "userPlanDetails", "userPaymentHistory"]
        );
    }

    #[test]
    fn test_detail_record_takes_id_from_scope() {
        let spec = lookup("blog").unwrap();
        assert_eq!(spec.shape, Shape::Record);
        let key = key("blog").with_scope(ScopeSegment::new("id", "12"));
        let resolved = spec.resolve(&ListParams::from_key(&key)).unwrap();
        assert_eq!(resolved.path, "/blogs/get_blog_from_wordpress/12");
        assert!(resolved.params.get("id").is_none());
    }

    #[test]
    fn test_statistics_period_is_a_query_parameter() {
        let spec = lookup("socialMediaStatistics").unwrap();
        let key = key("socialMediaStatistics")
            .with_scope(ScopeSegment::new("platform", "linkedin"))
            .with_scope(ScopeSegment::new("period", "this_week"));
        let resolved = spec.resolve(&ListParams::from_key(&key)).unwrap();
        assert_eq!(resolved.params.get("platform"), Some("linkedin"));
        assert_eq!(resolved.params.get("period"), Some("this_week"));
    }
}
