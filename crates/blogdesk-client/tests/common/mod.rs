//! Common test utilities and fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use blogdesk_client::ApiClient;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, Once};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// Initialize logging for tests
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("blogdesk_client=debug,blogdesk_query=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Client pointed at `server` with the test token
pub fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri()).with_access_token(TOKEN)
}

/// A user record as the API returns it
pub fn user_json(id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("User {id}"),
        "role": "User",
        "email": format!("user{id}@example.com"),
        "status": "active",
    })
}

/// A paged envelope for `results` out of `count`
pub fn envelope(count: usize, results: &[Value], next: bool, previous: bool) -> Value {
    json!({
        "count": count,
        "next": next.then_some("http://api.test/next"),
        "previous": previous.then_some("http://api.test/previous"),
        "results": results,
    })
}

/// Users held by a fake API, served by offset and deleted by id
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<Mutex<Vec<Value>>>,
}

impl UserStore {
    /// Store holding users `1..=count`
    pub fn with_users(count: u64) -> Self {
        Self {
            users: Arc::new(Mutex::new((1..=count).map(user_json).collect())),
        }
    }

    /// Users left
    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Mount list and delete endpoints on `server`
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/users/list_users"))
            .respond_with(ListUsers(self.clone()))
            .mount(server)
            .await;

        Mock::given(method("DELETE"))
            .and(path_regex(r"^/users/delete_user/\d+$"))
            .respond_with(DeleteUser(self.clone()))
            .mount(server)
            .await;
    }
}

struct ListUsers(UserStore);

impl Respond for ListUsers {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.parse::<usize>().ok())
        };
        let offset = param("offset").unwrap_or(0);
        let limit = param("limit").unwrap_or(10);

        let users = self.0.users.lock().unwrap();
        let page: Vec<Value> = users.iter().skip(offset).take(limit).cloned().collect();
        let next = offset + limit < users.len();
        let body = envelope(users.len(), &page, next, offset > 0);
        ResponseTemplate::new(200).set_body_json(body)
    }
}

struct DeleteUser(UserStore);

impl Respond for DeleteUser {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: u64 = request
            .url
            .path_segments()
            .and_then(Iterator::last)
            .and_then(|segment| segment.parse().ok())
            .unwrap();

        let mut users = self.0.users.lock().unwrap();
        let before = users.len();
        users.retain(|user| user["id"] != id);
        if users.len() == before {
            ResponseTemplate::new(404).set_body_json(json!({ "error": "User not found" }))
        } else {
            ResponseTemplate::new(204)
        }
    }
}
