//! REST routes under `/api/v1`
//!
//! | Prefix | Router |
//! |---|---|
//! | `/api/v1/tours` | [`tours::router`] |
//! | `/api/v1/users` | [`users::router`] |
//! | `/api/v1/reviews` | [`reviews::router`] |
//! | `/api/v1/bookings` | [`bookings::router`] |
//!
//! Every `/api` request is rate limited per client and stamped with its
//! arrival time. Anything unmatched is answered with a 404 envelope.

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::{
    http::Uri,
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::context::stamp_request_time;
use crate::handlers::{ApiError, ApiErrorKind, ApiOperation};
use crate::middleware::RateLimit;
use crate::repository::DocumentStore;
use crate::state::AppState;

/// API version prefix
pub const API_PREFIX: &str = "/api/v1";

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::new(
        ApiOperation::Get,
        ApiErrorKind::NotFound,
        format!("Can't find {} on the server", uri),
    )
}

/// Assemble every resource router with its state
pub fn api_router<S: DocumentStore>(state: AppState<S>) -> Router {
    let rate_limit = RateLimit::new(&state.config().rate_limit);

    let v1 = Router::new()
        .nest("/tours", tours::router(&state))
        .nest("/users", users::router(&state))
        .nest("/reviews", reviews::router(&state))
        .nest("/bookings", bookings::router(&state));

    Router::new()
        .nest(API_PREFIX, v1)
        .layer(from_fn(stamp_request_time))
        .layer(from_fn_with_state(rate_limit, RateLimit::middleware))
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::PasswordHasher;
    use crate::config::Config;
    use crate::handlers::ResourceHandlers;
    use crate::mail::testing::RecordingMailer;
    use crate::mail::{RESET_SUBJECT, WELCOME_SUBJECT};
    use crate::middleware::TOO_MANY_REQUESTS;
    use crate::payments::testing::FakeGateway;
    use crate::repository::{Document, Filter, MemoryStore, Projection, Update};
    use crate::resources::Tour;

    struct TestApp {
        app: Router,
        store: MemoryStore,
        mailer: Arc<RecordingMailer>,
        gateway: Arc<FakeGateway>,
    }

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
    }

    impl TestApp {
        async fn with(config: Config, mailer: RecordingMailer) -> Self {
            let store = MemoryStore::new();
            let mailer = Arc::new(mailer);
            let gateway = Arc::new(FakeGateway::default());
            let state = AppState::builder(store.clone())
                .config(config)
                .passwords(PasswordHasher::with_params(1024, 1, 1).unwrap())
                .mailer(mailer.clone())
                .payments(gateway.clone())
                .build()
                .await
                .unwrap();
            Self {
                app: api_router(state),
                store,
                mailer,
                gateway,
            }
        }

        async fn new() -> Self {
            Self::with(Config::default(), RecordingMailer::default()).await
        }

        async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let body = match body {
                Some(body) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };

            let response = self.app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            Reply { status, headers, body }
        }

        async fn signup(&self, name: &str, email: &str) -> (String, String) {
            let reply = self
                .send(
                    "POST",
                    "/api/v1/users/signup",
                    None,
                    Some(json!({
                        "name": name,
                        "email": email,
                        "password": "pass1234",
                        "passwordConfirm": "pass1234",
                    })),
                )
                .await;
            assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
            let token = reply.body["token"].as_str().unwrap().to_string();
            let id = reply.body["data"]["user"]["_id"].as_str().unwrap().to_string();
            (token, id)
        }

        async fn set_role(&self, id: &str, role: &str) {
            self.store
                .update_by_id("users", id, &Filter::new(), &Update::new().set("role", json!(role)))
                .await
                .unwrap();
        }

        async fn seed_tours(&self) -> Vec<String> {
            let handlers = ResourceHandlers::<Tour, _>::new(self.store.clone());
            let mut ids = Vec::new();
            for (name, difficulty, price, start) in [
                ("The Forest Hiker", "easy", 397, [-115.570154, 51.178456]),
                ("The Sea Explorer", "medium", 497, [-80.185942, 25.774772]),
                ("The Snow Adventurer", "difficult", 997, [-106.822318, 39.190872]),
                ("The City Wanderer", "easy", 1197, [-73.985141, 40.75894]),
                ("The Park Camper", "easy", 1497, [-118.113491, 34.111745]),
            ] {
                let Value::Object(payload) = json!({
                    "name": name,
                    "duration": 7,
                    "maxGroupSize": 10,
                    "difficulty": difficulty,
                    "price": price,
                    "summary": "A tour",
                    "imageCover": "cover.jpg",
                    "startLocation": {"coordinates": start},
                    "startDates": ["2021-06-19T09:00:00.000Z"],
                }) else {
                    unreachable!()
                };
                let doc = handlers.create(payload).await.unwrap();
                ids.push(doc["_id"].as_str().unwrap().to_string());
            }
            ids
        }

        async fn stored_user(&self, id: &str) -> Document {
            self.store
                .find_by_id("users", id, &Filter::new(), &Projection::default())
                .await
                .unwrap()
                .unwrap()
        }
    }

    fn reset_token(text: &str) -> String {
        let start = text.find("resetPassword/").unwrap() + "resetPassword/".len();
        text[start..].chars().take_while(char::is_ascii_hexdigit).collect()
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_paginates() {
        let app = TestApp::new().await;
        app.seed_tours().await;

        let reply = app
            .send("GET", "/api/v1/tours?difficulty=easy&sort=-price&limit=2&page=1", None, None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "success");
        assert_eq!(reply.body["results"], 2);
        assert!(reply.body["requestedAt"].is_string());
        let prices: Vec<&Value> = reply.body["data"]["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tour| &tour["price"])
            .collect();
        assert_eq!(prices, vec![&json!(1497), &json!(1197)]);
    }

    #[tokio::test]
    async fn test_repeated_whitelisted_filter_matches_any_value() {
        let app = TestApp::new().await;
        app.seed_tours().await;

        let either = app
            .send("GET", "/api/v1/tours?difficulty=easy&difficulty=medium", None, None)
            .await;
        assert_eq!(either.status, StatusCode::OK);
        assert_eq!(either.body["results"], 4);

        let last_sort_wins = app
            .send("GET", "/api/v1/tours?sort=name&sort=-price&limit=1", None, None)
            .await;
        assert_eq!(last_sort_wins.body["data"]["data"][0]["price"], json!(1497));
    }

    #[tokio::test]
    async fn test_top_five_cheap_overrides_caller_params() {
        let app = TestApp::new().await;
        app.seed_tours().await;

        let reply = app.send("GET", "/api/v1/tours/top-5-cheap?limit=1", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["results"], 5);
        let first = &reply.body["data"]["data"][0];
        assert_eq!(first["price"], 397);
        assert!(first.get("maxGroupSize").is_none());
    }

    #[tokio::test]
    async fn test_geo_and_stats_routes() {
        let app = TestApp::new().await;
        app.seed_tours().await;

        let within = app
            .send("GET", "/api/v1/tours/tours-within/400/center/34.111745,-118.113491/unit/mi", None, None)
            .await;
        assert_eq!(within.status, StatusCode::OK);
        assert_eq!(within.body["results"], 1);
        assert_eq!(within.body["data"]["data"][0]["name"], "The Park Camper");

        let distances = app
            .send("GET", "/api/v1/tours/distances/34.111745,-118.113491/unit/km", None, None)
            .await;
        let rows = distances.body["data"]["data"].as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["name"], "The Park Camper");
        assert_eq!(rows[0]["distance"], 0.0);

        let bad = app
            .send("GET", "/api/v1/tours/distances/34.1/unit/km", None, None)
            .await;
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            bad.body["message"],
            "Please provide latitude and longitude in the format lat,lng."
        );

        let stats = app.send("GET", "/api/v1/tours/tour-stats", None, None).await;
        let groups = stats.body["data"]["stats"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0]["_id"], "MEDIUM");
        assert_eq!(groups[2]["_id"], "EASY");
        assert_eq!(groups[2]["numTours"], 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new().await;
        let reply = app.send("GET", "/api/v2/tours", None, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["status"], "fail");
        assert_eq!(reply.body["message"], "Can't find /api/v2/tours on the server");
    }

    #[tokio::test]
    async fn test_rate_limit_on_api() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 2;
        let app = TestApp::with(config, RecordingMailer::default()).await;

        for _ in 0..2 {
            let reply = app.send("GET", "/api/v1/tours", None, None).await;
            assert_eq!(reply.status, StatusCode::OK);
        }
        let reply = app.send("GET", "/api/v1/tours", None, None).await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(reply.body["message"], TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_signup_login_and_me() {
        let app = TestApp::new().await;
        let (token, _) = app.signup("Laura Wilson", "Laura@Example.com").await;

        let welcome = app.mailer.last().unwrap();
        assert_eq!(welcome.subject, WELCOME_SUBJECT);
        assert_eq!(welcome.to, "laura@example.com");

        let wrong = app
            .send(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({"email": "laura@example.com", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["message"], "Incorrect email or password");

        let missing = app
            .send("POST", "/api/v1/users/login", None, Some(json!({"email": "laura@example.com"})))
            .await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);

        let login = app
            .send(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({"email": "laura@example.com", "password": "pass1234"})),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
        let cookie = login.headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));
        assert!(login.body["data"]["user"].get("password").is_none());

        let me = app.send("GET", "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["data"]["data"]["email"], "laura@example.com");
        assert!(me.body["data"]["data"].get("active").is_none());

        let anonymous = app.send("GET", "/api/v1/users/me", None, None).await;
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
        assert_eq!(anonymous.body["message"], crate::auth::NOT_LOGGED_IN);

        let logout = app.send("GET", "/api/v1/users/logout", None, None).await;
        assert!(logout.headers[header::SET_COOKIE].to_str().unwrap().starts_with("jwt=loggedout"));
    }

    #[tokio::test]
    async fn test_roles_guard_tour_writes() {
        let app = TestApp::new().await;
        let (token, id) = app.signup("Lourdes Browning", "lourdes@example.com").await;
        let tour = json!({
            "name": "The Northern Lights",
            "duration": 3,
            "maxGroupSize": 12,
            "difficulty": "easy",
            "price": 1497,
            "summary": "Enjoy the Northern Lights",
            "imageCover": "tour-9-cover.jpg",
        });

        let denied = app.send("POST", "/api/v1/tours", Some(&token), Some(tour.clone())).await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.body["message"], "You do not have permission to perform this action");

        let plan = app.send("GET", "/api/v1/tours/monthly-plan/2021", Some(&token), None).await;
        assert_eq!(plan.status, StatusCode::FORBIDDEN);

        app.set_role(&id, "admin").await;
        let created = app.send("POST", "/api/v1/tours", Some(&token), Some(tour)).await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["data"]["data"]["slug"], "the-northern-lights");
        let tour_id = created.body["data"]["data"]["_id"].as_str().unwrap().to_string();

        let plan = app.send("GET", "/api/v1/tours/monthly-plan/2021", Some(&token), None).await;
        assert_eq!(plan.status, StatusCode::OK);

        let deleted = app
            .send("DELETE", &format!("/api/v1/tours/{}", tour_id), Some(&token), None)
            .await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert_eq!(deleted.body, Value::Null);

        let signup_only = app
            .send("POST", "/api/v1/users", Some(&token), Some(json!({"name": "x"})))
            .await;
        assert_eq!(signup_only.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            signup_only.body["message"],
            "This route is not defined! Please use /signup instead"
        );
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let app = TestApp::new().await;
        let (_, id) = app.signup("Max Smith", "max@example.com").await;

        let unknown = app
            .send("POST", "/api/v1/users/forgotPassword", None, Some(json!({"email": "nobody@example.com"})))
            .await;
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);

        let forgot = app
            .send("POST", "/api/v1/users/forgotPassword", None, Some(json!({"email": "max@example.com"})))
            .await;
        assert_eq!(forgot.status, StatusCode::OK);
        assert_eq!(forgot.body["message"], "Token sent to email!");

        let mail = app.mailer.last().unwrap();
        assert_eq!(mail.subject, RESET_SUBJECT);
        let token = reset_token(&mail.text);
        assert_eq!(token.len(), 64);
        assert_ne!(app.stored_user(&id).await["passwordResetToken"], json!(token));

        let new_password = json!({"password": "newpass123", "passwordConfirm": "newpass123"});
        let reset = app
            .send("PATCH", &format!("/api/v1/users/resetPassword/{}", token), None, Some(new_password.clone()))
            .await;
        assert_eq!(reset.status, StatusCode::OK);
        assert!(reset.body["token"].is_string());

        let stored = app.stored_user(&id).await;
        assert!(stored.get("passwordResetToken").is_none());
        assert!(stored.contains_key("passwordChangedAt"));

        let reused = app
            .send("PATCH", &format!("/api/v1/users/resetPassword/{}", token), None, Some(new_password))
            .await;
        assert_eq!(reused.status, StatusCode::BAD_REQUEST);
        assert_eq!(reused.body["message"], "Token is invalid or has expired");

        let login = app
            .send(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({"email": "max@example.com", "password": "newpass123"})),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failed_reset_mail_clears_token() {
        let app = TestApp::with(Config::default(), RecordingMailer::failing()).await;
        let (_, id) = app.signup("Kate Morrison", "kate@example.com").await;

        let reply = app
            .send("POST", "/api/v1/users/forgotPassword", None, Some(json!({"email": "kate@example.com"})))
            .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body["message"], "There was an error sending the email. Try again later!");

        let stored = app.stored_user(&id).await;
        assert!(stored.get("passwordResetToken").is_none());
        assert!(stored.get("passwordResetExpires").is_none());
    }

    #[tokio::test]
    async fn test_update_my_password_and_stale_token() {
        let app = TestApp::new().await;
        let (token, _) = app.signup("Aarav Lynn", "aarav@example.com").await;

        let wrong = app
            .send(
                "PATCH",
                "/api/v1/users/updateMyPassword",
                Some(&token),
                Some(json!({"passwordCurrent": "nope", "password": "newpass123", "passwordConfirm": "newpass123"})),
            )
            .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["message"], "Your current password is wrong.");

        let updated = app
            .send(
                "PATCH",
                "/api/v1/users/updateMyPassword",
                Some(&token),
                Some(json!({"passwordCurrent": "pass1234", "password": "newpass123", "passwordConfirm": "newpass123"})),
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        let fresh = updated.body["token"].as_str().unwrap();

        let me = app.send("GET", "/api/v1/users/me", Some(fresh), None).await;
        assert_eq!(me.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_me_and_delete_me() {
        let app = TestApp::new().await;
        let (token, id) = app.signup("Jennifer Hardy", "jennifer@example.com").await;

        let password = app
            .send("PATCH", "/api/v1/users/updateMe", Some(&token), Some(json!({"password": "newpass123"})))
            .await;
        assert_eq!(password.status, StatusCode::BAD_REQUEST);

        let updated = app
            .send(
                "PATCH",
                "/api/v1/users/updateMe",
                Some(&token),
                Some(json!({"name": "Jen Hardy", "role": "admin"})),
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["data"]["data"]["name"], "Jen Hardy");
        assert_eq!(updated.body["data"]["data"]["role"], "user");

        let deleted = app.send("DELETE", "/api/v1/users/deleteMe", Some(&token), None).await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert_eq!(app.stored_user(&id).await["active"], false);

        let gone = app.send("GET", "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(gone.status, StatusCode::UNAUTHORIZED);
        assert_eq!(gone.body["message"], "The user belonging to this token does no longer exist.");
    }

    #[tokio::test]
    async fn test_nested_reviews() {
        let app = TestApp::new().await;
        let tours = app.seed_tours().await;
        let (token, user_id) = app.signup("Ben Hadley", "ben@example.com").await;
        let uri = format!("/api/v1/tours/{}/reviews", tours[0]);

        let created = app
            .send("POST", &uri, Some(&token), Some(json!({"review": "Amazing!", "rating": 5})))
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["data"]["data"]["tour"], json!(tours[0]));
        assert_eq!(created.body["data"]["data"]["user"], json!(user_id));

        let duplicate = app
            .send("POST", &uri, Some(&token), Some(json!({"review": "Again", "rating": 4})))
            .await;
        assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

        let listed = app.send("GET", &uri, Some(&token), None).await;
        assert_eq!(listed.body["results"], 1);
        assert_eq!(listed.body["data"]["data"][0]["user"]["name"], "Ben Hadley");

        let other = app
            .send("GET", &format!("/api/v1/tours/{}/reviews", tours[1]), Some(&token), None)
            .await;
        assert_eq!(other.body["results"], 0);
    }

    #[tokio::test]
    async fn test_nested_review_items_stay_under_their_tour() {
        let app = TestApp::new().await;
        let tours = app.seed_tours().await;
        let (token, _) = app.signup("Ben Hadley", "ben@example.com").await;

        let created = app
            .send(
                "POST",
                &format!("/api/v1/tours/{}/reviews", tours[0]),
                Some(&token),
                Some(json!({"review": "Amazing!", "rating": 5})),
            )
            .await;
        let review_id = created.body["data"]["data"]["_id"].as_str().unwrap().to_string();
        let own = format!("/api/v1/tours/{}/reviews/{}", tours[0], review_id);
        let foreign = format!("/api/v1/tours/{}/reviews/{}", tours[1], review_id);

        let found = app.send("GET", &own, Some(&token), None).await;
        assert_eq!(found.status, StatusCode::OK);
        assert_eq!(found.body["data"]["data"]["review"], "Amazing!");

        let missing = app.send("GET", &foreign, Some(&token), None).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let patched = app
            .send("PATCH", &foreign, Some(&token), Some(json!({"rating": 1})))
            .await;
        assert_eq!(patched.status, StatusCode::NOT_FOUND);
        assert_eq!(app.send("DELETE", &foreign, Some(&token), None).await.status, StatusCode::NOT_FOUND);

        let patched = app.send("PATCH", &own, Some(&token), Some(json!({"rating": 3}))).await;
        assert_eq!(patched.status, StatusCode::OK);
        assert_eq!(patched.body["data"]["data"]["rating"], json!(3));
        assert_eq!(app.send("DELETE", &own, Some(&token), None).await.status, StatusCode::NO_CONTENT);
        assert_eq!(app.send("GET", &own, None, None).await.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_review_author_and_tour_come_from_request() {
        let app = TestApp::new().await;
        let tours = app.seed_tours().await;
        let (_, victim_id) = app.signup("Victim Lane", "victim@example.com").await;
        let (token, author_id) = app.signup("Ben Hadley", "ben@example.com").await;

        let nested = app
            .send(
                "POST",
                &format!("/api/v1/tours/{}/reviews", tours[0]),
                Some(&token),
                Some(json!({"review": "Nice", "rating": 4, "user": victim_id, "tour": tours[1]})),
            )
            .await;
        assert_eq!(nested.status, StatusCode::CREATED);
        assert_eq!(nested.body["data"]["data"]["user"], json!(author_id));
        assert_eq!(nested.body["data"]["data"]["tour"], json!(tours[0]));

        let flat = app
            .send(
                "POST",
                "/api/v1/reviews",
                Some(&token),
                Some(json!({"review": "Fine", "rating": 3, "user": victim_id, "tour": tours[2]})),
            )
            .await;
        assert_eq!(flat.status, StatusCode::CREATED);
        assert_eq!(flat.body["data"]["data"]["user"], json!(author_id));
    }

    #[tokio::test]
    async fn test_checkout_session() {
        let app = TestApp::new().await;
        let tours = app.seed_tours().await;
        let (token, _) = app.signup("Cristian Vega", "cristian@example.com").await;

        let reply = app
            .send("GET", &format!("/api/v1/bookings/checkout-session/{}", tours[0]), Some(&token), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "success");
        assert_eq!(reply.body["session"]["id"], "cs_test_123");

        let requests = app.gateway.requests.lock().unwrap();
        assert_eq!(requests[0].amount_cents, 39700);
        assert_eq!(requests[0].customer_email, "cristian@example.com");
        assert_eq!(requests[0].name, "The Forest Hiker Tour");
        drop(requests);

        let bookings = app.send("GET", "/api/v1/bookings", Some(&token), None).await;
        assert_eq!(bookings.status, StatusCode::FORBIDDEN);
    }
}
