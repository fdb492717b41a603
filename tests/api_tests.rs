// tests/api_tests.rs

use std::sync::Arc;

use grpify::{
    config::Config,
    routes,
    state::AppState,
    store::{ForumStore, MemoryStore},
    utils::{
        jwt::sign_jwt,
        oauth::{OAuthProvider, OAuthUserInfo},
    },
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the backing store.
async fn spawn_app() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), Config::for_tests(SECRET));

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, store)
}

/// Creates a user the way an OAuth login would and returns a bearer token for it.
async fn login(store: &MemoryStore, name: &str, role: &str) -> (i64, String) {
    let user = store
        .upsert_oauth_user(&OAuthUserInfo {
            provider: OAuthProvider::Spotify,
            provider_id: name.to_string(),
            email: format!("{name}@example.com"),
            name: name.to_string(),
            image_url: Some(format!("https://i.scdn.co/image/{name}")),
        })
        .await
        .expect("Failed to seed user");
    let token = sign_jwt(user.id, role, SECRET, 600).expect("Failed to sign token");
    (user.id, format!("Bearer {token}"))
}

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("Response was not JSON")
}

#[tokio::test]
async fn health_check_404() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn board_management_requires_admin() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, user_token) = login(&store, "plain", "user").await;
    let (_, admin_token) = login(&store, "boss", "admin").await;
    let payload = json!({"name": "general", "description": "chat"});

    let anonymous = client
        .post(format!("{}/api/boards", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let forbidden = client
        .post(format!("{}/api/boards", address))
        .header("Authorization", &user_token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let created = client
        .post(format!("{}/api/boards", address))
        .header("Authorization", &admin_token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);

    let duplicate = client
        .post(format!("{}/api/boards", address))
        .header("Authorization", &admin_token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 409);

    let bad_token = client
        .post(format!("{}/api/boards", address))
        .header("Authorization", "Bearer not-a-jwt")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(bad_token.status().as_u16(), 401);
}

#[tokio::test]
async fn test_comment_thread_flow() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin) = login(&store, "admin", "admin").await;
    let (alice_id, alice) = login(&store, "alice", "user").await;
    let (_, bob) = login(&store, "bob", "user").await;

    // 1. Board and post
    let board = json_body(
        client
            .post(format!("{}/api/boards", address))
            .header("Authorization", &admin)
            .json(&json!({"name": "music"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let board_id = board["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/boards/{}/posts", address, board_id))
        .header("Authorization", &alice)
        .json(&json!({"title": "favourite album", "content": "go"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let post = json_body(response).await;
    let post_id = post["id"].as_i64().unwrap();
    assert_eq!(post["user_id"].as_i64(), Some(alice_id));

    // 2. Writing needs a login
    let anonymous = client
        .post(format!("{}/api/comments", address))
        .json(&json!({"postId": post_id, "content": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let empty = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", &alice)
        .json(&json!({"postId": post_id, "content": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);

    // 3. A, C as roots, then B replying to A
    let mut ids = Vec::new();
    for (token, content, parent) in [(&alice, "A", None), (&bob, "C", None), (&bob, "B", Some(0))] {
        let parent_id = parent.map(|idx: usize| ids[idx]);
        let response = client
            .post(format!("{}/api/comments", address))
            .header("Authorization", token)
            .json(&json!({"postId": post_id, "content": content, "parentCommentId": parent_id}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body = json_body(response).await;
        assert_eq!(body["pageNumber"].as_i64(), Some(0));
        ids.push(body["commentId"].as_i64().unwrap());
    }
    let (a, c, b) = (ids[0], ids[1], ids[2]);

    // 4. Listing is in thread order and paged
    let page = json_body(
        client
            .get(format!("{}/api/comments?postId={}&page=0&size=2", address, post_id))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let listed: Vec<i64> = page["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["commentId"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, vec![a, b]);
    assert_eq!(page["totalElements"].as_i64(), Some(3));
    assert_eq!(page["totalPages"].as_i64(), Some(2));
    assert_eq!(page["content"][1]["parentAuthorName"], "alice");

    let second = json_body(
        client
            .get(format!("{}/api/comments?postId={}&page=1&size=2", address, post_id))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(second["content"][0]["commentId"].as_i64(), Some(c));

    // 5. Only the author edits
    let forbidden = client
        .put(format!("{}/api/comments/{}", address, a))
        .header("Authorization", &bob)
        .json(&json!({"content": "mine now"}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let edited = client
        .put(format!("{}/api/comments/{}", address, a))
        .header("Authorization", &alice)
        .json(&json!({"content": "A, edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(edited.status().as_u16(), 200);
    assert_eq!(json_body(edited).await["commentId"].as_i64(), Some(a));

    // 6. Likes show up for the liker only
    let liked = json_body(
        client
            .post(format!("{}/api/comments/{}/like", address, a))
            .header("Authorization", &bob)
            .json(&json!({"like": true}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(liked["likeCount"].as_i64(), Some(1));
    assert_eq!(liked["isLiked"], true);

    let as_bob = json_body(
        client
            .get(format!("{}/api/comments?postId={}", address, post_id))
            .header("Authorization", &bob)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(as_bob["content"][0]["isLiked"], true);
    assert_eq!(as_bob["content"][0]["content"], "A, edited");

    // 7. Deleting keeps the slot
    let deleted = client
        .delete(format!("{}/api/comments/{}", address, a))
        .header("Authorization", &alice)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let after = json_body(
        client
            .get(format!("{}/api/comments?postId={}", address, post_id))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(after["content"].as_array().unwrap().len(), 3);
    assert_eq!(after["content"][0]["commentId"].as_i64(), Some(a));
    assert!(after["content"][0]["authorId"].is_null());
    assert_eq!(after["content"][0]["likeCount"].as_i64(), Some(0));
}

#[tokio::test]
async fn test_post_views_likes_and_cascade() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin) = login(&store, "admin", "admin").await;
    let (_, alice) = login(&store, "alice", "user").await;

    let board_id = json_body(
        client
            .post(format!("{}/api/boards", address))
            .header("Authorization", &admin)
            .json(&json!({"name": "news"}))
            .send()
            .await
            .unwrap(),
    )
    .await["id"]
        .as_i64()
        .unwrap();
    let post_id = json_body(
        client
            .post(format!("{}/api/boards/{}/posts", address, board_id))
            .header("Authorization", &alice)
            .json(&json!({"title": "headline", "content": "body"}))
            .send()
            .await
            .unwrap(),
    )
    .await["id"]
        .as_i64()
        .unwrap();

    // Explicit strategies
    for strategy in ["naive", "atomic", "pessimistic", "optimistic"] {
        let response = client
            .post(format!("{}/api/posts/{}/views?strategy={}", address, post_id, strategy))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 204, "{strategy}");
    }
    let unknown = client
        .post(format!("{}/api/posts/{}/views?strategy=eventual", address, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 400);

    // Like, then read back
    let liked = json_body(
        client
            .post(format!("{}/api/posts/{}/like", address, post_id))
            .header("Authorization", &alice)
            .json(&json!({"like": true}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(liked["likeCount"].as_i64(), Some(1));

    let post = json_body(
        client
            .get(format!("{}/api/posts/{}", address, post_id))
            .header("Authorization", &alice)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(post["view_count"].as_i64(), Some(4));
    assert_eq!(post["like_count"].as_i64(), Some(1));
    assert_eq!(post["is_liked"], true);
    assert_eq!(store.find_post(post_id).await.unwrap().unwrap().view_count, 5);

    // Board delete hides the post
    let deleted = client
        .delete(format!("{}/api/boards/{}", address, board_id))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let gone = client
        .get(format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn oauth_login_issues_a_usable_token() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin) = login(&store, "admin", "admin").await;
    let user_info = json!({
        "id": "spotify-user-1",
        "email": "listener@example.com",
        "display_name": "Listener",
        "images": [{"url": "https://i.scdn.co/image/listener"}]
    });

    let response = client
        .post(format!("{}/api/auth/oauth/spotify", address))
        .json(&user_info)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = json_body(response).await;
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["user"]["username"], "Listener");
    assert_eq!(body["user"]["role"], "user");
    let user_id = body["user"]["id"].as_i64().unwrap();
    let token = format!("Bearer {}", body["token"].as_str().unwrap());

    // The token is accepted for writes.
    let board_id = json_body(
        client
            .post(format!("{}/api/boards", address))
            .header("Authorization", &admin)
            .json(&json!({"name": "radio"}))
            .send()
            .await
            .unwrap(),
    )
    .await["id"]
        .as_i64()
        .unwrap();
    let created = client
        .post(format!("{}/api/boards/{}/posts", address, board_id))
        .header("Authorization", &token)
        .json(&json!({"title": "now playing", "content": "track"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let post = json_body(created).await;
    assert_eq!(post["user_id"].as_i64(), Some(user_id));

    let commented = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", &token)
        .json(&json!({"postId": post["id"], "content": "nice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(commented.status().as_u16(), 201);

    // Logging in again refreshes the same account.
    let again = json_body(
        client
            .post(format!("{}/api/auth/oauth/spotify", address))
            .json(&json!({"id": "spotify-user-1", "email": "listener@example.com", "display_name": "DJ"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(again["user"]["id"].as_i64(), Some(user_id));
    assert_eq!(again["user"]["username"], "DJ");
}

#[tokio::test]
async fn oauth_login_rejects_unknown_providers_and_missing_fields() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let unknown = client
        .post(format!("{}/api/auth/oauth/myspace", address))
        .json(&json!({"id": "1", "email": "a@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);

    let no_email = client
        .post(format!("{}/api/auth/oauth/spotify", address))
        .json(&json!({"id": "1", "display_name": "nobody"}))
        .send()
        .await
        .unwrap();
    assert_eq!(no_email.status().as_u16(), 400);
}

#[tokio::test]
async fn page_beyond_addressable_range_is_rejected() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!(
            "{}/api/comments?postId=1&page={}&size=20",
            address,
            i64::MAX / 10
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
