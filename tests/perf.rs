use std::sync::Arc;
use std::time::Instant;

use ripple::config::Config;
use ripple::context::AppContext;
use serde_json::{json, Value};

const NUM_USERS: usize = 100;
const POSTS_PER_USER: usize = 2;
const CONCURRENT_LIKERS: usize = 24;

fn spawn_server() -> String {
    let ctx = Arc::new(AppContext::in_memory(Config::default()));
    let (server, addrs) =
        ripple::server::bind(ctx, ("127.0.0.1", 0)).expect("Failed to bind test server");
    tokio::spawn(server);
    format!("http://{}", addrs[0])
}

async fn create_user(client: &reqwest::Client, base_url: &str, username: &str) -> String {
    let user: Value = client
        .post(format!("{}/users", base_url))
        .json(&json!({"username": username, "email": format!("{}@example.com", username)}))
        .send()
        .await
        .expect("Failed to create user")
        .json()
        .await
        .unwrap();
    user["id"].as_str().unwrap().to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_likes_are_not_lost() {
    let base_url = spawn_server();
    let client = reqwest::Client::new();

    let author = create_user(&client, &base_url, "author").await;
    let post: Value = client
        .post(format!("{}/posts", base_url))
        .json(&json!({"author": author, "content": "like me"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_str().unwrap().to_string();

    let mut likers = Vec::new();
    for i in 0..CONCURRENT_LIKERS {
        likers.push(create_user(&client, &base_url, &format!("liker_{}", i)).await);
    }

    let handles: Vec<_> = likers
        .into_iter()
        .map(|liker| {
            let client = client.clone();
            let url = format!("{}/likes", base_url);
            let body = json!({"postId": post_id, "userId": liker});
            tokio::spawn(async move {
                let resp = client.post(url).json(&body).send().await.unwrap();
                assert_eq!(resp.status(), 200);
                let status: Value = resp.json().await.unwrap();
                assert_eq!(status["liked"], true);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let notes: Vec<Value> = client
        .get(format!("{}/notifications/{}", base_url, author))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let like_count = notes.iter().filter(|n| n["type"] == "new_like").count();
    assert_eq!(like_count, CONCURRENT_LIKERS);
    assert_eq!(notes.len(), CONCURRENT_LIKERS + 1);

    let posts: Vec<Value> = client
        .get(format!("{}/posts", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(posts[0]["likes"].as_array().unwrap().len(), CONCURRENT_LIKERS);
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn perf_test_users_with_posts() {
    let base_url = spawn_server();
    let client = reqwest::Client::new();
    let start = Instant::now();

    println!("\n=== Performance Test ===");
    println!("Creating {} users with {} posts each...", NUM_USERS, POSTS_PER_USER);

    let user_creation_start = Instant::now();
    let mut user_ids = Vec::with_capacity(NUM_USERS);
    for i in 0..NUM_USERS {
        user_ids.push(create_user(&client, &base_url, &format!("perf_user_{}", i)).await);
    }
    println!("Created {} users in {:?}", user_ids.len(), user_creation_start.elapsed());

    let post_creation_start = Instant::now();
    let mut posts_created = 0;
    for user_id in &user_ids {
        for j in 0..POSTS_PER_USER {
            let resp = client
                .post(format!("{}/posts", base_url))
                .json(&json!({"author": user_id, "content": format!("Post {} from perf test", j)}))
                .send()
                .await
                .unwrap();
            if resp.status() == 200 {
                posts_created += 1;
            }
        }
    }
    println!("Created {} posts in {:?}", posts_created, post_creation_start.elapsed());

    let fetch_start = Instant::now();
    let mut page = 1;
    let mut fetched = 0;
    loop {
        let posts: Vec<Value> = client
            .get(format!("{}/posts?page={}", base_url, page))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if posts.is_empty() {
            break;
        }
        fetched += posts.len();
        page += 1;
    }
    println!("Fetched {} posts over {} pages in {:?}", fetched, page - 1, fetch_start.elapsed());

    let follow_start = Instant::now();
    for pair in user_ids.windows(2) {
        client
            .post(format!("{}/follow", base_url))
            .json(&json!({"followerId": pair[0], "followeeId": pair[1]}))
            .send()
            .await
            .unwrap();
    }
    println!("Created {} follow edges in {:?}", user_ids.len() - 1, follow_start.elapsed());

    println!("Total time: {:?}", start.elapsed());
    assert_eq!(posts_created, NUM_USERS * POSTS_PER_USER);
    assert_eq!(fetched, posts_created);
}
