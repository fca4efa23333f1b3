use serde::Serialize;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now, respond};
use crate::core::store::{KvStore, KvStoreExt};
use crate::models::models::{Post, PostView, User};

#[derive(Serialize)]
pub struct SeedReport {
    pub ok: bool,
    pub users: Vec<User>,
    pub posts: Vec<PostView>,
}

/// Delete every key in the store.
pub fn reset_db_data(store: &dyn KvStore) -> anyhow::Result<()> {
    let keys = store.keys()?;
    for key in &keys {
        store.delete(key)?;
    }
    info!(deleted = keys.len(), "store reset");
    Ok(())
}

fn seed_user(store: &dyn KvStore, username: &str) -> anyhow::Result<User> {
    let user = User {
        id: new_id(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        followers: Vec::new(),
        following: Vec::new(),
        created_at: now(),
    };
    store.set_json(&user_key(&user.id), &user)?;
    Ok(user)
}

fn seed_post(store: &dyn KvStore, author: &User, content: &str) -> anyhow::Result<Post> {
    let post = Post {
        id: new_id(),
        author: author.id.clone(),
        content: content.to_string(),
        likes: Vec::new(),
        notified_likers: Vec::new(),
        created_at: now(),
    };
    store.set_json(&post_key(&post.id), &post)?;
    Ok(post)
}

/// Wipe the store and create `alice` and `bob` with one post each.
/// Seeding writes documents directly, so no notifications are emitted.
pub fn init_test_data(store: &dyn KvStore) -> anyhow::Result<SeedReport> {
    reset_db_data(store)?;

    let alice = seed_user(store, "alice")?;
    let bob = seed_user(store, "bob")?;
    store.set_json(USERS_LIST_KEY, &vec![alice.id.clone(), bob.id.clone()])?;

    let p1 = seed_post(store, &alice, "Hello from Alice!")?;
    let p2 = seed_post(store, &bob, "Bob's first post")?;
    store.set_json(FEED_KEY, &vec![p2.id.clone(), p1.id.clone()])?;

    info!("seeded alice and bob");
    Ok(SeedReport {
        ok: true,
        posts: vec![PostView::new(p1, Some(&alice)), PostView::new(p2, Some(&bob))],
        users: vec![alice, bob],
    })
}

// === HTTP Handlers ===

pub fn handle_seed(ctx: &AppContext, _req: Request) -> anyhow::Result<Response> {
    let result = init_test_data(ctx.store()).map_err(ApiError::from);
    respond(200, result)
}
