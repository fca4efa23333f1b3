//! Social feed backend: users, posts, comments, likes and follows, with a
//! notification appended for the recipient of each interesting action.
//!
//! The same [`route`] table is served as a Spin HTTP component (backed by the
//! Spin key-value store) and, on native targets, by an actix-web server
//! backed by an in-memory store (see [`server`]).

use spin_sdk::http::{Method, Request, Response};
use tracing::debug;

pub mod comments;
pub mod config;
pub mod context;
pub mod core;
pub mod follow;
pub mod models;
pub mod notifications;
pub mod notifier;
pub mod posts;
pub mod users;

#[cfg(not(target_arch = "wasm32"))]
pub mod server;

use crate::context::AppContext;
use crate::core::helpers::json_response;

pub fn route(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    debug!(path = %path, "dispatching request");

    match (req.method(), segments.as_slice()) {
        (Method::Get, ["health"]) => json_response(200, &serde_json::json!({ "ok": true })),

        (Method::Get, ["users"]) => users::handle_list_users(ctx, req),
        (Method::Post, ["users"]) => users::handle_create_user(ctx, req),
        (Method::Get, ["users", _, "followers"]) => follow::get_followers_list(ctx, req),
        (Method::Get, ["users", _, "following"]) => follow::get_followings_list(ctx, req),
        (Method::Get, ["users", _]) => users::handle_get_user(ctx, req),
        (Method::Delete, ["users", _]) => users::handle_delete_user(ctx, req),

        (Method::Get, ["posts"]) => posts::handle_list_posts(ctx, req),
        (Method::Post, ["posts"]) => posts::handle_create_post(ctx, req),
        (Method::Delete, ["posts", _]) => posts::handle_delete_post(ctx, req),
        (Method::Get, ["posts", _, "comments"]) => comments::handle_list_comments(ctx, req),

        (Method::Post, ["comments"]) => comments::handle_create_comment(ctx, req),
        (Method::Post, ["likes"]) => posts::handle_toggle_like(ctx, req),
        (Method::Post, ["follow"]) => follow::handle_follow(ctx, req),
        (Method::Post, ["unfollow"]) => follow::handle_unfollow(ctx, req),

        (Method::Get, ["notifications", _]) => notifications::handle_list(ctx, req),
        (Method::Put, ["notifications", _, "read-all"]) => notifications::handle_read_all(ctx, req),
        (Method::Delete, ["notifications", _, "clear"]) => notifications::handle_clear(ctx, req),

        (Method::Post, ["seed"]) => crate::core::db::handle_seed(ctx, req),

        _ => json_response(404, &serde_json::json!({ "error": "No route found" })),
    }
}

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[spin_sdk::http_component]
fn handle(req: Request) -> anyhow::Result<Response> {
    let ctx = AppContext::spin(config::Config::load());
    route(&ctx, req)
}
