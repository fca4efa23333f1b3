use std::collections::HashMap;
use std::sync::OnceLock;

use ammonia::Builder;
use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use regex::Regex;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now, parse_body, path_param, respond};
use crate::core::query_params::{get_page, parse_query_params};
use crate::core::store::{KvStore, KvStoreExt};
use crate::models::models::{LikeStatus, Message, Post, PostView, User};
use crate::models::requests::{CreatePostRequest, LikeToggle, NewPost, ToggleLikeRequest, Validate};
use crate::notifier::{notify, SocialEvent};
use crate::users::load_user;

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Bare URLs only; ones already inside markup are preceded by a quote or `>`
        Regex::new(r#"(^|\s)(https?://[^\s<"]+)"#).expect("Regex should compile")
    })
}

/// Strip dangerous markup and turn bare URLs into links.
pub fn filter_post_content(content: &str) -> String {
    let clean = Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(content)
        .to_string();

    url_regex()
        .replace_all(&clean, |caps: &regex::Captures| {
            // Sanitized text is already entity-encoded
            let url = &caps[2];
            let escaped_url = encode_double_quoted_attribute(&decode_html_entities(url)).into_owned();
            format!(r#"{}<a href="{}" target="_blank">{}</a>"#, &caps[1], escaped_url, url)
        })
        .to_string()
}

pub fn load_post(store: &dyn KvStore, post_id: &str) -> anyhow::Result<Option<Post>> {
    store.get_json(&post_key(post_id))
}

fn expand(store: &dyn KvStore, post: Post) -> anyhow::Result<PostView> {
    let author = load_user(store, &post.author)?;
    Ok(PostView::new(post, author.as_ref()))
}

pub fn create_post(ctx: &AppContext, new_post: NewPost) -> Result<PostView, ApiError> {
    let content = filter_post_content(&new_post.content);
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Invalid content".to_string()));
    }

    let post = Post {
        id: new_id(),
        author: new_post.author,
        content,
        likes: Vec::new(),
        notified_likers: Vec::new(),
        created_at: now(),
    };

    let store = ctx.store();
    store.set_json(&post_key(&post.id), &post)?;
    ctx.locks.with_keys(&[FEED_KEY], || -> anyhow::Result<()> {
        let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
        feed.insert(0, post.id.clone()); // prepend newest
        store.set_json(FEED_KEY, &feed)
    })?;
    info!(post_id = %post.id, author = %post.author, "post created");

    notify(ctx, SocialEvent::PostCreated { post: &post })?;

    Ok(expand(store, post)?)
}

/// Posts newest first. With a page, only that page of `POSTS_PER_PAGE`.
pub fn list_posts(ctx: &AppContext, page: Option<usize>) -> Result<Vec<PostView>, ApiError> {
    let store = ctx.store();
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let ids: Vec<&String> = match page {
        Some(page) => feed
            .iter()
            .skip(page.saturating_sub(1).saturating_mul(POSTS_PER_PAGE))
            .take(POSTS_PER_PAGE)
            .collect(),
        None => feed.iter().collect(),
    };

    let mut authors: HashMap<String, Option<User>> = HashMap::new();
    let mut posts = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(post) = load_post(store, id)? else {
            continue;
        };
        if !authors.contains_key(&post.author) {
            let author = load_user(store, &post.author)?;
            authors.insert(post.author.clone(), author);
        }
        let author = authors.get(&post.author).and_then(Option::as_ref);
        posts.push(PostView::new(post, author));
    }
    Ok(posts)
}

/// Delete a post. Comments and notifications that mention it are left alone.
pub fn delete_post(ctx: &AppContext, post_id: &str) -> Result<(), ApiError> {
    let store = ctx.store();
    let key = post_key(post_id);

    ctx.locks.with_keys(&[key.as_str(), FEED_KEY], || -> Result<(), ApiError> {
        store.delete(&key)?;

        let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
        let before = feed.len();
        feed.retain(|id| id != post_id);
        if feed.len() != before {
            store.set_json(FEED_KEY, &feed)?;
            info!(post_id = %post_id, "post deleted");
        }
        Ok(())
    })
}

/// Like the post if `user_id` has not liked it yet, otherwise unlike it.
/// The author hears about a liker once, on their first like.
pub fn toggle_like(ctx: &AppContext, toggle: LikeToggle) -> Result<LikeStatus, ApiError> {
    let key = post_key(&toggle.post_id);

    ctx.locks.with_keys(&[key.as_str()], || -> Result<LikeStatus, ApiError> {
        let store = ctx.store();
        let mut post: Post = store
            .get_json(&key)?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        let already = post.likes.iter().any(|u| *u == toggle.user_id);
        let first_like = !already && !post.notified_likers.contains(&toggle.user_id);
        if already {
            post.likes.retain(|u| *u != toggle.user_id);
        } else {
            post.likes.push(toggle.user_id.clone());
        }
        if first_like {
            post.notified_likers.push(toggle.user_id.clone());
        }
        store.set_json(&key, &post)?;

        notify(
            ctx,
            SocialEvent::LikeToggled {
                post: &post,
                liked: !already,
                first_like,
            },
        )?;

        Ok(LikeStatus {
            ok: true,
            liked: !already,
            likes_count: post.likes.len(),
        })
    })
}

// === HTTP Handlers ===

pub fn handle_create_post(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<CreatePostRequest>(&req)
        .and_then(Validate::validate)
        .and_then(|new_post| create_post(ctx, new_post));
    respond(200, result)
}

pub fn handle_list_posts(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let params = parse_query_params(req.uri());
    respond(200, list_posts(ctx, get_page(&params)))
}

pub fn handle_delete_post(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let post_id = path_param(req.path(), "/posts/");
    let result = delete_post(ctx, post_id).map(|_| Message::new("Post deleted"));
    respond(200, result)
}

pub fn handle_toggle_like(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<ToggleLikeRequest>(&req)
        .and_then(Validate::validate)
        .and_then(|toggle| toggle_like(ctx, toggle));
    respond(200, result)
}
