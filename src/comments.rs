use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now, parse_body, path_param, respond};
use crate::core::store::KvStoreExt;
use crate::models::models::Comment;
use crate::models::requests::{CreateCommentRequest, NewComment, Validate};
use crate::notifier::{notify, SocialEvent};
use crate::posts::{filter_post_content, load_post};

/// Comment on a post and notify the post's author.
pub fn create_comment(ctx: &AppContext, new_comment: NewComment) -> Result<Comment, ApiError> {
    let store = ctx.store();
    let post = load_post(store, &new_comment.post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let content = filter_post_content(&new_comment.content);
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Invalid content".to_string()));
    }

    let comment = Comment {
        id: new_id(),
        post: post.id.clone(),
        author: new_comment.author,
        content,
        created_at: now(),
    };
    store.set_json(&comment_key(&comment.id), &comment)?;

    let index_key = comments_key(&post.id);
    ctx.locks.with_keys(&[index_key.as_str()], || -> anyhow::Result<()> {
        let mut index: Vec<String> = store.get_json(&index_key)?.unwrap_or_default();
        index.push(comment.id.clone());
        store.set_json(&index_key, &index)
    })?;
    info!(comment_id = %comment.id, post_id = %post.id, "comment created");

    notify(ctx, SocialEvent::CommentCreated { post: &post })?;

    Ok(comment)
}

/// Comments on a post, oldest first.
pub fn list_comments(ctx: &AppContext, post_id: &str) -> Result<Vec<Comment>, ApiError> {
    let store = ctx.store();
    if load_post(store, post_id)?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    let index: Vec<String> = store.get_json(&comments_key(post_id))?.unwrap_or_default();
    let mut comments = Vec::with_capacity(index.len());
    for id in &index {
        if let Some(c) = store.get_json::<Comment>(&comment_key(id))? {
            comments.push(c);
        }
    }
    Ok(comments)
}

// === HTTP Handlers ===

pub fn handle_create_comment(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<CreateCommentRequest>(&req)
        .and_then(Validate::validate)
        .and_then(|new_comment| create_comment(ctx, new_comment));
    respond(200, result)
}

pub fn handle_list_comments(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let post_id = path_param(req.path(), "/posts/");
    respond(200, list_comments(ctx, post_id))
}
