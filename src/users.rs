use ammonia::Builder;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now, parse_body, path_param, respond};
use crate::core::store::{KvStore, KvStoreExt};
use crate::models::models::{Message, User, UserSummary};
use crate::models::requests::{CreateUserRequest, NewUser, Validate};

fn sanitize_text(text: &str) -> String {
    // Plain text only, every tag stripped
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

pub fn load_user(store: &dyn KvStore, user_id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(user_id))
}

pub fn save_user(store: &dyn KvStore, user: &User) -> anyhow::Result<()> {
    store.set_json(&user_key(&user.id), user)
}

/// Register a user. Usernames are unique after sanitization.
pub fn create_user(ctx: &AppContext, new_user: NewUser) -> Result<User, ApiError> {
    let username = sanitize_text(&new_user.username);
    if username.is_empty() {
        return Err(ApiError::BadRequest("Invalid username".to_string()));
    }
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(ApiError::BadRequest(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }

    ctx.locks.with_keys(&[USERS_LIST_KEY], || -> Result<User, ApiError> {
        let store = ctx.store();
        let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
        for id in &users {
            if let Some(u) = load_user(store, id)? {
                if u.username == username {
                    return Err(ApiError::Conflict("Username exists".to_string()));
                }
            }
        }

        let user = User {
            id: new_id(),
            username,
            email: new_user.email,
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now(),
        };
        save_user(store, &user)?;

        users.push(user.id.clone());
        store.set_json(USERS_LIST_KEY, &users)?;

        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    })
}

pub fn list_users(ctx: &AppContext) -> Result<Vec<UserSummary>, ApiError> {
    let store = ctx.store();
    let ids: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    let mut users = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(u) = load_user(store, id)? {
            users.push(UserSummary::from(&u));
        }
    }
    Ok(users)
}

pub fn get_user(ctx: &AppContext, user_id: &str) -> Result<User, ApiError> {
    load_user(ctx.store(), user_id)?.ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Remove the user document and index entry. Posts, comments, notifications
/// and other users' follow edges keep referencing the id.
pub fn delete_user(ctx: &AppContext, user_id: &str) -> Result<(), ApiError> {
    let key = user_key(user_id);
    ctx.locks.with_keys(&[key.as_str(), USERS_LIST_KEY], || -> Result<(), ApiError> {
        let store = ctx.store();
        store.delete(&key)?;

        let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
        let before = users.len();
        users.retain(|id| id != user_id);
        if users.len() != before {
            store.set_json(USERS_LIST_KEY, &users)?;
            info!(user_id = %user_id, "user deleted");
        }
        Ok(())
    })
}

// === HTTP Handlers ===

pub fn handle_create_user(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<CreateUserRequest>(&req)
        .and_then(Validate::validate)
        .and_then(|new_user| create_user(ctx, new_user));
    respond(201, result)
}

pub fn handle_list_users(ctx: &AppContext, _req: Request) -> anyhow::Result<Response> {
    respond(200, list_users(ctx))
}

pub fn handle_get_user(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/users/");
    respond(200, get_user(ctx, user_id))
}

pub fn handle_delete_user(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/users/");
    let result = delete_user(ctx, user_id)
        .map(|_| Message::new("User deleted"));
    respond(200, result)
}
