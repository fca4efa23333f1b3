use spin_sdk::http::{Request, Response};

use crate::config::{notification_key, notifications_key};
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{path_param, respond};
use crate::core::store::KvStoreExt;
use crate::models::models::{Message, Notification};

/// All notifications for `user_id`, newest first. Unknown users have none.
pub fn list_notifications(ctx: &AppContext, user_id: &str) -> Result<Vec<Notification>, ApiError> {
    let store = ctx.store();
    let index: Vec<String> = store.get_json(&notifications_key(user_id))?.unwrap_or_default();

    let mut items = Vec::with_capacity(index.len());
    for id in &index {
        if let Some(n) = store.get_json::<Notification>(&notification_key(id))? {
            items.push(n);
        }
    }
    Ok(items)
}

pub fn mark_all_read(ctx: &AppContext, user_id: &str) -> Result<(), ApiError> {
    let index_key = notifications_key(user_id);
    ctx.locks.with_keys(&[index_key.as_str()], || -> Result<(), ApiError> {
        let store = ctx.store();
        let index: Vec<String> = store.get_json(&index_key)?.unwrap_or_default();

        for id in &index {
            let key = notification_key(id);
            if let Some(mut n) = store.get_json::<Notification>(&key)? {
                if !n.read {
                    n.read = true;
                    store.set_json(&key, &n)?;
                }
            }
        }
        Ok(())
    })
}

pub fn clear_all(ctx: &AppContext, user_id: &str) -> Result<(), ApiError> {
    let index_key = notifications_key(user_id);
    ctx.locks.with_keys(&[index_key.as_str()], || -> Result<(), ApiError> {
        let store = ctx.store();
        let index: Vec<String> = store.get_json(&index_key)?.unwrap_or_default();

        for id in &index {
            store.delete(&notification_key(id))?;
        }
        store.delete(&index_key)?;
        Ok(())
    })
}

// === HTTP Handlers ===

pub fn handle_list(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/notifications/");
    respond(200, list_notifications(ctx, user_id))
}

pub fn handle_read_all(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/notifications/");
    let result = mark_all_read(ctx, user_id)
        .map(|_| Message::new("All notifications marked as read"));
    respond(200, result)
}

pub fn handle_clear(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/notifications/");
    let result = clear_all(ctx, user_id).map(|_| Message::new("All notifications cleared"));
    respond(200, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::helpers::{new_id, now};
    use crate::models::models::{NotificationKind, Post};
    use crate::notifier::{notify, SocialEvent};

    fn seeded(ctx: &AppContext, author: &str, count: usize) {
        let post = Post {
            id: new_id(),
            author: author.to_string(),
            content: "Hello".to_string(),
            likes: Vec::new(),
            notified_likers: Vec::new(),
            created_at: now(),
        };
        for _ in 0..count {
            notify(ctx, SocialEvent::CommentCreated { post: &post }).unwrap();
        }
    }

    #[test]
    fn empty_recipient_is_not_an_error() {
        let ctx = AppContext::in_memory(Config::default());
        assert!(list_notifications(&ctx, "nobody").unwrap().is_empty());
        mark_all_read(&ctx, "nobody").unwrap();
        clear_all(&ctx, "nobody").unwrap();
    }

    #[test]
    fn list_is_newest_first_and_scoped_to_recipient() {
        let ctx = AppContext::in_memory(Config::default());
        seeded(&ctx, "alice", 3);
        seeded(&ctx, "bob", 1);

        let items = list_notifications(&ctx, "alice").unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|n| n.recipient == "alice"));
        assert!(items.iter().all(|n| n.kind == NotificationKind::NewComment));
        assert!(items.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn mark_all_read_is_idempotent() {
        let ctx = AppContext::in_memory(Config::default());
        seeded(&ctx, "alice", 2);
        seeded(&ctx, "bob", 1);

        mark_all_read(&ctx, "alice").unwrap();
        mark_all_read(&ctx, "alice").unwrap();

        assert!(list_notifications(&ctx, "alice").unwrap().iter().all(|n| n.read));
        assert!(list_notifications(&ctx, "bob").unwrap().iter().all(|n| !n.read));
    }

    #[test]
    fn clear_all_removes_only_recipient_notifications() {
        let ctx = AppContext::in_memory(Config::default());
        seeded(&ctx, "alice", 2);
        seeded(&ctx, "bob", 1);

        clear_all(&ctx, "alice").unwrap();
        clear_all(&ctx, "alice").unwrap();

        assert!(list_notifications(&ctx, "alice").unwrap().is_empty());
        assert_eq!(list_notifications(&ctx, "bob").unwrap().len(), 1);
    }
}
