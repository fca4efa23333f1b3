//! Notification side effects of social actions.
//!
//! Every social action that may notify someone reports its outcome as a
//! [`SocialEvent`] after its own mutation has been written. [`decide`] turns
//! that outcome into at most one [`Draft`], and [`notify`] appends it to the
//! recipient's notifications.
//!
//! The append is a separate write from the mutation that triggered it. If it
//! fails, the mutation stays committed and the notification is lost; callers
//! see the same generic failure as for a failed mutation.

use tracing::{debug, warn};

use crate::config::{notification_key, notifications_key};
use crate::context::AppContext;
use crate::core::helpers::{new_id, now};
use crate::core::store::KvStoreExt;
use crate::models::models::{Notification, NotificationKind, Post, User};

/// The outcome of a social action, as far as notifications care.
pub enum SocialEvent<'a> {
    PostCreated {
        post: &'a Post,
    },
    CommentCreated {
        post: &'a Post,
    },
    LikeToggled {
        post: &'a Post,
        /// `true` when the toggle went from unliked to liked.
        liked: bool,
        /// `true` when this liker has never notified the author before.
        first_like: bool,
    },
    FollowRequested {
        follower: &'a User,
        followee: &'a User,
        /// `true` when the follower was not already among the followee's followers.
        new_edge: bool,
    },
}

/// A notification that has been decided on but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub recipient: String,
    pub kind: NotificationKind,
    pub message: String,
}

impl NotificationKind {
    /// Human-readable message; `actor` is the username of whoever caused it.
    pub fn message(self, actor: &str) -> String {
        match self {
            NotificationKind::PostConfirmation => "Your post was created successfully.".to_string(),
            NotificationKind::NewComment => "Someone commented on your post.".to_string(),
            NotificationKind::NewLike => "Your post received a new like.".to_string(),
            NotificationKind::NewFollower => format!("{} started following you.", actor),
        }
    }
}

/// Decide whether `event` produces a notification, and for whom.
///
/// A like notifies once per liker and post: unliking and liking again stays
/// silent. Self-interaction is not filtered, so liking your own post
/// notifies you.
pub fn decide(event: &SocialEvent<'_>) -> Option<Draft> {
    let (recipient, kind, actor) = match event {
        SocialEvent::PostCreated { post } => (&post.author, NotificationKind::PostConfirmation, ""),
        SocialEvent::CommentCreated { post } => (&post.author, NotificationKind::NewComment, ""),
        SocialEvent::LikeToggled {
            post,
            liked: true,
            first_like: true,
        } => (&post.author, NotificationKind::NewLike, ""),
        SocialEvent::LikeToggled { .. } => return None,
        SocialEvent::FollowRequested {
            follower,
            followee,
            new_edge: true,
        } => (&followee.id, NotificationKind::NewFollower, follower.username.as_str()),
        SocialEvent::FollowRequested { new_edge: false, .. } => return None,
    };

    Some(Draft {
        recipient: recipient.clone(),
        kind,
        message: kind.message(actor),
    })
}

/// Store `draft` and put it at the head of its recipient's index.
pub fn append(ctx: &AppContext, draft: Draft) -> anyhow::Result<Notification> {
    let notification = Notification {
        id: new_id(),
        recipient: draft.recipient,
        kind: draft.kind,
        message: draft.message,
        read: false,
        created_at: now(),
    };

    let index_key = notifications_key(&notification.recipient);
    ctx.locks.with_keys(&[index_key.as_str()], || -> anyhow::Result<()> {
        let store = ctx.store();
        store.set_json(&notification_key(&notification.id), &notification)?;

        let mut index: Vec<String> = store.get_json(&index_key)?.unwrap_or_default();
        index.insert(0, notification.id.clone());
        store.set_json(&index_key, &index)
    })?;

    Ok(notification)
}

/// Decide and append in one step. Returns the stored notification, if any.
pub fn notify(ctx: &AppContext, event: SocialEvent<'_>) -> anyhow::Result<Option<Notification>> {
    let Some(draft) = decide(&event) else {
        return Ok(None);
    };

    let recipient = draft.recipient.clone();
    let kind = draft.kind;
    match append(ctx, draft) {
        Ok(notification) => {
            debug!(recipient = %recipient, kind = ?kind, id = %notification.id, "notification appended");
            Ok(Some(notification))
        }
        Err(e) => {
            warn!(recipient = %recipient, kind = ?kind, error = %e, "notification append failed after mutation committed");
            Err(e)
        }
    }
}
