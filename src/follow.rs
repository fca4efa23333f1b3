use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::config::*;
use crate::context::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{parse_body, path_param, respond};
use crate::models::models::{Ack, User};
use crate::models::requests::{FollowEdge, FollowRequest, Validate};
use crate::notifier::{notify, SocialEvent};
use crate::users::{get_user, load_user, save_user};

fn load_pair(ctx: &AppContext, edge: &FollowEdge) -> Result<(User, User), ApiError> {
    let store = ctx.store();
    match (load_user(store, &edge.follower_id)?, load_user(store, &edge.followee_id)?) {
        (Some(follower), Some(followee)) => Ok((follower, followee)),
        _ => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// Add the follow edge in both directions, whichever half is missing. The
/// followee is notified only when the follower was not already listed.
pub fn follow_user(ctx: &AppContext, edge: FollowEdge) -> Result<Ack, ApiError> {
    let keys = [user_key(&edge.follower_id), user_key(&edge.followee_id)];

    ctx.locks.with_keys(&[keys[0].as_str(), keys[1].as_str()], || -> Result<Ack, ApiError> {
        let (mut follower, mut followee) = load_pair(ctx, &edge)?;
        let store = ctx.store();

        if !follower.following.contains(&followee.id) {
            follower.following.push(followee.id.clone());
            save_user(store, &follower)?;
        }

        let new_edge = !followee.followers.contains(&follower.id);
        if new_edge {
            followee.followers.push(follower.id.clone());
            save_user(store, &followee)?;
            info!(follower = %follower.id, followee = %followee.id, "follow edge added");
        }

        notify(
            ctx,
            SocialEvent::FollowRequested {
                follower: &follower,
                followee: &followee,
                new_edge,
            },
        )?;

        Ok(Ack::ok())
    })
}

/// Remove the follow edge in both directions. Never notifies.
pub fn unfollow_user(ctx: &AppContext, edge: FollowEdge) -> Result<Ack, ApiError> {
    let keys = [user_key(&edge.follower_id), user_key(&edge.followee_id)];

    ctx.locks.with_keys(&[keys[0].as_str(), keys[1].as_str()], || -> Result<Ack, ApiError> {
        let (mut follower, mut followee) = load_pair(ctx, &edge)?;
        let store = ctx.store();

        let before = follower.following.len();
        follower.following.retain(|id| *id != followee.id);
        if follower.following.len() != before {
            save_user(store, &follower)?;
        }

        let before = followee.followers.len();
        followee.followers.retain(|id| *id != follower.id);
        if followee.followers.len() != before {
            save_user(store, &followee)?;
            info!(follower = %follower.id, followee = %followee.id, "follow edge removed");
        }

        Ok(Ack::ok())
    })
}

pub fn get_followers(ctx: &AppContext, user_id: &str) -> Result<Vec<String>, ApiError> {
    Ok(get_user(ctx, user_id)?.followers)
}

pub fn get_followings(ctx: &AppContext, user_id: &str) -> Result<Vec<String>, ApiError> {
    Ok(get_user(ctx, user_id)?.following)
}

// === HTTP Handlers ===

pub fn handle_follow(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<FollowRequest>(&req)
        .and_then(Validate::validate)
        .and_then(|edge| follow_user(ctx, edge));
    respond(200, result)
}

pub fn handle_unfollow(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let result = parse_body::<FollowRequest>(&req)
        .and_then(|body| body.into_edge("Cannot unfollow yourself"))
        .and_then(|edge| unfollow_user(ctx, edge));
    respond(200, result)
}

pub fn get_followers_list(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/users/");
    respond(200, get_followers(ctx, user_id))
}

pub fn get_followings_list(ctx: &AppContext, req: Request) -> anyhow::Result<Response> {
    let user_id = path_param(req.path(), "/users/");
    respond(200, get_followings(ctx, user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::helpers::new_id;
    use crate::models::models::NotificationKind;
    use crate::models::requests::NewUser;
    use crate::notifications::list_notifications;
    use crate::users::create_user;

    fn user(ctx: &AppContext, name: &str) -> User {
        create_user(
            ctx,
            NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
            },
        )
        .unwrap()
    }

    fn edge(follower: &str, followee: &str) -> FollowEdge {
        FollowEdge {
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
        }
    }

    #[test]
    fn follow_is_idempotent() {
        let ctx = AppContext::in_memory(Config::default());
        let alice = user(&ctx, "alice");
        let bob = user(&ctx, "bob");

        follow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();
        follow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();

        assert_eq!(get_followers(&ctx, &alice.id).unwrap(), vec![bob.id.clone()]);
        assert_eq!(get_followings(&ctx, &bob.id).unwrap(), vec![alice.id.clone()]);

        let notes = list_notifications(&ctx, &alice.id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::NewFollower);
        assert_eq!(notes[0].message, "bob started following you.");
        assert!(list_notifications(&ctx, &bob.id).unwrap().is_empty());
    }

    #[test]
    fn self_follow_fails_without_side_effects() {
        let ctx = AppContext::in_memory(Config::default());
        let alice = user(&ctx, "alice");

        let err = FollowRequest {
            follower_id: Some(alice.id.clone()),
            followee_id: Some(alice.id.clone()),
        }
        .validate()
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::BadRequest(_)));

        assert!(get_followers(&ctx, &alice.id).unwrap().is_empty());
        assert!(list_notifications(&ctx, &alice.id).unwrap().is_empty());
    }

    #[test]
    fn missing_user_is_not_found() {
        let ctx = AppContext::in_memory(Config::default());
        let alice = user(&ctx, "alice");

        let err = follow_user(&ctx, edge(&new_id(), &alice.id)).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(list_notifications(&ctx, &alice.id).unwrap().is_empty());
    }

    #[test]
    fn unfollow_then_refollow_notifies_again() {
        let ctx = AppContext::in_memory(Config::default());
        let alice = user(&ctx, "alice");
        let bob = user(&ctx, "bob");

        follow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();
        unfollow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();
        unfollow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();

        assert!(get_followers(&ctx, &alice.id).unwrap().is_empty());
        assert!(get_followings(&ctx, &bob.id).unwrap().is_empty());
        assert_eq!(list_notifications(&ctx, &alice.id).unwrap().len(), 1);

        follow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();
        assert_eq!(list_notifications(&ctx, &alice.id).unwrap().len(), 2);
    }

    #[test]
    fn half_edge_is_repaired_and_notifies() {
        let ctx = AppContext::in_memory(Config::default());
        let alice = user(&ctx, "alice");
        let mut bob = user(&ctx, "bob");
        bob.following.push(alice.id.clone());
        save_user(ctx.store(), &bob).unwrap();

        follow_user(&ctx, edge(&bob.id, &alice.id)).unwrap();

        assert_eq!(get_followings(&ctx, &bob.id).unwrap(), vec![alice.id.clone()]);
        assert_eq!(get_followers(&ctx, &alice.id).unwrap(), vec![bob.id.clone()]);
        assert_eq!(list_notifications(&ctx, &alice.id).unwrap().len(), 1);
    }
}
