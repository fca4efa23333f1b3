//! Request bodies, validated once at the boundary.
//!
//! Every field arrives as `Option` so a missing field and an empty one are
//! reported the same way, before any store access.

use serde::Deserialize;

use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::validate_uuid;

pub trait Validate: Sized {
    type Output;

    fn validate(self) -> Result<Self::Output, ApiError>;
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn uuid_field(value: String, name: &str) -> Result<String, ApiError> {
    if validate_uuid(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!("Invalid {}", name)))
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Username as typed; bounds are checked after sanitization.
pub struct NewUser {
    pub username: String,
    pub email: String,
}

impl Validate for CreateUserRequest {
    type Output = NewUser;

    fn validate(self) -> Result<NewUser, ApiError> {
        let (Some(username), Some(email)) = (present(self.username), present(self.email)) else {
            return Err(ApiError::BadRequest("username and email required".to_string()));
        };
        Ok(NewUser { username, email })
    }
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub author: Option<String>,
    pub content: Option<String>,
}

pub struct NewPost {
    pub author: String,
    pub content: String,
}

impl Validate for CreatePostRequest {
    type Output = NewPost;

    fn validate(self) -> Result<NewPost, ApiError> {
        let (Some(author), Some(content)) = (present(self.author), present(self.content)) else {
            return Err(ApiError::BadRequest("author and content required".to_string()));
        };
        if content.chars().count() > MAX_POST_LENGTH {
            return Err(ApiError::BadRequest("Invalid content".to_string()));
        }
        Ok(NewPost {
            author: uuid_field(author, "author id")?,
            content,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
}

pub struct NewComment {
    pub post_id: String,
    pub author: String,
    pub content: String,
}

impl Validate for CreateCommentRequest {
    type Output = NewComment;

    fn validate(self) -> Result<NewComment, ApiError> {
        let (Some(post_id), Some(author), Some(content)) =
            (present(self.post_id), present(self.author), present(self.content))
        else {
            return Err(ApiError::BadRequest("postId, author, content required".to_string()));
        };
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(ApiError::BadRequest("Invalid content".to_string()));
        }
        Ok(NewComment {
            post_id: uuid_field(post_id, "post id")?,
            author: uuid_field(author, "author id")?,
            content,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeRequest {
    pub post_id: Option<String>,
    pub user_id: Option<String>,
}

pub struct LikeToggle {
    pub post_id: String,
    pub user_id: String,
}

impl Validate for ToggleLikeRequest {
    type Output = LikeToggle;

    fn validate(self) -> Result<LikeToggle, ApiError> {
        let (Some(post_id), Some(user_id)) = (present(self.post_id), present(self.user_id)) else {
            return Err(ApiError::BadRequest("postId and userId required".to_string()));
        };
        Ok(LikeToggle {
            post_id: uuid_field(post_id, "post id")?,
            user_id: uuid_field(user_id, "user id")?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub follower_id: Option<String>,
    pub followee_id: Option<String>,
}

/// A follow edge between two distinct users.
pub struct FollowEdge {
    pub follower_id: String,
    pub followee_id: String,
}

impl FollowRequest {
    /// Presence and self-edge checks shared by follow and unfollow; only the
    /// self-edge message differs.
    pub fn into_edge(self, self_edge_message: &str) -> Result<FollowEdge, ApiError> {
        let (Some(follower_id), Some(followee_id)) =
            (present(self.follower_id), present(self.followee_id))
        else {
            return Err(ApiError::BadRequest("followerId and followeeId required".to_string()));
        };
        if follower_id == followee_id {
            return Err(ApiError::BadRequest(self_edge_message.to_string()));
        }
        Ok(FollowEdge {
            follower_id: uuid_field(follower_id, "follower id")?,
            followee_id: uuid_field(followee_id, "followee id")?,
        })
    }
}

impl Validate for FollowRequest {
    type Output = FollowEdge;

    fn validate(self) -> Result<FollowEdge, ApiError> {
        self.into_edge("Cannot follow yourself")
    }
}
