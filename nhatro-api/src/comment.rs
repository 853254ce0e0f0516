use crate::{Keyed, Time, Uuid};

string_id!(CommentId);

const TEMPORARY_PREFIX: &str = "tmp-";

impl CommentId {
    /// A client-side id for a comment the server has not acknowledged yet
    pub fn temporary() -> CommentId {
        CommentId(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Author {
    #[serde(alias = "name")]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: CommentId,

    #[serde(alias = "text")]
    pub content: String,

    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,

    #[serde(alias = "user")]
    pub author: Author,

    /// Replies in display order
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Keyed for Comment {
    type Key = CommentId;

    fn key(&self) -> CommentId {
        self.id.clone()
    }
}
