use std::{fmt::Debug, hash::Hash};

use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Backend identifiers come as either JSON strings or JSON numbers depending on
/// the endpoint; both are stored as their textual form.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match <RawId as serde::Deserialize>::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

macro_rules! string_id {
    ( $name:ident ) => {
        #[derive(
            Clone,
            Debug,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(#[serde(deserialize_with = "crate::deserialize_id")] pub String);

        impl From<&str> for $name {
            fn from(s: &str) -> $name {
                $name(String::from(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

mod comment;
pub use comment::{Author, Comment, CommentId};

mod error;
pub use error::Error;

mod listing;
pub use listing::{Post, PostId, Room, RoomId, Zone, ZoneId};

mod notification;
pub use notification::{Notification, NotificationId};

mod page;
pub use page::{Page, PageRequest, PageToken};

pub mod time;

string_id!(UserId);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID.to_string())
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn generate() -> AuthToken {
        AuthToken(Uuid::new_v4().to_string())
    }

    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID.to_string())
    }
}

/// An entity that can be listed in a paginated collection, identified by a key
/// that stays the same across pages.
pub trait Keyed: Clone {
    type Key: Clone + Debug + Eq + Hash + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

// Text submitted to the backend must not contain null bytes, the backend
// storage rejects them with an unhelpful error.
pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}
