use crate::{Author, Keyed, Time, UserId};

string_id!(ZoneId);
string_id!(RoomId);
string_id!(PostId);

/// A boarding zone: one rental property offered by a landlord, containing rooms
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[serde(alias = "_id")]
    pub id: ZoneId,

    #[serde(alias = "ownerId")]
    pub owner: UserId,

    pub name: String,
    pub address: String,

    /// Monthly rent range, in VND
    #[serde(default)]
    pub min_price: u64,
    #[serde(default)]
    pub max_price: u64,

    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(alias = "_id")]
    pub id: RoomId,

    #[serde(alias = "boardingZoneId")]
    pub zone_id: ZoneId,

    pub name: String,

    /// Monthly rent, in VND
    pub price: u64,

    /// Floor area, in square meters
    #[serde(default)]
    pub area: u32,

    #[serde(default)]
    pub available: bool,
}

/// A discussion post, which carries a comment thread
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: PostId,

    pub title: String,
    pub content: String,

    #[serde(alias = "user")]
    pub author: Author,

    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,
}

impl Keyed for Zone {
    type Key = ZoneId;

    fn key(&self) -> ZoneId {
        self.id.clone()
    }
}

impl Keyed for Room {
    type Key = RoomId;

    fn key(&self) -> RoomId {
        self.id.clone()
    }
}

impl Keyed for Post {
    type Key = PostId;

    fn key(&self) -> PostId {
        self.id.clone()
    }
}
