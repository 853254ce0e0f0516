use crate::{Keyed, Time};

string_id!(NotificationId);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: NotificationId,

    pub title: String,

    #[serde(default, alias = "content")]
    pub body: String,

    #[serde(default, alias = "isRead")]
    pub read: bool,

    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,
}

impl Keyed for Notification {
    type Key = NotificationId;

    fn key(&self) -> NotificationId {
        self.id.clone()
    }
}
