use std::{
    collections::{btree_map, BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use nhatro_client::{
    api::{
        AuthToken, CommentId, Error, Notification, NotificationId, Page, PageRequest, Post,
        PostId, Room, UserId, Uuid, Zone, ZoneId,
    },
    CommentPoster, PageFetcher,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub use nhatro_client::api;

/// What the backend answers when a landlord has no boarding zone yet
pub const NO_ZONES_MESSAGE: &str = "Không tìm thấy bài đăng trọ";

pub struct MockServer {
    users: BTreeMap<UserId, DbUser>,

    // newest first
    zones: Vec<Zone>,
    rooms: Vec<Room>,
    posts: Vec<Post>,
    threads: HashMap<PostId, Vec<api::Comment>>,

    failures: VecDeque<Error>,
}

#[derive(Debug)]
struct DbUser {
    name: String,
    sessions: HashSet<AuthToken>,
    // newest first
    notifications: Vec<Notification>,
    feeds: Vec<mpsc::UnboundedSender<Notification>>,
}

impl DbUser {
    fn relay(&mut self, n: Notification) {
        self.notifications.insert(0, n.clone());
        self.feeds.retain(|f| matches!(f.send(n.clone()), Ok(())));
    }
}

/// Initial content of a [`MockServer`], as printed by `generate-test-data`
#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct Fixture {
    pub users: Vec<FixtureUser>,
    pub zones: Vec<Zone>,
    pub rooms: Vec<Room>,
    pub posts: Vec<FixturePost>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct FixtureUser {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct FixturePost {
    pub post: Post,
    #[serde(default)]
    pub comments: Vec<api::Comment>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            zones: Vec::new(),
            rooms: Vec::new(),
            posts: Vec::new(),
            threads: HashMap::new(),
            failures: VecDeque::new(),
        }
    }

    pub fn from_fixture(f: Fixture) -> Result<MockServer, Error> {
        let mut server = MockServer::new();
        for u in f.users {
            server.create_user(u.id.clone(), u.name)?;
            for n in u.notifications.into_iter().rev() {
                server.notify(&u.id, n)?;
            }
        }
        let mut zones = f.zones;
        zones.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for z in zones {
            server.add_zone(z)?;
        }
        for r in f.rooms {
            server.add_room(r)?;
        }
        for p in f.posts {
            let id = p.post.id.clone();
            server.add_post(p.post);
            server.threads.insert(id, p.comments);
        }
        Ok(server)
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    pub fn test_user_ids(&self) -> Vec<UserId> {
        self.users.keys().cloned().collect()
    }

    pub fn create_user(&mut self, id: UserId, name: String) -> Result<(), Error> {
        api::validate_string(&name)?;
        if self.users.values().any(|u| u.name == name) {
            return Err(Error::InvalidRequest(format!("username {name} is already taken")));
        }
        match self.users.entry(id) {
            btree_map::Entry::Occupied(e) => Err(Error::InvalidRequest(format!(
                "user id {} is already taken",
                e.key()
            ))),
            btree_map::Entry::Vacant(e) => {
                e.insert(DbUser {
                    name,
                    sessions: HashSet::new(),
                    notifications: Vec::new(),
                    feeds: Vec::new(),
                });
                Ok(())
            }
        }
    }

    pub fn open_session(&mut self, user: &UserId) -> Result<AuthToken, Error> {
        let u = self
            .users
            .get_mut(user)
            .ok_or(Error::PermissionDenied)?;
        let tok = AuthToken::generate();
        u.sessions.insert(tok.clone());
        Ok(tok)
    }

    pub fn close_session(&mut self, tok: &AuthToken) -> Result<(), Error> {
        let (_, u) = self.resolve_mut(tok)?;
        u.sessions.remove(tok);
        Ok(())
    }

    fn resolve(&self, tok: &AuthToken) -> Result<(&UserId, &DbUser), Error> {
        self.users
            .iter()
            .find(|(_, u)| u.sessions.contains(tok))
            .ok_or(Error::PermissionDenied)
    }

    fn resolve_mut(&mut self, tok: &AuthToken) -> Result<(&UserId, &mut DbUser), Error> {
        self.users
            .iter_mut()
            .find(|(_, u)| u.sessions.contains(tok))
            .ok_or(Error::PermissionDenied)
    }

    pub fn whoami(&self, tok: &AuthToken) -> Result<UserId, Error> {
        Ok(self.resolve(tok)?.0.clone())
    }

    /// Make the next request fail with `err`, whatever it is
    pub fn fail_next(&mut self, err: Error) {
        self.failures.push_back(err);
    }

    fn injected_failure(&mut self) -> Result<(), Error> {
        match self.failures.pop_front() {
            Some(err) => {
                tracing::debug!(%err, "failing request on purpose");
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub fn add_zone(&mut self, z: Zone) -> Result<(), Error> {
        api::validate_string(&z.name)?;
        api::validate_string(&z.address)?;
        if !self.users.contains_key(&z.owner) {
            return Err(Error::NotFound(format!("no user {}", z.owner)));
        }
        self.zones.insert(0, z);
        Ok(())
    }

    pub fn add_room(&mut self, r: Room) -> Result<(), Error> {
        api::validate_string(&r.name)?;
        if !self.zones.iter().any(|z| z.id == r.zone_id) {
            return Err(Error::NotFound(format!("no boarding zone {}", r.zone_id)));
        }
        self.rooms.push(r);
        Ok(())
    }

    pub fn add_post(&mut self, p: Post) {
        self.threads.entry(p.id.clone()).or_default();
        self.posts.insert(0, p);
    }

    pub fn notify(&mut self, user: &UserId, n: Notification) -> Result<(), Error> {
        let u = self
            .users
            .get_mut(user)
            .ok_or_else(|| Error::NotFound(format!("no user {user}")))?;
        u.relay(n);
        Ok(())
    }

    pub fn notification_feed(
        &mut self,
        tok: &AuthToken,
    ) -> Result<mpsc::UnboundedReceiver<Notification>, Error> {
        let (_, u) = self.resolve_mut(tok)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        u.feeds.push(sender);
        Ok(receiver)
    }

    /// Spring-style page: `{ "content": [...], "last": ... }`
    pub fn fetch_zones(&mut self, owner: &UserId, req: PageRequest) -> Result<Value, Error> {
        self.injected_failure()?;
        let zones = self
            .zones
            .iter()
            .filter(|z| z.owner == *owner)
            .cloned()
            .collect::<Vec<_>>();
        if zones.is_empty() {
            return Err(Error::NotFound(String::from(NO_ZONES_MESSAGE)));
        }
        let (content, last) = page_of(&zones, req);
        Ok(json!({
            "content": content,
            "last": last,
            "number": req.token,
            "totalElements": zones.len(),
        }))
    }

    /// `{ "items": [...] }` with no final-page flag
    pub fn fetch_rooms(&mut self, zone: &ZoneId, req: PageRequest) -> Result<Value, Error> {
        self.injected_failure()?;
        if !self.zones.iter().any(|z| z.id == *zone) {
            return Err(Error::NotFound(format!("no boarding zone {zone}")));
        }
        let rooms = self
            .rooms
            .iter()
            .filter(|r| r.zone_id == *zone)
            .cloned()
            .collect::<Vec<_>>();
        let (items, _) = page_of(&rooms, req);
        Ok(json!({ "items": items }))
    }

    /// Bare array
    pub fn fetch_notifications(
        &mut self,
        tok: &AuthToken,
        req: PageRequest,
    ) -> Result<Value, Error> {
        self.injected_failure()?;
        let (_, u) = self.resolve(tok)?;
        let (items, _) = page_of(&u.notifications, req);
        Ok(json!(items))
    }

    /// `{ "data": { "results": [...] }, "isLastPage": ... }`
    pub fn search_posts(&mut self, query: &str, req: PageRequest) -> Result<Value, Error> {
        self.injected_failure()?;
        api::validate_string(query)?;
        let query = query.to_lowercase();
        let posts = self
            .posts
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&query) || p.content.to_lowercase().contains(&query)
            })
            .cloned()
            .collect::<Vec<_>>();
        let (results, last) = page_of(&posts, req);
        Ok(json!({
            "data": { "results": results },
            "isLastPage": last,
        }))
    }

    pub fn fetch_comments(&mut self, post: &PostId) -> Result<Vec<api::Comment>, Error> {
        self.injected_failure()?;
        self.threads
            .get(post)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no post {post}")))
    }

    pub fn post_comment(
        &mut self,
        tok: &AuthToken,
        post: &PostId,
        parent: Option<&CommentId>,
        content: &str,
    ) -> Result<api::Comment, Error> {
        self.injected_failure()?;
        api::validate_string(content)?;
        let (_, u) = self.resolve(tok)?;
        let comment = api::Comment {
            id: CommentId(Uuid::new_v4().to_string()),
            content: String::from(content),
            created_at: chrono::Utc::now(),
            author: api::Author {
                username: u.name.clone(),
                avatar: None,
            },
            replies: Vec::new(),
        };
        let thread = self
            .threads
            .get_mut(post)
            .ok_or_else(|| Error::NotFound(format!("no post {post}")))?;
        match parent {
            None => thread.insert(0, comment.clone()),
            Some(p) => find_comment_mut(thread, p)
                .ok_or_else(|| Error::NotFound(format!("no comment {p}")))?
                .replies
                .push(comment.clone()),
        }

        // let the post's author know
        let post_author = self.posts.iter().find(|p| p.id == *post).map(|p| &p.author);
        let recipient = self.users.iter_mut().find(|(_, u)| {
            post_author.map(|a| a.username == u.name).unwrap_or(false)
                && u.name != comment.author.username
        });
        if let Some((_, u)) = recipient {
            u.relay(Notification {
                id: NotificationId(Uuid::new_v4().to_string()),
                title: format!("{} commented on your post", comment.author.username),
                body: comment.content.clone(),
                read: false,
                created_at: comment.created_at,
            });
        }
        Ok(comment)
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

fn page_of<T: Clone>(all: &[T], req: PageRequest) -> (Vec<T>, bool) {
    let start = (req.token as usize).saturating_mul(req.size);
    let items = all.iter().skip(start).take(req.size).cloned().collect();
    (items, start.saturating_add(req.size) >= all.len())
}

fn find_comment_mut<'a>(
    comments: &'a mut [api::Comment],
    id: &CommentId,
) -> Option<&'a mut api::Comment> {
    for c in comments.iter_mut() {
        if c.id == *id {
            return Some(c);
        }
        if let Some(found) = find_comment_mut(&mut c.replies, id) {
            return Some(found);
        }
    }
    None
}

pub type SharedServer = Arc<Mutex<MockServer>>;

fn parse_page<T: DeserializeOwned>(res: Result<Value, Error>) -> Result<Page<T>, Error> {
    res.map(Page::from_json)
}

/// Boarding zones of one landlord
pub struct ZoneFeed {
    pub server: SharedServer,
    pub owner: UserId,
}

#[async_trait]
impl PageFetcher<Zone> for ZoneFeed {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<Zone>, Error> {
        tokio::task::yield_now().await;
        parse_page(self.server.lock().fetch_zones(&self.owner, req))
    }
}

pub struct RoomFeed {
    pub server: SharedServer,
    pub zone: ZoneId,
}

#[async_trait]
impl PageFetcher<Room> for RoomFeed {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<Room>, Error> {
        tokio::task::yield_now().await;
        parse_page(self.server.lock().fetch_rooms(&self.zone, req))
    }
}

pub struct NotificationFeed {
    pub server: SharedServer,
    pub token: AuthToken,
}

#[async_trait]
impl PageFetcher<Notification> for NotificationFeed {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<Notification>, Error> {
        tokio::task::yield_now().await;
        parse_page(self.server.lock().fetch_notifications(&self.token, req))
    }
}

pub struct SearchFeed {
    pub server: SharedServer,
    pub query: String,
}

#[async_trait]
impl PageFetcher<Post> for SearchFeed {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<Post>, Error> {
        tokio::task::yield_now().await;
        parse_page(self.server.lock().search_posts(&self.query, req))
    }
}

/// Comments of one post, as written by the owner of `token`
pub struct PostComments {
    pub server: SharedServer,
    pub token: AuthToken,
    pub post: PostId,
}

#[async_trait]
impl CommentPoster for PostComments {
    async fn post_comment(
        &self,
        parent: Option<&CommentId>,
        content: &str,
    ) -> Result<api::Comment, Error> {
        tokio::task::yield_now().await;
        self.server
            .lock()
            .post_comment(&self.token, &self.post, parent, content)
    }
}
