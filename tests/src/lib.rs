//! Random fixtures for the mock server

use chrono::{Duration, TimeZone, Utc};
use nhatro_mock_server::{
    api::{
        self, Author, CommentId, Notification, NotificationId, Post, PostId, Room, RoomId,
        UserId, Zone, ZoneId,
    },
    Fixture, FixturePost, FixtureUser,
};
use rand::{seq::SliceRandom, Rng};

pub const NUM_USERS: usize = 6;
const NUM_LANDLORDS: usize = 2;

const NUM_ZONES: usize = 45;
const MAX_ROOMS_PER_ZONE: usize = 12;

const NUM_POSTS: usize = 30;
const POST_TITLE_LEN: usize = 8;
const POST_CONTENT_LEN: usize = 40;

const MAX_COMMENTS_PER_POST: usize = 6;
const MAX_REPLY_DEPTH: usize = 3;
const COMMENT_LEN: usize = 15;

const NUM_NOTIFICATIONS_PER_USER: usize = 25;

const STREETS: [&str; 6] = [
    "Nguyễn Trãi",
    "Cầu Giấy",
    "Xuân Thủy",
    "Trần Duy Hưng",
    "Láng Hạ",
    "Giải Phóng",
];

fn gen_date(rng: &mut impl Rng) -> api::Time {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    base + Duration::minutes(rng.gen_range(0..60 * 24 * 365))
}

fn gen_comment(rng: &mut impl Rng, users: &[FixtureUser], depth: usize) -> api::Comment {
    let num_replies = match depth < MAX_REPLY_DEPTH {
        true => rng.gen_range(0..3),
        false => 0,
    };
    api::Comment {
        id: CommentId(api::Uuid::new_v4().to_string()),
        content: lipsum::lipsum_words(rng.gen_range(1..COMMENT_LEN)),
        created_at: gen_date(rng),
        author: gen_author(rng, users),
        replies: (0..num_replies)
            .map(|_| gen_comment(rng, users, depth + 1))
            .collect(),
    }
}

fn gen_author(rng: &mut impl Rng, users: &[FixtureUser]) -> Author {
    Author {
        username: users.choose(rng).unwrap().name.clone(),
        avatar: None,
    }
}

/// A random set of users, zones, rooms and posts, the first users being the
/// landlords owning every zone
pub fn generate_fixture(rng: &mut impl Rng) -> Fixture {
    // Generate users, the first ones being landlords
    let mut users = (0..NUM_USERS)
        .map(|i| FixtureUser {
            id: UserId(api::Uuid::new_v4().to_string()),
            name: format!("{}{i}", lipsum::lipsum_words(1).to_lowercase()),
            notifications: Vec::new(),
        })
        .collect::<Vec<_>>();
    for u in users.iter_mut() {
        u.notifications = (0..NUM_NOTIFICATIONS_PER_USER)
            .map(|_| Notification {
                id: NotificationId(api::Uuid::new_v4().to_string()),
                title: lipsum::lipsum_title(),
                body: lipsum::lipsum_words(COMMENT_LEN),
                read: rng.gen(),
                created_at: gen_date(rng),
            })
            .collect();
        u.notifications
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    // Generate boarding zones and their rooms
    let mut zones = Vec::new();
    let mut rooms = Vec::new();
    for i in 0..NUM_ZONES {
        let min_price = 500_000 * rng.gen_range(2..8);
        let zone = Zone {
            id: ZoneId(api::Uuid::new_v4().to_string()),
            owner: users[i % NUM_LANDLORDS].id.clone(),
            name: format!("Nhà trọ {}", lipsum::lipsum_title()),
            address: format!(
                "{} {}, Hà Nội",
                rng.gen_range(1..300),
                STREETS.choose(rng).unwrap()
            ),
            min_price,
            max_price: min_price + 500_000 * rng.gen_range(0..4),
            created_at: gen_date(rng),
        };
        for r in 0..rng.gen_range(0..MAX_ROOMS_PER_ZONE) {
            rooms.push(Room {
                id: RoomId(api::Uuid::new_v4().to_string()),
                zone_id: zone.id.clone(),
                name: format!("P.{}", 101 + r),
                price: rng.gen_range(zone.min_price..=zone.max_price),
                area: rng.gen_range(12..35),
                available: rng.gen(),
            });
        }
        zones.push(zone);
    }

    // Generate discussion posts along with their comment threads
    let posts = (0..NUM_POSTS)
        .map(|_| FixturePost {
            post: Post {
                id: PostId(api::Uuid::new_v4().to_string()),
                title: lipsum::lipsum_words(POST_TITLE_LEN),
                content: lipsum::lipsum_words(POST_CONTENT_LEN),
                author: gen_author(rng, &users),
                created_at: gen_date(rng),
            },
            comments: (0..rng.gen_range(0..MAX_COMMENTS_PER_POST))
                .map(|_| gen_comment(rng, &users, 0))
                .collect(),
        })
        .collect();

    Fixture {
        users,
        zones,
        rooms,
        posts,
    }
}

#[cfg(test)]
mod tests {
    use nhatro_mock_server::MockServer;

    use super::*;

    #[test]
    fn generated_fixture_loads_into_the_mock_server() {
        let fixture = generate_fixture(&mut rand::thread_rng());
        let json = serde_json::to_string(&fixture).unwrap();
        let fixture: Fixture = serde_json::from_str(&json).unwrap();
        let post_ids = fixture
            .posts
            .iter()
            .map(|p| p.post.id.clone())
            .collect::<Vec<_>>();

        let mut server = MockServer::from_fixture(fixture).unwrap();
        assert_eq!(server.test_num_users(), NUM_USERS);
        for id in post_ids {
            server.fetch_comments(&id).unwrap();
        }
    }
}
