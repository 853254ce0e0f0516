use anyhow::Context;
use async_trait::async_trait;
use nhatro_client::{
    api::{self, AuthToken, CommentId, Error, Keyed, Page, PageRequest},
    CommentNode, CommentPoster, CommentThread, CommentTree, LoadStatus, LoaderConfig,
    PageFetcher, PagedLoader,
};
use serde::de::DeserializeOwned;

lazy_static::lazy_static! {
    static ref CLIENT: reqwest::Client = reqwest::Client::new();
}

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base URL of the backend
    #[structopt(short, long)]
    host: String,

    /// Number of entries requested at once
    #[structopt(long, default_value = "20")]
    page_size: usize,

    /// Stop after this many pages
    #[structopt(long, default_value = "5")]
    max_pages: usize,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List the boarding zones of a landlord
    Zones {
        /// User id of the landlord
        owner: String,
    },

    /// List the rooms of a boarding zone
    Rooms { zone: String },

    /// List your notifications
    Notifications,

    /// Search discussion posts
    Search { query: String },

    /// Print the comment thread of a post
    Comments { post: String },

    /// Comment on a post
    Comment {
        post: String,

        /// Id of the comment to reply to
        #[structopt(long)]
        reply_to: Option<String>,

        content: String,
    },
}

fn token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("NHATRO_TOKEN").context("retrieving NHATRO_TOKEN environment variable")?;
    Ok(AuthToken(tok))
}

fn network_error(e: reqwest::Error) -> Error {
    match e.is_timeout() {
        true => Error::Timeout,
        false => Error::Network(e.to_string()),
    }
}

async fn read_json<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, Error> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(network_error)?;
    if !status.is_success() {
        return Err(Error::from_response(status, &body));
    }
    serde_json::from_slice(&body).map_err(|e| Error::Unknown(format!("parsing response: {e}")))
}

/// A paginated endpoint, called with `?page=<token>&size=<size>`
struct HttpFeed {
    url: String,
    token: Option<AuthToken>,
    params: Vec<(&'static str, String)>,
}

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> PageFetcher<T> for HttpFeed {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<T>, Error> {
        let mut r = CLIENT
            .get(&self.url)
            .query(&self.params)
            .query(&[("page", req.token)])
            .query(&[("size", req.size)]);
        if let Some(tok) = &self.token {
            r = r.bearer_auth(&tok.0);
        }
        let body: serde_json::Value = read_json(r.send().await.map_err(network_error)?).await?;
        Ok(Page::from_json(body))
    }
}

struct HttpPoster {
    url: String,
    token: AuthToken,
}

#[async_trait]
impl CommentPoster for HttpPoster {
    async fn post_comment(
        &self,
        parent: Option<&CommentId>,
        content: &str,
    ) -> Result<api::Comment, Error> {
        let resp = CLIENT
            .post(&self.url)
            .bearer_auth(&self.token.0)
            .json(&serde_json::json!({
                "content": content,
                "parentId": parent,
            }))
            .send()
            .await
            .map_err(network_error)?;
        read_json(resp).await
    }
}

async fn print_pages<T, F>(
    opt: &Opt,
    fetcher: F,
    display: impl Fn(&T) -> String,
) -> anyhow::Result<()>
where
    T: Keyed,
    F: PageFetcher<T>,
{
    let loader = PagedLoader::new(
        LoaderConfig::default().with_page_size(opt.page_size),
        fetcher,
    );
    let mut printed = 0;
    for _ in 0..opt.max_pages {
        let state = loader.load_next_page().await;
        for item in state.items.iter().skip(printed) {
            println!("{}", display(item));
        }
        printed = state.items.len();
        if let (LoadStatus::Error, Some(err)) = (state.status, &state.last_error) {
            return Err(err.clone()).context("fetching next page");
        }
        if !state.has_more {
            return Ok(());
        }
    }
    tracing::info!(max_pages = opt.max_pages, "stopping with more pages available");
    Ok(())
}

async fn fetch_comments(host: &str, post: &str) -> anyhow::Result<Vec<api::Comment>> {
    let resp = CLIENT
        .get(format!("{host}/api/posts/{post}/comments"))
        .send()
        .await
        .context("fetching comments")?;
    Ok(read_json(resp).await.context("fetching comments")?)
}

fn print_thread<'a>(nodes: impl IntoIterator<Item = &'a CommentNode>, depth: usize) {
    for c in nodes {
        println!(
            "{:indent$}[{}] {} ({}): {}",
            "",
            c.id,
            c.author.username,
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.content,
            indent = 2 * depth,
        );
        print_thread(&c.replies, depth + 1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let host = opt.host.trim_end_matches('/');

    match &opt.cmd {
        Command::Zones { owner } => {
            let feed = HttpFeed {
                url: format!("{host}/api/boarding-zones/owner/{owner}"),
                token: token().ok(),
                params: Vec::new(),
            };
            print_pages(&opt, feed, |z: &api::Zone| {
                format!(
                    "{}\t{}\t{}\t{}-{} VND",
                    z.id, z.name, z.address, z.min_price, z.max_price
                )
            })
            .await?;
        }
        Command::Rooms { zone } => {
            let feed = HttpFeed {
                url: format!("{host}/api/boarding-zones/{zone}/rooms"),
                token: token().ok(),
                params: Vec::new(),
            };
            print_pages(&opt, feed, |r: &api::Room| {
                format!(
                    "{}\t{}\t{} VND\t{} m²\t{}",
                    r.id,
                    r.name,
                    r.price,
                    r.area,
                    match r.available {
                        true => "available",
                        false => "taken",
                    }
                )
            })
            .await?;
        }
        Command::Notifications => {
            let feed = HttpFeed {
                url: format!("{host}/api/notifications"),
                token: Some(token()?),
                params: Vec::new(),
            };
            print_pages(&opt, feed, |n: &api::Notification| {
                format!(
                    "{} {}\t{}\t{}",
                    if n.read { " " } else { "*" },
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.title,
                    n.body
                )
            })
            .await?;
        }
        Command::Search { query } => {
            let feed = HttpFeed {
                url: format!("{host}/api/posts/search"),
                token: token().ok(),
                params: vec![("q", query.clone())],
            };
            print_pages(&opt, feed, |p: &api::Post| {
                format!("{}\t{}\t{}", p.id, p.author.username, p.title)
            })
            .await?;
        }
        Command::Comments { post } => {
            let thread = CommentTree::from_comments(fetch_comments(host, post).await?);
            print_thread(thread.roots(), 0);
        }
        Command::Comment {
            post,
            reply_to,
            content,
        } => {
            let tok = token()?;
            let poster = HttpPoster {
                url: format!("{host}/api/posts/{post}/comments"),
                token: tok.clone(),
            };
            let me: api::Author = read_json(
                CLIENT
                    .get(format!("{host}/api/users/me"))
                    .bearer_auth(&tok.0)
                    .send()
                    .await
                    .context("fetching own profile")?,
            )
            .await
            .context("fetching own profile")?;
            let thread = CommentThread::new(poster, me, fetch_comments(host, post).await?);
            let parent = reply_to.as_deref().map(CommentId::from);
            let posted = thread
                .submit(parent.as_ref(), content)
                .await
                .context("posting comment")?;
            println!("{}", posted.id);
        }
    }

    Ok(())
}
