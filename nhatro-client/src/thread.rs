use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    api::{self, Author, CommentId, Error},
    CommentNode, CommentTree,
};

/// The backend side of a comment thread
#[async_trait]
pub trait CommentPoster {
    /// Publish `content`, as a reply to `parent` or as a top-level comment
    async fn post_comment(
        &self,
        parent: Option<&CommentId>,
        content: &str,
    ) -> Result<api::Comment, Error>;
}

/// The comment thread of a post, as seen by `author`.
///
/// Comments submitted from here show up at once, flagged as pending, and get
/// swapped for the server's version once it acknowledges them.
pub struct CommentThread<P> {
    poster: P,
    author: Author,
    tree: Mutex<CommentTree>,
}

impl<P: CommentPoster> CommentThread<P> {
    pub fn new(poster: P, author: Author, comments: Vec<api::Comment>) -> CommentThread<P> {
        CommentThread {
            poster,
            author,
            tree: Mutex::new(CommentTree::from_comments(comments)),
        }
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn tree(&self) -> CommentTree {
        self.tree.lock().clone()
    }

    pub async fn submit(
        &self,
        parent: Option<&CommentId>,
        content: &str,
    ) -> Result<CommentNode, Error> {
        api::validate_string(content)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidRequest(String::from("comment is empty")));
        }

        let optimistic = CommentNode::pending(String::from(content), self.author.clone());
        let temp_id = optimistic.id.clone();
        {
            let mut tree = self.tree.lock();
            *tree = match parent {
                Some(p) if p.is_temporary() => {
                    return Err(Error::CommentStillPending(p.0.clone()));
                }
                Some(p) if !tree.contains(p) => return Err(Error::NotFound(p.0.clone())),
                Some(p) => tree.insert_reply(p, optimistic),
                None => tree.prepend_root(optimistic),
            };
        }

        let res = self.poster.post_comment(parent, content).await;

        let mut tree = self.tree.lock();
        match res {
            Ok(comment) => {
                let confirmed = CommentNode::from(comment);
                *tree = match tree.contains(&confirmed.id) {
                    // already delivered through `receive`
                    true => tree.remove(&temp_id),
                    false => tree.replace_by_temp_id(&temp_id, confirmed.clone()),
                };
                Ok(confirmed)
            }
            Err(err) => {
                tracing::warn!(%err, "failed posting comment, dropping optimistic copy");
                *tree = tree.remove(&temp_id);
                Err(err)
            }
        }
    }

    /// Record a comment pushed by the server, eg. from another user.
    ///
    /// Returns `false` if it was already known or its parent is not.
    pub fn receive(&self, parent: Option<&CommentId>, comment: api::Comment) -> bool {
        let mut tree = self.tree.lock();
        if tree.contains(&comment.id) {
            return false;
        }
        let node = CommentNode::from(comment);
        match parent {
            Some(p) if !tree.contains(p) => {
                tracing::debug!(parent = %p, id = %node.id, "dropping reply to unknown comment");
                false
            }
            Some(p) => {
                *tree = tree.insert_reply(p, node);
                true
            }
            None => {
                *tree = tree.prepend_root(node);
                true
            }
        }
    }
}
