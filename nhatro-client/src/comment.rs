use chrono::Utc;

use crate::api::{self, Author, CommentId, Keyed, Time};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub id: CommentId,
    pub content: String,
    pub created_at: Time,
    pub author: Author,

    /// Set while the server has not acknowledged this comment yet
    pub pending: bool,

    /// Replies in display order
    pub replies: im::Vector<CommentNode>,
}

impl From<api::Comment> for CommentNode {
    fn from(c: api::Comment) -> CommentNode {
        CommentNode {
            id: c.id,
            content: c.content,
            created_at: c.created_at,
            author: c.author,
            pending: false,
            replies: c.replies.into_iter().map(CommentNode::from).collect(),
        }
    }
}

impl Keyed for CommentNode {
    type Key = CommentId;

    fn key(&self) -> CommentId {
        self.id.clone()
    }
}

impl CommentNode {
    pub fn new(id: CommentId, content: String, author: Author, created_at: Time) -> CommentNode {
        CommentNode {
            id,
            content,
            created_at,
            author,
            pending: false,
            replies: im::Vector::new(),
        }
    }

    /// An optimistic comment, shown before the server assigned it an id
    pub fn pending(content: String, author: Author) -> CommentNode {
        CommentNode {
            pending: true,
            ..CommentNode::new(CommentId::temporary(), content, author, Utc::now())
        }
    }

    fn count(&self) -> usize {
        1 + self.replies.iter().map(|r| r.count()).sum::<usize>()
    }
}

/// An ordered forest of comments.
///
/// All operations return a new tree and leave `self` untouched. Only the nodes
/// on the path to the edited node get rebuilt, every other subtree is shared
/// with the previous version.
///
/// Ids are expected to be unique across the whole forest. Should they not be,
/// lookups resolve to the first match in pre-order: a node, then its replies,
/// then its next sibling.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentTree {
    roots: im::Vector<CommentNode>,
}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree::default()
    }

    pub fn from_comments(comments: Vec<api::Comment>) -> CommentTree {
        CommentTree {
            roots: comments.into_iter().map(CommentNode::from).collect(),
        }
    }

    pub fn roots(&self) -> &im::Vector<CommentNode> {
        &self.roots
    }

    /// Number of comments at all depths
    pub fn len(&self) -> usize {
        self.roots.iter().map(|c| c.count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        let path = path_to(&self.roots, id)?;
        let (&first, rest) = path.split_first()?;
        let mut node = self.roots.get(first)?;
        for &i in rest {
            node = node.replies.get(i)?;
        }
        Some(node)
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        path_to(&self.roots, id).is_some()
    }

    /// Append `reply` to the replies of `parent_id`.
    ///
    /// If `parent_id` is nowhere in the tree, the tree is returned unchanged.
    pub fn insert_reply(&self, parent_id: &CommentId, reply: CommentNode) -> CommentTree {
        self.edit_first(parent_id, move |parent| {
            let mut parent = parent.clone();
            parent.replies.push_back(reply);
            Some(parent)
        })
    }

    /// Add a top-level comment in front of all others
    pub fn prepend_root(&self, node: CommentNode) -> CommentTree {
        let mut roots = self.roots.clone();
        roots.push_front(node);
        CommentTree { roots }
    }

    /// Swap the optimistic comment `temp_id` for its server-acknowledged version.
    ///
    /// Replies already attached to the optimistic comment are kept after the
    /// ones carried by `confirmed`.
    pub fn replace_by_temp_id(&self, temp_id: &CommentId, confirmed: CommentNode) -> CommentTree {
        self.edit_first(temp_id, move |optimistic| {
            let mut confirmed = confirmed;
            confirmed.replies.append(optimistic.replies.clone());
            Some(confirmed)
        })
    }

    /// Drop the comment `id` along with its replies
    pub fn remove(&self, id: &CommentId) -> CommentTree {
        self.edit_first(id, |_| None)
    }

    fn edit_first<F>(&self, id: &CommentId, edit: F) -> CommentTree
    where
        F: FnOnce(&CommentNode) -> Option<CommentNode>,
    {
        match path_to(&self.roots, id) {
            Some(path) => CommentTree {
                roots: rebuild(&self.roots, &path, edit),
            },
            None => {
                tracing::debug!(?id, "comment is not in the tree, leaving it unchanged");
                self.clone()
            }
        }
    }
}

/// Indices leading to the first node with id `id`, in pre-order
fn path_to(nodes: &im::Vector<CommentNode>, id: &CommentId) -> Option<Vec<usize>> {
    for (i, c) in nodes.iter().enumerate() {
        if c.id == *id {
            return Some(vec![i]);
        }
        if let Some(mut path) = path_to(&c.replies, id) {
            path.insert(0, i);
            return Some(path);
        }
    }
    None
}

fn rebuild<F>(nodes: &im::Vector<CommentNode>, path: &[usize], edit: F) -> im::Vector<CommentNode>
where
    F: FnOnce(&CommentNode) -> Option<CommentNode>,
{
    let mut nodes = nodes.clone();
    let (&i, rest) = match path.split_first() {
        Some(split) => split,
        None => return nodes,
    };
    if i >= nodes.len() {
        return nodes;
    }
    if rest.is_empty() {
        match edit(&nodes[i]) {
            Some(c) => {
                nodes.set(i, c);
            }
            None => {
                nodes.remove(i);
            }
        }
    } else {
        let mut c = nodes[i].clone();
        c.replies = rebuild(&c.replies, rest, edit);
        nodes.set(i, c);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn node(id: &str, replies: Vec<CommentNode>) -> CommentNode {
        CommentNode {
            replies: replies.into_iter().collect(),
            ..CommentNode::new(
                CommentId::from(id),
                format!("comment {id}"),
                Author {
                    username: String::from("khach"),
                    avatar: None,
                },
                Utc.timestamp_millis_opt(1_694_000_000_000).unwrap(),
            )
        }
    }

    fn tree(roots: Vec<CommentNode>) -> CommentTree {
        CommentTree {
            roots: roots.into_iter().collect(),
        }
    }

    fn reply_ids(t: &CommentTree, id: &str) -> Vec<String> {
        t.find(&CommentId::from(id))
            .unwrap()
            .replies
            .iter()
            .map(|r| r.id.0.clone())
            .collect()
    }

    #[test]
    fn reply_is_appended_last() {
        let before = tree(vec![
            node("c1", vec![node("r1", vec![]), node("r2", vec![])]),
            node("c2", vec![node("r4", vec![])]),
        ]);
        let mut reply = node("r3", vec![]);
        reply.content = String::from("hi");
        let after = before.insert_reply(&CommentId::from("c1"), reply.clone());

        assert_eq!(reply_ids(&after, "c1"), vec!["r1", "r2", "r3"]);
        assert_eq!(after.find(&CommentId::from("r3")), Some(&reply));
        assert_eq!(after.roots()[1], before.roots()[1]);
        assert_eq!(after.len(), before.len() + 1);
        // the input is left alone
        assert_eq!(reply_ids(&before, "c1"), vec!["r1", "r2"]);
    }

    #[test]
    fn unknown_parent_is_a_no_op() {
        let before = tree(vec![node("c1", vec![node("r1", vec![])])]);
        let after = before.insert_reply(&CommentId::from("nonexistent"), node("x", vec![]));
        assert_eq!(after, before);
    }

    #[test]
    fn deep_reply() {
        let before = tree(vec![node("a", vec![node("b", vec![])])]);
        let after = before.insert_reply(&CommentId::from("b"), node("c", vec![]));
        assert_eq!(
            after,
            tree(vec![node("a", vec![node("b", vec![node("c", vec![])])])])
        );
    }

    #[test]
    fn duplicated_ids_resolve_to_first_in_pre_order() {
        // "d" appears as a reply of the first root and as the second root
        let before = tree(vec![node("a", vec![node("d", vec![])]), node("d", vec![])]);
        let after = before.insert_reply(&CommentId::from("d"), node("n", vec![]));
        assert_eq!(
            after,
            tree(vec![
                node("a", vec![node("d", vec![node("n", vec![])])]),
                node("d", vec![]),
            ])
        );
    }

    #[test]
    fn new_roots_come_first() {
        let t = CommentTree::new()
            .prepend_root(node("old", vec![]))
            .prepend_root(node("new", vec![]));
        let ids: Vec<_> = t.roots().iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn confirming_an_optimistic_reply() {
        let author = Author {
            username: String::from("lan"),
            avatar: None,
        };
        let optimistic = CommentNode::pending(String::from("còn phòng không?"), author);
        let temp_id = optimistic.id.clone();
        let before = tree(vec![node("a", vec![])]);
        let optimistic_tree = before.insert_reply(&CommentId::from("a"), optimistic);
        assert!(optimistic_tree.find(&temp_id).unwrap().pending);

        let confirmed = node("srv-1", vec![]);
        let after = optimistic_tree.replace_by_temp_id(&temp_id, confirmed.clone());
        assert!(!after.contains(&temp_id));
        assert_eq!(after.find(&CommentId::from("srv-1")), Some(&confirmed));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn confirming_keeps_local_replies() {
        let before = tree(vec![node("tmp-1", vec![node("r", vec![])])]);
        let after = before.replace_by_temp_id(&CommentId::from("tmp-1"), node("real", vec![]));
        assert_eq!(after, tree(vec![node("real", vec![node("r", vec![])])]));
    }

    #[test]
    fn removing_drops_the_subtree() {
        let before = tree(vec![
            node("a", vec![node("b", vec![node("c", vec![])])]),
            node("d", vec![]),
        ]);
        let after = before.remove(&CommentId::from("b"));
        assert_eq!(after, tree(vec![node("a", vec![]), node("d", vec![])]));
        assert_eq!(before.remove(&CommentId::from("zzz")), before);
    }

    #[test]
    fn from_wire_comments() {
        let wire: Vec<api::Comment> = serde_json::from_str(
            r#"[{
                "id": "1",
                "content": "top",
                "createdAt": 1694000000000,
                "author": { "username": "u" },
                "replies": [{
                    "id": "2",
                    "content": "child",
                    "createdAt": 1694000000001,
                    "author": { "username": "v" }
                }]
            }]"#,
        )
        .unwrap();
        let t = CommentTree::from_comments(wire);
        assert_eq!(t.len(), 2);
        assert_eq!(t.find(&CommentId::from("2")).unwrap().content, "child");
    }

    // Builds a forest out of fuzzer bytes: each byte attaches a new node either
    // at the root or under a previously created node
    fn forest(shape: &[u8]) -> (CommentTree, Vec<CommentId>) {
        let mut t = CommentTree::new();
        let mut ids = Vec::new();
        for (i, b) in shape.iter().enumerate() {
            let n = node(&format!("n{i}"), vec![]);
            let id = n.id.clone();
            t = match (*b as usize) % (ids.len() + 1) {
                0 => t.prepend_root(n),
                p => t.insert_reply(&ids[p - 1], n),
            };
            ids.push(id);
        }
        (t, ids)
    }

    #[test]
    fn fuzz_insert_then_remove() {
        bolero::check!()
            .with_type::<(Vec<u8>, u8)>()
            .cloned()
            .for_each(|(shape, target)| {
                let (t, ids) = forest(&shape);
                assert_eq!(t.len(), ids.len());
                if ids.is_empty() {
                    return;
                }
                let parent = &ids[target as usize % ids.len()];
                let reply = node("fresh", vec![]);
                let inserted = t.insert_reply(parent, reply.clone());
                assert_eq!(inserted.len(), t.len() + 1);
                assert_eq!(
                    inserted.find(parent).unwrap().replies.last(),
                    Some(&reply)
                );
                assert_eq!(inserted.remove(&reply.id), t);
            })
    }
}
