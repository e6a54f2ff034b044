//! Depth-first walk over a repository subtree

use crate::path::canonicalize;
use crate::repository::{Entry, RepositoryReader};

/// Visit every entity below `root` in pre-order.
///
/// At each collection, `object_op` runs on its direct data objects, then each
/// child collection gets `collection_op` before its own contents are visited.
/// `root` itself is not passed to either operation. The first error stops
/// the walk; work already done is kept.
pub fn crawl<C, O>(
    session: &dyn RepositoryReader,
    root: &str,
    mut collection_op: C,
    mut object_op: O,
) -> crate::Result<()>
where
    C: FnMut(&Entry) -> crate::Result<()>,
    O: FnMut(&Entry) -> crate::Result<()>,
{
    let root = canonicalize(root);
    let mut stack: Vec<Option<Entry>> = vec![None];

    while let Some(node) = stack.pop() {
        let path = match &node {
            Some(entry) => {
                collection_op(entry)?;
                entry.path.as_str()
            }
            None => root.as_str(),
        };

        for object in session.child_data_objects(path)? {
            object_op(&object)?;
        }

        // Reversed so the first child is popped first
        let children = session.child_collections(path)?;
        stack.extend(children.into_iter().rev().map(Some));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::error::SyncError;
    use crate::repository::{MemoryRepository, SessionFactory};

    fn sample() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.add_collection("/z/a", "alice", 1)
            .add_data_object("/z/a/top.txt", "alice", 1, "text", 1)
            .add_collection("/z/a/b", "alice", 1)
            .add_data_object("/z/a/b/one.txt", "alice", 1, "text", 1)
            .add_collection("/z/a/b/c", "alice", 1)
            .add_data_object("/z/a/b/c/deep.txt", "alice", 1, "text", 1)
            .add_collection("/z/a/d", "alice", 1)
            .add_data_object("/z/a/d/two.txt", "alice", 1, "text", 1);
        repo
    }

    /// Call-stack formulation the iterative walk must agree with
    fn recursive(session: &dyn RepositoryReader, path: &str, out: &mut Vec<String>) {
        for object in session.child_data_objects(path).unwrap() {
            out.push(object.path);
        }
        for child in session.child_collections(path).unwrap() {
            out.push(child.path.clone());
            recursive(session, &child.path, out);
        }
    }

    #[test]
    fn test_order_matches_recursive_preorder() {
        let repo = sample();
        let session = repo.open(&RepositoryConfig::default()).unwrap();

        let visited = std::cell::RefCell::new(Vec::new());
        crawl(
            &session,
            "/z/a",
            |c| {
                visited.borrow_mut().push(c.path.clone());
                Ok(())
            },
            |o| {
                visited.borrow_mut().push(o.path.clone());
                Ok(())
            },
        )
        .unwrap();

        let mut expected = Vec::new();
        recursive(&session, "/z/a", &mut expected);
        assert_eq!(visited.into_inner(), expected);
        assert_eq!(expected.len(), 7);
        assert!(!expected.contains(&"/z/a".to_string()));
    }

    #[test]
    fn test_error_stops_the_walk() {
        let repo = sample();
        let session = repo.open(&RepositoryConfig::default()).unwrap();

        let mut objects = 0;
        let result = crawl(
            &session,
            "/z/a",
            |c| {
                if c.path == "/z/a/b/c" {
                    return Err(SyncError::EntityNotFound(c.path.clone()));
                }
                Ok(())
            },
            |_| {
                objects += 1;
                Ok(())
            },
        );

        assert!(matches!(result, Err(SyncError::EntityNotFound(_))));
        // top.txt and one.txt were visited before the failure
        assert_eq!(objects, 2);
    }

    #[test]
    fn test_leaf_collection_visits_nothing() {
        let repo = sample();
        let session = repo.open(&RepositoryConfig::default()).unwrap();
        let mut calls = 0;
        crawl(
            &session,
            "/z/a/b/c/deep.txt",
            |_| {
                calls += 1;
                Ok(())
            },
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(calls, 0);
    }
}
