use crate::entry::Snapshot;
use hashlink::LinkedHashMap;

/// Files sharing one content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub sha1: String,
    /// Relative paths in traversal order.
    pub paths: Vec<String>,
}

/// Group the snapshot's files by content hash and keep groups of two or more.
///
/// Groups come out in the order their hash first appears in a depth-first walk.
/// Files whose hash was never computed are left out.
pub fn find_duplicates(snapshot: &Snapshot) -> Vec<DuplicateGroup> {
    let mut by_hash: LinkedHashMap<&str, Vec<String>> = LinkedHashMap::new();

    for (path, file) in snapshot.files() {
        if file.sha1.is_empty() {
            continue;
        }
        match by_hash.get_mut(file.sha1.as_str()) {
            Some(paths) => paths.push(path),
            None => {
                by_hash.insert(file.sha1.as_str(), vec![path]);
            }
        }
    }

    by_hash
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(sha1, paths)| DuplicateGroup {
            sha1: sha1.to_string(),
            paths,
        })
        .collect()
}
