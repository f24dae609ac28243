use serde::Serialize;

use super::cipher::{CipherRecord, CollectionRecord, FolderRecord};

/// Positional edge: `(cipher index, folder or collection index)`.
pub type Relationship = (usize, usize);

/// Canonical, unencrypted output of one parse call.
///
/// Relationships are private so that every edge goes through
/// [`ImportResult::link_folder`] / [`ImportResult::link_collection`], which
/// refuse indices that point past the folder or collection list. The cipher
/// side may name the cipher about to be pushed (`ciphers.len()`), since
/// importers record the edge before appending the item.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub missing_password: bool,
    pub error_message: Option<String>,
    pub ciphers: Vec<CipherRecord>,
    pub folders: Vec<FolderRecord>,
    pub collections: Vec<CollectionRecord>,
    folder_relationships: Vec<Relationship>,
    collection_relationships: Vec<Relationship>,
}

impl ImportResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Failed parse that a password would fix.
    pub fn password_required() -> Self {
        Self {
            missing_password: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.ciphers.is_empty()
    }

    pub fn folder_relationships(&self) -> &[Relationship] {
        &self.folder_relationships
    }

    pub fn collection_relationships(&self) -> &[Relationship] {
        &self.collection_relationships
    }

    pub fn folder_index(&self, name: &str) -> Option<usize> {
        self.folders.iter().position(|f| f.name == name)
    }

    pub fn collection_index(&self, name: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.name == name)
    }

    pub fn add_folder(&mut self, name: impl Into<String>) -> usize {
        self.folders.push(FolderRecord { name: name.into() });
        self.folders.len() - 1
    }

    pub fn add_collection(&mut self, name: impl Into<String>) -> usize {
        self.collections.push(CollectionRecord::new(name));
        self.collections.len() - 1
    }

    /// Record a folder edge. Returns false (and records nothing) when either
    /// index cannot be valid.
    pub fn link_folder(&mut self, cipher: usize, folder: usize) -> bool {
        if cipher > self.ciphers.len() || folder >= self.folders.len() {
            return false;
        }
        insert_unique(&mut self.folder_relationships, (cipher, folder));
        true
    }

    pub fn link_collection(&mut self, cipher: usize, collection: usize) -> bool {
        if cipher > self.ciphers.len() || collection >= self.collections.len() {
            return false;
        }
        insert_unique(&mut self.collection_relationships, (cipher, collection));
        true
    }

    /// Drop edges whose cipher was never pushed.
    pub fn prune_relationships(&mut self) {
        let count = self.ciphers.len();
        self.folder_relationships.retain(|&(c, _)| c < count);
        self.collection_relationships.retain(|&(c, _)| c < count);
    }

    /// Organization imports carry collections, not folders.
    pub fn move_folders_to_collections(&mut self) {
        let offset = self.collections.len();
        for folder in self.folders.drain(..) {
            self.collections.push(CollectionRecord::new(folder.name));
        }
        for (cipher, folder) in std::mem::take(&mut self.folder_relationships) {
            insert_unique(&mut self.collection_relationships, (cipher, folder + offset));
        }
    }

    /// Nest every folder under `target`, which becomes folder 0. Items with
    /// no folder land in the target itself.
    pub fn nest_folders_under(&mut self, target: &str) {
        for folder in &mut self.folders {
            folder.name = format!("{}/{}", target, folder.name);
        }
        self.folders.insert(
            0,
            FolderRecord {
                name: target.to_string(),
            },
        );
        self.folder_relationships =
            reroot(&self.folder_relationships, self.ciphers.len());
    }

    pub fn nest_collections_under(&mut self, target: &str) {
        for collection in &mut self.collections {
            collection.name = format!("{}/{}", target, collection.name);
        }
        self.collections.insert(0, CollectionRecord::new(target));
        self.collection_relationships =
            reroot(&self.collection_relationships, self.ciphers.len());
    }

    /// Keep only ciphers matching `keep`, re-indexing relationships so none
    /// dangle. Returns how many ciphers were removed.
    pub fn retain_ciphers<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&CipherRecord) -> bool,
    {
        let mut remap = Vec::with_capacity(self.ciphers.len());
        let mut kept = Vec::with_capacity(self.ciphers.len());
        for cipher in self.ciphers.drain(..) {
            if keep(&cipher) {
                remap.push(Some(kept.len()));
                kept.push(cipher);
            } else {
                remap.push(None);
            }
        }
        let removed = remap.len() - kept.len();
        self.ciphers = kept;

        let reindex = |rels: &[Relationship]| -> Vec<Relationship> {
            rels.iter()
                .filter_map(|&(c, t)| remap.get(c).copied().flatten().map(|n| (n, t)))
                .collect()
        };
        self.folder_relationships = reindex(&self.folder_relationships);
        self.collection_relationships = reindex(&self.collection_relationships);
        removed
    }
}

fn insert_unique(rels: &mut Vec<Relationship>, rel: Relationship) {
    if !rels.contains(&rel) {
        rels.push(rel);
    }
}

// Shift every edge by one and attach orphan ciphers to index 0.
fn reroot(rels: &[Relationship], cipher_count: usize) -> Vec<Relationship> {
    let mut out: Vec<Relationship> = (0..cipher_count)
        .filter(|i| !rels.iter().any(|&(c, _)| c == *i))
        .map(|i| (i, 0))
        .collect();
    out.extend(rels.iter().map(|&(c, t)| (c, t + 1)));
    out
}
