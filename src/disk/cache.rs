//! Memoized decode results, keyed by catalog entry.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::applefile::{DecodedFile, RenderOptions};
use crate::disk::entry::EntryId;

struct CachedDecode {
    options: RenderOptions,
    file: Rc<DecodedFile>,
}

/// Holds the decoded form of each entry that has been looked at.  An image
/// is reused only when it was rendered with the options now asked for; other
/// results do not depend on the options and are always reused.
#[derive(Default)]
pub struct DecodeCache {
    entries: HashMap<EntryId, CachedDecode>,
}

impl DecodeCache {
    pub fn new() -> DecodeCache {
        DecodeCache::default()
    }

    /// The cached result for `id`, if one exists that is valid under
    /// `options`.
    pub fn get(&self, id: EntryId, options: RenderOptions) -> Option<Rc<DecodedFile>> {
        let cached = self.entries.get(&id)?;
        if cached.file.is_image() && cached.options != options {
            return None;
        }
        Some(cached.file.clone())
    }

    /// Return the cached result for `id`, or run `decode` and remember what
    /// it produces.
    pub fn get_or_decode<F>(&mut self, id: EntryId, options: RenderOptions, decode: F) -> Rc<DecodedFile>
    where
        F: FnOnce() -> DecodedFile,
    {
        if let Some(file) = self.get(id, options) {
            return file;
        }
        debug!("decoding entry {}", id);
        let file = Rc::new(decode());
        self.entries.insert(
            id,
            CachedDecode {
                options,
                file: file.clone(),
            },
        );
        file
    }

    /// Forget the result for one entry.  Returns true if there was one.
    pub fn invalidate(&mut self, id: EntryId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
