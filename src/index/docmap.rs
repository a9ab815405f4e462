//! Bidirectional mapping between external document keys and internal IDs.
//!
//! Internal IDs are unsigned 32-bit, assigned monotonically starting at 1,
//! and stable for the lifetime of a build. Persisted as a flat text file,
//! one `doc_key \t doc_id` row per document, in doc_id order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;

use crate::error::{Result, SedgeError};

/// Bidirectional doc_key ↔ doc_id map.
#[derive(Debug, Default)]
pub struct DocIdMap {
    key_to_id: AHashMap<String, u32>,
    // Index 0 unused; ids start at 1.
    id_to_key: Vec<String>,
}

impl DocIdMap {
    pub fn new() -> Self {
        DocIdMap {
            key_to_id: AHashMap::new(),
            id_to_key: vec![String::new()],
        }
    }

    /// Return the ID for `doc_key`, assigning the next one if unseen.
    pub fn get_or_assign(&mut self, doc_key: &str) -> u32 {
        if let Some(&id) = self.key_to_id.get(doc_key) {
            return id;
        }
        let id = self.id_to_key.len() as u32;
        self.key_to_id.insert(doc_key.to_string(), id);
        self.id_to_key.push(doc_key.to_string());
        id
    }

    /// Look up the internal ID of a key.
    pub fn id(&self, doc_key: &str) -> Option<u32> {
        self.key_to_id.get(doc_key).copied()
    }

    /// Look up the key of an internal ID.
    pub fn key(&self, doc_id: u32) -> Option<&str> {
        if doc_id == 0 {
            return None;
        }
        self.id_to_key.get(doc_id as usize).map(|s| s.as_str())
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.id_to_key.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(doc_id, doc_key)` in doc_id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.id_to_key
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, key)| (id as u32, key.as_str()))
    }

    /// Persist as `doc_key \t doc_id` rows in doc_id order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (id, key) in self.iter() {
            writeln!(writer, "{key}\t{id}")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a previously saved map.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SedgeError::corrupt(format!("cannot open docid map {}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);

        let mut map = DocIdMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (key, id_str) = line.rsplit_once('\t').ok_or_else(|| {
                SedgeError::corrupt(format!("docid map line {} has no tab", line_no + 1))
            })?;
            let id: u32 = id_str.parse().map_err(|_| {
                SedgeError::corrupt(format!("docid map line {}: bad id {id_str:?}", line_no + 1))
            })?;
            if id as usize != map.id_to_key.len() {
                return Err(SedgeError::corrupt(format!(
                    "docid map line {}: id {} out of order",
                    line_no + 1,
                    id
                )));
            }
            map.key_to_id.insert(key.to_string(), id);
            map.id_to_key.push(key.to_string());
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_is_stable_and_one_based() {
        let mut map = DocIdMap::new();
        assert_eq!(map.get_or_assign("PMC1"), 1);
        assert_eq!(map.get_or_assign("PMC2"), 2);
        assert_eq!(map.get_or_assign("PMC1"), 1);
        assert_eq!(map.len(), 2);

        assert_eq!(map.id("PMC2"), Some(2));
        assert_eq!(map.key(2), Some("PMC2"));
        assert_eq!(map.key(0), None);
        assert_eq!(map.key(3), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docid_map.txt");

        let mut map = DocIdMap::new();
        map.get_or_assign("PMC9");
        map.get_or_assign("PMC4");
        map.save(&path).unwrap();

        let loaded = DocIdMap::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.id("PMC9"), Some(1));
        assert_eq!(loaded.key(2), Some("PMC4"));
    }

    #[test]
    fn test_load_rejects_out_of_order_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docid_map.txt");
        std::fs::write(&path, "PMC1\t2\n").unwrap();
        assert!(DocIdMap::load(&path).is_err());
    }
}
