//! Asset loader for model files on disk
//!
//! Reads the file in chunks and reports the same event sequence the
//! browser fetch does: `LoadStarted`, any number of `LoadProgress`, then
//! `Loaded` or `LoadFailed`. Decoding is left to the core.

use relic::{AssetEvent, AssetLoadedData, AssetType};
use std::io::Read;
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 256 * 1024;

pub struct AssetLoader {
    /// Base path for resolving relative asset paths
    base_path: Option<PathBuf>,
    chunk_size: usize,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self {
            base_path: None,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn set_base_path(&mut self, path: impl AsRef<Path>) {
        self.base_path = Some(path.as_ref().to_path_buf());
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        match &self.base_path {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    /// Load `path`, returning the events to feed to the core in order.
    pub fn load(&self, asset_id: &str, path: &str) -> Vec<AssetEvent> {
        let full_path = self.resolve(path);
        log::info!("Loading asset {} from {:?}", asset_id, full_path);

        let mut events = vec![AssetEvent::LoadStarted {
            asset_id: asset_id.to_string(),
            path: path.to_string(),
        }];

        match self.read(asset_id, &full_path, &mut events) {
            Ok(bytes) => events.push(AssetEvent::Loaded(AssetLoadedData {
                asset_id: asset_id.to_string(),
                path: path.to_string(),
                asset_type: AssetType::from_path(path),
                bytes,
            })),
            Err(e) => events.push(AssetEvent::LoadFailed {
                asset_id: asset_id.to_string(),
                error: format!("{}: {}", full_path.display(), e),
            }),
        }
        events
    }

    fn read(&self, asset_id: &str, path: &Path, events: &mut Vec<AssetEvent>) -> std::io::Result<Vec<u8>> {
        let mut file = std::fs::File::open(path)?;
        let total = file.metadata().ok().map(|m| m.len());
        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; self.chunk_size];

        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            events.push(AssetEvent::LoadProgress {
                asset_id: asset_id.to_string(),
                loaded: bytes.len() as u64,
                total,
            });
        }
        Ok(bytes)
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, len: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("relic-{}-{}", std::process::id(), name));
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    #[test]
    fn test_load_reports_progress_then_bytes() {
        let path = temp_file("progress.glb", 10);
        let loader = AssetLoader {
            base_path: path.parent().map(Path::to_path_buf),
            chunk_size: 4,
        };
        let name = path.file_name().unwrap().to_str().unwrap();

        let events = loader.load("subject", name);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(&events[0], AssetEvent::LoadStarted { asset_id, .. } if asset_id == "subject"));
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AssetEvent::LoadProgress { loaded, total, .. } => Some((*loaded, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]);
        match events.last().unwrap() {
            AssetEvent::Loaded(data) => {
                assert_eq!(data.bytes.len(), 10);
                assert_eq!(data.asset_type, AssetType::Glb);
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_fails() {
        let loader = AssetLoader::new();
        let events = loader.load("subject", "/definitely/not/here.glb");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], AssetEvent::LoadFailed { asset_id, .. } if asset_id == "subject"));
    }

    #[test]
    fn test_relative_paths_use_base() {
        let mut loader = AssetLoader::new();
        loader.set_base_path("/srv/site");
        assert_eq!(loader.resolve("models/a.glb"), PathBuf::from("/srv/site/models/a.glb"));
    }
}
