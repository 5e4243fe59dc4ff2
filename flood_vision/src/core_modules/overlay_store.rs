use crate::core_modules::mask_renderer::OverlayImage;
use crate::error::{DamageError, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Keyed storage for rendered overlays. Storing under an existing reference
/// replaces the previous overlay.
///
/// References must already be safe keys (see `is_safe_reference`); build them
/// from free-form ids with `encode_reference`. A store never rewrites a key, so
/// two different references can never land on the same overlay.
pub trait OverlayStore: Send + Sync {
    fn put(&self, reference: &str, overlay: &OverlayImage) -> Result<()>;
    fn get(&self, reference: &str) -> Result<Vec<u8>>;
}

/// True for non-empty keys made of `[A-Za-z0-9_-]`, which are safe as a file
/// name and a URL path segment.
pub fn is_safe_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Turns a free-form id into a safe key. ASCII letters, digits and `-` pass
/// through; every other byte, `_` included, becomes `_XX` (upper-case hex), so
/// distinct ids always give distinct keys.
pub fn encode_reference(id: &str) -> String {
    let mut key = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            key.push(byte as char);
        } else {
            let _ = write!(key, "_{byte:02X}");
        }
    }
    key
}

fn unsafe_reference(reference: &str) -> DamageError {
    DamageError::OverlayStorage(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("unsafe overlay reference '{reference}'"),
    ))
}

#[derive(Debug, Default)]
pub struct MemoryOverlayStore {
    overlays: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayStore for MemoryOverlayStore {
    fn put(&self, reference: &str, overlay: &OverlayImage) -> Result<()> {
        if !is_safe_reference(reference) {
            return Err(unsafe_reference(reference));
        }
        let mut overlays = self.overlays.write().unwrap_or_else(PoisonError::into_inner);
        overlays.insert(reference.to_string(), overlay.png.clone());
        Ok(())
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>> {
        let overlays = self.overlays.read().unwrap_or_else(PoisonError::into_inner);
        overlays
            .get(reference)
            .cloned()
            .ok_or_else(|| DamageError::OverlayNotFound(reference.to_string()))
    }
}

/// Writes each overlay to `{root}/{reference}.png`.
#[derive(Debug, Clone)]
pub struct DirOverlayStore {
    root: PathBuf,
}

impl DirOverlayStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{reference}.png"))
    }
}

impl OverlayStore for DirOverlayStore {
    fn put(&self, reference: &str, overlay: &OverlayImage) -> Result<()> {
        if !is_safe_reference(reference) {
            return Err(unsafe_reference(reference));
        }
        let mut output = std::fs::File::create(self.path_for(reference))?;
        output.write_all(&overlay.png)?;
        Ok(())
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>> {
        if !is_safe_reference(reference) {
            return Err(DamageError::OverlayNotFound(reference.to_string()));
        }
        match std::fs::read(self.path_for(reference)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DamageError::OverlayNotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
