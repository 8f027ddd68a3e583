//! Model artefact cache operations.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Text loaded from the cache, either whole or split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextContent {
    Whole(String),
    Lines(Vec<String>),
}

impl TextContent {
    /// Lines of the content, splitting whole text on demand.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            TextContent::Whole(text) => text.lines().map(str::to_string).collect(),
            TextContent::Lines(lines) => lines,
        }
    }
}

/// Filesystem cache rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ModelCache {
    root: PathBuf,
}

impl ModelCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::from_config(&CacheConfig::from_env())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding artefacts of `model_id`, or the cache root.
    ///
    /// Model ids such as `project/3` map to nested directories.
    pub fn cache_dir(&self, model_id: Option<&str>) -> CacheResult<PathBuf> {
        match model_id {
            Some(id) => Ok(self.root.join(checked_relative(id)?)),
            None => Ok(self.root.clone()),
        }
    }

    pub fn cache_file_path(&self, file: &str, model_id: Option<&str>) -> CacheResult<PathBuf> {
        Ok(self.cache_dir(model_id)?.join(checked_relative(file)?))
    }

    /// Make sure the cache directory exists.
    pub fn initialise(&self, model_id: Option<&str>) -> CacheResult<()> {
        let dir = self.cache_dir(model_id)?;
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))
    }

    pub fn is_file_cached(&self, file: &str, model_id: Option<&str>) -> CacheResult<bool> {
        Ok(self.cache_file_path(file, model_id)?.is_file())
    }

    pub fn are_all_files_cached<S: AsRef<str>>(
        &self,
        files: &[S],
        model_id: Option<&str>,
    ) -> CacheResult<bool> {
        for file in files {
            if !self.is_file_cached(file.as_ref(), model_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Load a text artefact.
    ///
    /// With `split_lines` the content is returned line by line; lines keep
    /// their terminators unless `strip_white_chars` is set, in which case
    /// lines are trimmed and blank ones dropped.
    pub fn load_text(
        &self,
        file: &str,
        model_id: Option<&str>,
        split_lines: bool,
        strip_white_chars: bool,
    ) -> CacheResult<TextContent> {
        let path = self.cache_file_path(file, model_id)?;
        let content = read_existing(&path, |p| fs::read_to_string(p))?;

        let text = match (split_lines, strip_white_chars) {
            (true, true) => TextContent::Lines(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            (true, false) => {
                TextContent::Lines(content.split_inclusive('\n').map(str::to_string).collect())
            }
            (false, true) => TextContent::Whole(content.trim().to_string()),
            (false, false) => TextContent::Whole(content),
        };
        Ok(text)
    }

    pub fn load_json<T: DeserializeOwned>(&self, file: &str, model_id: Option<&str>) -> CacheResult<T> {
        let path = self.cache_file_path(file, model_id)?;
        let bytes = read_existing(&path, |p| fs::read(p))?;
        serde_json::from_slice(&bytes).map_err(|source| CacheError::Json { path, source })
    }

    pub fn save_bytes(
        &self,
        content: &[u8],
        file: &str,
        model_id: Option<&str>,
        allow_override: bool,
    ) -> CacheResult<PathBuf> {
        let path = self.cache_file_path(file, model_id)?;
        write_file(&path, content, allow_override)?;
        debug!(path = %path.display(), size = content.len(), "Stored artefact in cache");
        Ok(path)
    }

    pub fn save_json<T: Serialize + ?Sized>(
        &self,
        content: &T,
        file: &str,
        model_id: Option<&str>,
        allow_override: bool,
    ) -> CacheResult<PathBuf> {
        let path = self.cache_file_path(file, model_id)?;
        let bytes = serde_json::to_vec(content).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        self.save_bytes(&bytes, file, model_id, allow_override)
    }

    /// Store lines joined with `\n`.
    pub fn save_text_lines<S: AsRef<str>>(
        &self,
        content: &[S],
        file: &str,
        model_id: Option<&str>,
        allow_override: bool,
    ) -> CacheResult<PathBuf> {
        let joined = content.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
        self.save_bytes(joined.as_bytes(), file, model_id, allow_override)
    }

    /// Remove the cache directory of `model_id`, or the whole cache.
    pub fn clear(&self, model_id: Option<&str>) -> CacheResult<()> {
        let dir = self.cache_dir(model_id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(path = %dir.display(), "Cleared model cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::NotFound(dir)),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }
}

/// Accept only plain relative paths that cannot leave the cache root.
fn checked_relative(raw: &str) -> CacheResult<&Path> {
    let path = Path::new(raw);
    let plain = !raw.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(CacheError::InvalidPath(raw.to_string()))
    }
}

fn read_existing<T>(path: &Path, read: impl FnOnce(&Path) -> std::io::Result<T>) -> CacheResult<T> {
    read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CacheError::NotFound(path.to_path_buf())
        } else {
            CacheError::io(path, e)
        }
    })
}

fn write_file(path: &Path, content: &[u8], allow_override: bool) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    if allow_override {
        return fs::write(path, content).map_err(|e| CacheError::io(path, e));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => CacheError::AlreadyExists(path.to_path_buf()),
            _ => CacheError::io(path, e),
        })?;
    file.write_all(content).map_err(|e| CacheError::io(path, e))
}
