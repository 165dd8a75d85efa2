//! Tool Gateway
//!
//! Filesystem operations scoped to the run's roots: reads under the source
//! root, writes under the destination root. Every path an agent supplies is
//! resolved lexically before touching the disk, so `..` cannot climb out.

use std::path::{Component, Path, PathBuf};

use agent_core::{AgentError, Result};
use base64::Engine;
use walkdir::WalkDir;

/// Result of reading a file for a model
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    /// Base64 image with its media type
    Image { media_type: String, data: String },
}

/// Scoped filesystem access for the tool executor
#[derive(Clone, Debug)]
pub struct ToolGateway {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl ToolGateway {
    /// Both roots must exist; they are canonicalized here
    pub fn new(source_root: impl AsRef<Path>, dest_root: impl AsRef<Path>) -> Result<Self> {
        let canonical = |p: &Path| {
            p.canonicalize()
                .map_err(|e| AgentError::Config(format!("{}: {}", p.display(), e)))
        };
        Ok(Self {
            source_root: canonical(source_root.as_ref())?,
            dest_root: canonical(dest_root.as_ref())?,
        })
    }
    
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
    
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }
    
    /// Resolve a read path: kept if already inside the source root,
    /// otherwise taken relative to it
    pub fn resolve_read(&self, path: &str) -> Result<PathBuf> {
        let requested = Path::new(path.trim());
        let normalized = normalize(requested);
        
        let resolved = if requested.is_absolute() && normalized.starts_with(&self.source_root) {
            normalized
        } else {
            normalize(&self.source_root.join(strip_root(requested)))
        };
        
        if !resolved.starts_with(&self.source_root) {
            return Err(AgentError::OutOfScope(path.to_string()));
        }
        if !resolved.exists() {
            return Err(AgentError::NotFound(resolved.display().to_string()));
        }
        
        // Symlinks inside the tree may point anywhere
        let real = resolved.canonicalize()?;
        if !real.starts_with(&self.source_root) {
            return Err(AgentError::OutOfScope(format!(
                "{} resolves to {} outside {}",
                path,
                real.display(),
                self.source_root.display()
            )));
        }
        Ok(real)
    }
    
    /// Resolve a write path: relative paths join the destination root,
    /// absolute paths must already lie inside it
    pub fn resolve_write(&self, path: &str) -> Result<PathBuf> {
        let requested = Path::new(path.trim());
        let resolved = if requested.is_absolute() {
            normalize(requested)
        } else {
            normalize(&self.dest_root.join(requested))
        };
        
        if !resolved.starts_with(&self.dest_root) || resolved == self.dest_root {
            return Err(AgentError::OutOfScope(format!(
                "{} is outside {}",
                path,
                self.dest_root.display()
            )));
        }
        
        // The deepest entry that exists on disk, dangling symlinks included
        let anchor = resolved
            .ancestors()
            .find(|p| std::fs::symlink_metadata(p).is_ok())
            .unwrap_or(self.dest_root.as_path());
        let real = real_location(anchor)?;
        if !real.starts_with(&self.dest_root) {
            return Err(AgentError::OutOfScope(format!(
                "{} resolves through {} outside {}",
                path,
                real.display(),
                self.dest_root.display()
            )));
        }
        
        Ok(resolved)
    }
    
    /// Recursive, sorted directory listing
    ///
    /// ```text
    /// app/
    /// ├── docs/
    /// │   └── diagram.png
    /// └── main.py
    /// ```
    pub fn list_tree(&self, path: &str) -> Result<String> {
        let root = self.resolve_read(path)?;
        if !root.is_dir() {
            return Err(AgentError::ToolValidation(format!("{} is not a directory", root.display())));
        }
        
        let entries = WalkDir::new(&root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AgentError::ToolExecution(e.to_string()))?;
        
        let last_sibling = last_sibling_flags(entries.iter().map(walkdir::DirEntry::depth));
        
        let name = root
            .file_name()
            .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mut tree = format!("{}/\n", name);
        let mut open_levels: Vec<bool> = Vec::new();
        
        for (entry, is_last) in entries.iter().zip(last_sibling) {
            open_levels.truncate(entry.depth() - 1);
            for ancestor_last in &open_levels {
                tree.push_str(if *ancestor_last { "    " } else { "│   " });
            }
            tree.push_str(if is_last { "└── " } else { "├── " });
            tree.push_str(&entry.file_name().to_string_lossy());
            if entry.file_type().is_dir() {
                tree.push('/');
            }
            tree.push('\n');
            open_levels.push(is_last);
        }
        
        Ok(tree)
    }
    
    /// Text for regular files, a base64 descriptor for images
    pub async fn read_file(&self, path: &str) -> Result<FileContent> {
        let resolved = self.resolve_read(path)?;
        if !resolved.is_file() {
            return Err(AgentError::NotFound(format!("{} is not a file", resolved.display())));
        }
        
        if let Some(media_type) = image_media_type(&resolved) {
            let bytes = tokio::fs::read(&resolved).await?;
            return Ok(FileContent::Image {
                media_type: media_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }
        
        let bytes = tokio::fs::read(&resolved).await?;
        Ok(FileContent::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }
    
    /// Like [`ToolGateway::read_file`] but only accepts images
    pub async fn read_image(&self, path: &str) -> Result<(String, String)> {
        match self.read_file(path).await? {
            FileContent::Image { media_type, data } => Ok((media_type, data)),
            FileContent::Text(_) => Err(AgentError::ToolValidation(format!(
                "The file '{}' is not a valid image.",
                path
            ))),
        }
    }
    
    /// Create or overwrite a file under the destination root
    pub async fn write_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let resolved = self.resolve_write(path)?;
        if resolved.is_dir() {
            return Err(AgentError::ToolValidation(format!("{} is a directory", resolved.display())));
        }
        
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        
        tracing::debug!(path = %resolved.display(), bytes = content.len(), "File written");
        Ok(resolved)
    }
}

/// Media type for image extensions a vision model accepts
pub fn image_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Where `path` lands once symlinks are followed. A dangling link is
/// resolved through its target text since it cannot be canonicalized.
fn real_location(path: &Path) -> Result<PathBuf> {
    let is_link = std::fs::symlink_metadata(path)?.file_type().is_symlink();
    match path.canonicalize() {
        Ok(real) => Ok(real),
        Err(_) if is_link => {
            let target = std::fs::read_link(path)?;
            let base = match path.parent() {
                Some(parent) => parent.canonicalize()?,
                None => PathBuf::from("/"),
            };
            Ok(normalize(&base.join(target)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Lexical normalization: drops `.`, applies `..` without touching the disk
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // popping past the root is a no-op
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// For entries in depth-first order, whether each is the last of its siblings
fn last_sibling_flags(depths: impl DoubleEndedIterator<Item = usize>) -> Vec<bool> {
    let mut seen: Vec<bool> = Vec::new();
    let mut flags: Vec<bool> = depths
        .rev()
        .map(|depth| {
            if seen.len() <= depth {
                seen.resize(depth + 1, false);
            }
            let is_last = !seen[depth];
            seen[depth] = true;
            seen.truncate(depth + 1);
            is_last
        })
        .collect();
    flags.reverse();
    flags
}
