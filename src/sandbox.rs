//! Mapping request targets to filesystem paths confined to the resource root.
//!
//! Every resolved path is canonicalized (symlinks and `..` resolved) before it
//! is compared with the canonical root, and the comparison is done on path
//! components, so a sibling directory such as `resources-evil` never passes as
//! being inside `resources`.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::http::response::StatusCode;

pub const UPLOADS_DIR: &str = "uploads";

static UPLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub enum SandboxError {
    /// Absolute-form target (`http://...`) or a target that cannot name a file
    MalformedTarget,
    /// The resolved path escapes the root
    OutsideRoot,
    Io(io::Error),
}

impl SandboxError {
    pub fn status(&self) -> StatusCode {
        match self {
            SandboxError::MalformedTarget => StatusCode::BadRequest,
            SandboxError::OutsideRoot => StatusCode::Forbidden,
            SandboxError::Io(_) => StatusCode::InternalServerError,
        }
    }
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::MalformedTarget => write!(f, "malformed request target"),
            SandboxError::OutsideRoot => write!(f, "path escapes the resource root"),
            SandboxError::Io(e) => write!(f, "filesystem error: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<io::Error> for SandboxError {
    fn from(e: io::Error) -> Self {
        SandboxError::Io(e)
    }
}

/// A canonical path known to lie inside the resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Resolves request targets against one resource root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// The root must exist; it is canonicalized once here.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a GET target to a path under the root.
    ///
    /// The query string is dropped, the rest percent-decoded, and an empty
    /// target or `/` becomes `/index.html`. Success says nothing about the
    /// file existing; callers check that separately.
    pub fn resolve_static(&self, target: &str) -> Result<ResolvedPath, SandboxError> {
        if is_absolute_url(target) {
            return Err(SandboxError::MalformedTarget);
        }

        let path = target.split_once('?').map(|(p, _)| p).unwrap_or(target);
        let decoded = percent_decode(path).ok_or(SandboxError::MalformedTarget)?;
        if decoded.contains('\0') {
            return Err(SandboxError::MalformedTarget);
        }

        let relative = match decoded.as_str() {
            "" | "/" => "index.html",
            other => other.trim_start_matches(['/', '\\']),
        };

        let candidate = canonicalize_lenient(&self.root.join(relative))?;
        contain(&self.root, candidate)
    }

    /// Picks a fresh file path in `<root>/uploads`, creating the directory if
    /// needed.
    ///
    /// Names combine the wall clock with a process-wide sequence number, so
    /// two uploads in the same clock tick still get distinct files.
    pub fn resolve_upload(&self) -> Result<ResolvedPath, SandboxError> {
        let uploads = self.root.join(UPLOADS_DIR);
        std::fs::create_dir_all(&uploads)?;

        let uploads = uploads.canonicalize()?;
        // A symlinked uploads directory must still point inside the root
        let uploads = contain(&self.root, uploads)?;

        let candidate = canonicalize_lenient(&uploads.as_path().join(upload_file_name()))?;
        contain(uploads.as_path(), candidate)
    }
}

fn is_absolute_url(target: &str) -> bool {
    match url::Url::parse(target) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Accepts `candidate` only if it equals `root` or is nested below it.
fn contain(root: &Path, candidate: PathBuf) -> Result<ResolvedPath, SandboxError> {
    // `Path::starts_with` compares whole components, so `/srv/root2` does not
    // start with `/srv/root`.
    if candidate.starts_with(root) {
        Ok(ResolvedPath(candidate))
    } else {
        Err(SandboxError::OutsideRoot)
    }
}

/// Canonicalizes a path that may not exist yet.
///
/// The deepest existing ancestor is canonicalized by the OS; the remaining
/// components, which cannot be symlinks, are applied lexically.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut rest = Vec::new();

    let base = loop {
        match existing.canonicalize() {
            Ok(base) => break base,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) =
                    (existing.parent(), existing.components().next_back())
                else {
                    return Err(e);
                };
                rest.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    };

    let mut resolved = base;
    for component in rest.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => resolved.push(name),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(resolved)
}

/// Decodes `%XX` escapes. Returns `None` for truncated or non-hex escapes and
/// for results that are not UTF-8.
fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}

fn upload_file_name() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let seq = UPLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    format!("upload_{}_{:09}_{}.json", now.as_secs(), now.subsec_nanos(), seq)
}
