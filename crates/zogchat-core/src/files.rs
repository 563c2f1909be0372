// File payloads: loading a local file into a `file` frame, and writing a
// received one to disk.
//
// Files travel whole, as a base64 data URL inside a single frame. There is no
// chunking, so the sender enforces a soft size limit (1 MiB by default).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tracing::warn;

use crate::protocol::FilePayload;

/// Default soft limit for outgoing files.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// How many " (n)" suffixes to try before giving up on a free file name.
const MAX_NAME_CANDIDATES: u32 = 1000;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("file data is not a base64 data URL")]
    NotDataUrl,

    #[error("file data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("no free file name for {name} in {dir}")]
    NoFreeName { name: String, dir: PathBuf },
}

// ---------------------------------------------------------------------------
// Outgoing
// ---------------------------------------------------------------------------

/// Read `path` and wrap it as a file payload, refusing files over `limit` bytes.
pub fn load_outgoing(path: &Path, limit: u64) -> Result<FilePayload, FileError> {
    let io_err = |source| FileError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > limit {
        return Err(FileError::TooLarge { size, limit });
    }

    let bytes = std::fs::read(path).map_err(io_err)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok(FilePayload {
        data: encode_data_url(mime_for_name(&name), &bytes),
        size: bytes.len() as u64,
        name,
    })
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a data URL into its MIME type and decoded bytes.
pub fn decode_data_url(data: &str) -> Result<(String, Vec<u8>), FileError> {
    let rest = data.strip_prefix("data:").ok_or(FileError::NotDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(FileError::NotDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(FileError::NotDataUrl)?;
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    let bytes = STANDARD.decode(payload.trim())?;
    Ok((mime.to_string(), bytes))
}

/// Guess a MIME type from the file extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("pdf") => "application/pdf",
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Incoming
// ---------------------------------------------------------------------------

/// Decode a received payload and write it into `dir` without overwriting
/// anything. Returns the path actually written.
pub fn store_incoming(dir: &Path, payload: &FilePayload) -> Result<PathBuf, FileError> {
    let (_mime, bytes) = decode_data_url(&payload.data)?;
    if bytes.len() as u64 != payload.size {
        warn!(
            "File {} declared {} bytes but decoded to {}",
            payload.name,
            payload.size,
            bytes.len()
        );
    }

    std::fs::create_dir_all(dir).map_err(|source| FileError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let name = sanitize_file_name(&payload.name);
    for n in 0..MAX_NAME_CANDIDATES {
        let target = dir.join(candidate_name(&name, n));
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(mut file) => {
                file.write_all(&bytes).map_err(|source| FileError::Io {
                    path: target.clone(),
                    source,
                })?;
                return Ok(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(FileError::Io { path: target, source }),
        }
    }

    Err(FileError::NoFreeName {
        name,
        dir: dir.to_path_buf(),
    })
}

/// Keep only the final path component of a peer-supplied name.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `report.pdf`, `report (1).pdf`, `report (2).pdf`, ...
fn candidate_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Pdf,
    Text,
    Other,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("video/") {
            FileKind::Video
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else if mime.contains("pdf") {
            FileKind::Pdf
        } else if mime.contains("text") {
            FileKind::Text
        } else {
            FileKind::Other
        }
    }

    pub fn from_name(name: &str) -> Self {
        FileKind::from_mime(mime_for_name(name))
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Pdf => "pdf",
            FileKind::Text => "text",
            FileKind::Other => "file",
        }
    }
}

/// Format a byte count for the chat log: `512 B`, `1.5 KB`, `1.0 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}
