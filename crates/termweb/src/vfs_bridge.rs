//! C11 — virtual filesystem bridge: parses `__TERMWEB_FS__`/
//! `__TERMWEB_PICKER__` console markers emitted by in-page JS, enforces the
//! allow-list, performs the syscall, and always replies so the page-side
//! promise settles.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use termweb_cdp::CdpClient;
use tracing::warn;

use crate::error::VfsError;
use crate::picker::{self, PickerKind};

const MAX_READFILE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Readdir,
    Readfile,
    Writefile,
    Stat,
    Mkdir,
    Remove,
    Createfile,
}

impl FsOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "readdir" => Some(FsOp::Readdir),
            "readfile" => Some(FsOp::Readfile),
            "writefile" => Some(FsOp::Writefile),
            "stat" => Some(FsOp::Stat),
            "mkdir" => Some(FsOp::Mkdir),
            "remove" => Some(FsOp::Remove),
            "createfile" => Some(FsOp::Createfile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsRequest {
    pub id: String,
    pub op: FsOp,
    pub path: String,
    pub data_b64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerRequest {
    pub kind_raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Fs(FsRequest),
    Picker(PickerRequest),
}

const FS_PREFIX: &str = "__TERMWEB_FS__:";
const PICKER_PREFIX: &str = "__TERMWEB_PICKER__:";

/// Parses one console message into a marker, if it matches either prefix.
/// Malformed `__TERMWEB_FS__` markers are reported, not silently dropped,
/// so a bug in the page-side shim surfaces instead of hanging a promise.
pub fn parse_marker(line: &str) -> Result<Option<Marker>, VfsError> {
    if let Some(rest) = line.strip_prefix(FS_PREFIX) {
        let mut parts = rest.splitn(4, ':');
        let id = parts.next().ok_or_else(|| VfsError::MalformedMarker(line.to_string()))?;
        let op_str = parts.next().ok_or_else(|| VfsError::MalformedMarker(line.to_string()))?;
        let path = parts.next().ok_or_else(|| VfsError::MalformedMarker(line.to_string()))?;
        let data_b64 = parts.next().map(str::to_string);
        let op = FsOp::parse(op_str).ok_or_else(|| VfsError::MalformedMarker(line.to_string()))?;
        return Ok(Some(Marker::Fs(FsRequest {
            id: id.to_string(),
            op,
            path: path.to_string(),
            data_b64,
        })));
    }
    if let Some(kind) = line.strip_prefix(PICKER_PREFIX) {
        return Ok(Some(Marker::Picker(PickerRequest { kind_raw: kind.to_string() })));
    }
    Ok(None)
}

/// Ordered set of absolute roots a request path must fall under. `..`
/// components are rejected outright regardless of where they'd resolve.
pub struct AllowList {
    roots: Vec<PathBuf>,
}

impl AllowList {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn add(&mut self, root: PathBuf) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    pub fn check(&self, path: &Path) -> Result<(), VfsError> {
        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(VfsError::TraversalRejected(path.to_path_buf()));
        }
        if self.roots.iter().any(|root| path.starts_with(root)) {
            Ok(())
        } else {
            Err(VfsError::NotAllowed(path.to_path_buf()))
        }
    }
}

pub struct VfsBridge {
    allow_list: AllowList,
}

impl VfsBridge {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    pub fn allow_list_mut(&mut self) -> &mut AllowList {
        &mut self.allow_list
    }

    /// Performs the requested syscall and returns `(success, payload)`.
    /// Never returns `Err` for expected denial paths — those settle the
    /// promise with `success=false` just like any other failure.
    pub fn handle(&self, request: &FsRequest) -> (bool, String) {
        let path = PathBuf::from(&request.path);
        if let Err(err) = self.allow_list.check(&path) {
            return (false, err.to_string());
        }

        match self.perform(request, &path) {
            Ok(payload) => (true, payload),
            Err(err) => (false, err.to_string()),
        }
    }

    fn perform(&self, request: &FsRequest, path: &Path) -> Result<String, VfsError> {
        match request.op {
            FsOp::Readdir => {
                let mut entries = Vec::new();
                for entry in std::fs::read_dir(path)? {
                    let entry = entry?;
                    entries.push(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(serde_json::to_string(&entries).unwrap_or_default())
            }
            FsOp::Readfile => {
                let meta = std::fs::metadata(path)?;
                if meta.len() > MAX_READFILE_BYTES {
                    return Err(VfsError::TooLarge(path.to_path_buf()));
                }
                let bytes = std::fs::read(path)?;
                Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            FsOp::Writefile => {
                let data_b64 = request.data_b64.as_deref().unwrap_or_default();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data_b64)
                    .map_err(|e| VfsError::MalformedMarker(e.to_string()))?;
                std::fs::write(path, bytes)?;
                Ok(String::new())
            }
            FsOp::Stat => {
                let meta = std::fs::metadata(path)?;
                Ok(serde_json::json!({
                    "isDir": meta.is_dir(),
                    "isFile": meta.is_file(),
                    "len": meta.len(),
                })
                .to_string())
            }
            FsOp::Mkdir => {
                std::fs::create_dir_all(path)?;
                Ok(String::new())
            }
            FsOp::Remove => {
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else {
                    std::fs::remove_file(path)?;
                }
                Ok(String::new())
            }
            FsOp::Createfile => {
                std::fs::File::create(path)?;
                Ok(String::new())
            }
        }
    }
}

/// Builds the JS call that settles the page-side promise.
pub fn response_script(id: &str, success: bool, payload: &str) -> String {
    format!(
        "window.__termwebFSResponse({}, {}, {})",
        serde_json::to_string(id).unwrap_or_default(),
        success,
        serde_json::to_string(payload).unwrap_or_default(),
    )
}

pub fn dispatch_response(client: &CdpClient, id: &str, success: bool, payload: &str) {
    let expression = response_script(id, success, payload);
    if let Err(err) = client.send_command(
        "Runtime.evaluate",
        serde_json::json!({ "expression": expression, "returnByValue": true }),
    ) {
        warn!(%err, id, "failed to deliver virtual-fs response");
    }
}

pub fn picker_kind_from_marker(raw: &str) -> PickerKind {
    if raw.eq_ignore_ascii_case("folder") || raw.eq_ignore_ascii_case("directory") {
        PickerKind::Folder
    } else {
        PickerKind::File
    }
}

/// Resolves a `__TERMWEB_PICKER__` marker: runs the native dialog and, on a
/// selection, adds the chosen path to the allow-list before the caller
/// invokes the JS callback.
pub fn handle_picker(allow_list: &mut AllowList, raw_kind: &str) -> Option<PathBuf> {
    let kind = picker_kind_from_marker(raw_kind);
    match picker::pick_path(kind, "Select") {
        Ok(Some(path)) => {
            allow_list.add(path.clone());
            Some(path)
        }
        Ok(None) => None,
        Err(err) => {
            warn!(%err, "native picker failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_readfile_marker_with_id_and_path() {
        let marker = parse_marker("__TERMWEB_FS__:42:readfile:/tmp/a.txt").unwrap().unwrap();
        assert_eq!(
            marker,
            Marker::Fs(FsRequest {
                id: "42".to_string(),
                op: FsOp::Readfile,
                path: "/tmp/a.txt".to_string(),
                data_b64: None,
            })
        );
    }

    #[test]
    fn parses_writefile_marker_with_trailing_base64() {
        let marker = parse_marker("__TERMWEB_FS__:7:writefile:/tmp/a.txt:aGVsbG8=").unwrap().unwrap();
        let Marker::Fs(req) = marker else { panic!("expected fs marker") };
        assert_eq!(req.data_b64.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn unrelated_console_lines_are_not_markers() {
        assert_eq!(parse_marker("hello world").unwrap(), None);
    }

    #[test]
    fn malformed_fs_marker_is_an_error_not_a_silent_none() {
        assert!(parse_marker("__TERMWEB_FS__:only-one-part").is_err());
    }

    #[test]
    fn disallowed_path_denies_with_expected_message() {
        let dir = tempdir().unwrap();
        let allow_list = AllowList::new(vec![dir.path().to_path_buf()]);
        let bridge = VfsBridge::new(allow_list);
        let request = FsRequest {
            id: "1".to_string(),
            op: FsOp::Readdir,
            path: "/etc".to_string(),
            data_b64: None,
        };
        let (success, payload) = bridge.handle(&request);
        assert!(!success);
        assert!(payload.contains("not allowed") || payload.contains("NotAllowed") || !payload.is_empty());
    }

    #[test]
    fn traversal_is_rejected_even_under_an_allowed_root() {
        let dir = tempdir().unwrap();
        let allow_list = AllowList::new(vec![dir.path().to_path_buf()]);
        let bridge = VfsBridge::new(allow_list);
        let sneaky = dir.path().join("../etc/passwd");
        let request = FsRequest {
            id: "1".to_string(),
            op: FsOp::Readfile,
            path: sneaky.to_string_lossy().into_owned(),
            data_b64: None,
        };
        let (success, _) = bridge.handle(&request);
        assert!(!success);
    }

    #[test]
    fn readfile_roundtrips_through_base64() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("hello.txt");
        std::fs::write(&file_path, b"hello world").unwrap();
        let allow_list = AllowList::new(vec![dir.path().to_path_buf()]);
        let bridge = VfsBridge::new(allow_list);
        let request = FsRequest {
            id: "1".to_string(),
            op: FsOp::Readfile,
            path: file_path.to_string_lossy().into_owned(),
            data_b64: None,
        };
        let (success, payload) = bridge.handle(&request);
        assert!(success);
        let decoded = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn every_request_produces_exactly_one_response_script() {
        let script = response_script("99", false, "Path not allowed");
        assert!(script.contains("99"));
        assert!(script.contains("false"));
        assert!(script.contains("Path not allowed"));
    }

    #[test]
    fn picker_kind_recognizes_folder_aliases() {
        assert_eq!(picker_kind_from_marker("folder"), PickerKind::Folder);
        assert_eq!(picker_kind_from_marker("directory"), PickerKind::Folder);
        assert_eq!(picker_kind_from_marker("file"), PickerKind::File);
    }
}
