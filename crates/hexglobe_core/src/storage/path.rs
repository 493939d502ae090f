//! Deterministic storage locations for tile records.
//!
//! Layout:
//! - `static/res_<r>/<s1>/<s2>/.../<id>` for shared topology;
//! - `dynamic/<namespace>/res_<r>/<s1>/<s2>/.../<id>` for overlays;
//!
//! where `s1, s2, ...` are the id (minus the library's scheme prefix) cut
//! into two-character segments. Nesting bounds each directory to at most
//! 256 hex-pair entries plus leaves.

use crate::model::cell::CellId;
use crate::model::namespace::Namespace;
use std::fmt::{Display, Formatter};

const STATIC_ROOT: &str = "static";
const DYNAMIC_ROOT: &str = "dynamic";
const SEGMENT_WIDTH: usize = 2;

/// Which tree a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind<'a> {
    /// Immutable topology shared by every namespace.
    Static,
    /// Mutable overlay owned by one namespace.
    Dynamic(&'a Namespace),
}

/// Backend-neutral record location, `/`-separated, no extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure path computation; never touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePathResolver {
    scheme_prefix: String,
}

impl StoragePathResolver {
    /// `scheme_prefix` is stripped from ids before segmentation when present.
    pub fn new(scheme_prefix: impl Into<String>) -> Self {
        Self {
            scheme_prefix: scheme_prefix.into(),
        }
    }

    /// Location of a record.
    ///
    /// `resolution` must be the id's own resolution as reported by the grid
    /// library; outside the crate, `TileRepository::record_path` derives it.
    pub(crate) fn resolve(&self, kind: RecordKind<'_>, id: &CellId, resolution: u8) -> StoragePath {
        let mut parts: Vec<&str> = Vec::new();
        match kind {
            RecordKind::Static => parts.push(STATIC_ROOT),
            RecordKind::Dynamic(namespace) => {
                parts.push(DYNAMIC_ROOT);
                parts.push(namespace.as_str());
            }
        }
        let resolution_dir = format!("res_{resolution}");
        parts.push(resolution_dir.as_str());

        let segments = self.segments(id);
        parts.extend(segments.iter().map(String::as_str));
        parts.push(id.as_str());
        StoragePath(parts.join("/"))
    }

    pub(crate) fn static_path(&self, id: &CellId, resolution: u8) -> StoragePath {
        self.resolve(RecordKind::Static, id, resolution)
    }

    pub(crate) fn dynamic_path(&self, namespace: &Namespace, id: &CellId, resolution: u8) -> StoragePath {
        self.resolve(RecordKind::Dynamic(namespace), id, resolution)
    }

    /// Prefix under which every record of `namespace` lives.
    pub fn namespace_root(namespace: &Namespace) -> String {
        format!("{DYNAMIC_ROOT}/{}", namespace.as_str())
    }

    /// Prefix under which every topology record lives.
    pub fn static_root() -> &'static str {
        STATIC_ROOT
    }

    fn segments(&self, id: &CellId) -> Vec<String> {
        let raw = id.as_str();
        let body = if self.scheme_prefix.is_empty() {
            raw
        } else {
            raw.strip_prefix(self.scheme_prefix.as_str()).unwrap_or(raw)
        };
        let chars: Vec<char> = body.chars().collect();
        chars
            .chunks(SEGMENT_WIDTH)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}
