//! File upload, download and static resource handlers.

use bytes::Bytes;
use futures::executor::block_on;
use futures::stream;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::context::Context;
use crate::dispatcher::{handler, HandlerFn};

/// Path parameter read by [`StaticResourceHandler`]
pub const STATIC_FILE_PARAM: &str = "file";

const DEFAULT_CACHE_ENTRIES: usize = 1000;
const DEFAULT_MAX_CACHED_FILE_SIZE: usize = 10 * 1024 * 1024;

static DEFAULT_CONTENT_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("html", "text/html"),
        ("css", "text/css"),
        ("js", "application/javascript"),
        ("json", "application/json"),
        ("txt", "text/plain"),
        ("jpeg", "image/jpeg"),
        ("jpe", "image/jpeg"),
        ("jpg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("svg", "image/svg+xml"),
        ("pdf", "application/pdf"),
    ])
});

/// Join a request-supplied relative path onto `base`, refusing to leave it
fn map_path(base: &Path, rel: &str) -> Option<PathBuf> {
    let mut pb = base.to_path_buf();
    let mut pushed = false;
    for comp in Path::new(rel.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => {
                pb.push(s);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    pushed.then_some(pb)
}

/// A file part pulled out of a `multipart/form-data` body
#[derive(Debug)]
struct Upload {
    file_name: String,
    data: Bytes,
}

/// Find the part named `field` and buffer its content.
fn read_upload(body: &[u8], boundary: String, field: &str) -> Result<Option<Upload>, multer::Error> {
    let body = Bytes::copy_from_slice(body);
    let mut multipart = multer::Multipart::new(
        stream::once(async move { Ok::<Bytes, Infallible>(body) }),
        boundary,
    );
    // the whole body is already in memory, so every poll is ready
    block_on(async {
        while let Some(part) = multipart.next_field().await? {
            if part.name() != Some(field) {
                continue;
            }
            let file_name = part.file_name().unwrap_or_default().to_string();
            let data = part.bytes().await?;
            return Ok(Some(Upload { file_name, data }));
        }
        Ok::<_, multer::Error>(None)
    })
}

type DstPathFn = Arc<dyn Fn(&str) -> PathBuf + Send + Sync>;

/// Stores the file posted in a multipart form field under a directory
///
/// By default the client's file name is kept. [`FileUploader::with_dst_path`]
/// maps that name to another path; the result is always placed under the
/// upload directory.
#[derive(Clone)]
pub struct FileUploader {
    field: String,
    dir: PathBuf,
    dst_path: DstPathFn,
}

impl fmt::Debug for FileUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUploader")
            .field("field", &self.field)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl FileUploader {
    pub fn new(field: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            field: field.into(),
            dir: dir.into(),
            dst_path: Arc::new(|file_name: &str| PathBuf::from(file_name)),
        }
    }

    /// Compute the stored path, relative to the upload directory, from the
    /// client's file name
    #[must_use]
    pub fn with_dst_path(mut self, f: impl Fn(&str) -> PathBuf + Send + Sync + 'static) -> Self {
        self.dst_path = Arc::new(f);
        self
    }

    pub fn handle(&self, ctx: &mut Context) {
        let boundary = ctx
            .header("Content-Type")
            .and_then(|ct| multer::parse_boundary(ct).ok());
        let Some(boundary) = boundary else {
            ctx.resp_string(400, "upload failed: not a multipart form");
            return;
        };
        let upload = match read_upload(&ctx.body, boundary, &self.field) {
            Ok(Some(upload)) => upload,
            Ok(None) => {
                ctx.resp_string(400, "upload failed: no file data");
                return;
            }
            Err(e) => {
                warn!(request_id = %ctx.request_id, error = %e, "Malformed multipart body");
                ctx.resp_string(400, "upload failed: malformed multipart body");
                return;
            }
        };

        let relative = (self.dst_path)(&upload.file_name);
        let Some(path) = relative.to_str().and_then(|rel| map_path(&self.dir, rel)) else {
            warn!(request_id = %ctx.request_id, file = %upload.file_name, "Rejected upload path");
            ctx.resp_string(400, "invalid file path");
            return;
        };
        if let Err(e) = fs::write(&path, &upload.data) {
            warn!(request_id = %ctx.request_id, path = %path.display(), error = %e, "Upload failed");
            ctx.resp_string(500, "upload failed");
            return;
        }
        debug!(
            request_id = %ctx.request_id,
            path = %path.display(),
            size = upload.data.len(),
            "File uploaded"
        );
        ctx.resp_string(200, "upload succeeded");
    }

    /// Turn the uploader into a route handler
    #[must_use]
    pub fn into_handler(self) -> HandlerFn {
        handler(move |ctx: &mut Context| self.handle(ctx))
    }
}

/// Serves `?file=<name>` from a directory as an attachment
#[derive(Debug, Clone)]
pub struct FileDownloader {
    dir: PathBuf,
}

impl FileDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn handle(&self, ctx: &mut Context) {
        let requested = match ctx.query_value("file") {
            Ok(name) => name.to_string(),
            Err(_) => {
                ctx.resp_string(400, "missing file parameter");
                return;
            }
        };
        let Some(path) = map_path(&self.dir, &requested) else {
            warn!(request_id = %ctx.request_id, file = %requested, "Rejected download path");
            ctx.resp_string(400, "invalid file path");
            return;
        };
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ctx.resp_string(404, "file not found");
                return;
            }
            Err(e) => {
                warn!(request_id = %ctx.request_id, path = %path.display(), error = %e, "Download failed");
                ctx.resp_string(500, "file read failed");
                return;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        ctx.set_header("Content-Disposition", format!("attachment;filename={file_name}"));
        ctx.set_header("Content-Description", "File Transfer");
        ctx.set_header("Content-Type", "application/octet-stream");
        ctx.set_header("Content-Transfer-Encoding", "binary");
        ctx.set_header("Expires", "0");
        ctx.set_header("Cache-Control", "must-revalidate");
        ctx.set_header("Pragma", "public");
        ctx.resp_status = 200;
        ctx.resp_body = data;
    }

    /// Turn the downloader into a route handler
    #[must_use]
    pub fn into_handler(self) -> HandlerFn {
        handler(move |ctx: &mut Context| self.handle(ctx))
    }
}

#[derive(Debug)]
struct CachedFile {
    content_type: &'static str,
    data: Vec<u8>,
}

/// Serves the `:file` path parameter from a directory
///
/// Only extensions in the content-type table are served. Files smaller
/// than the size limit are kept in an LRU cache keyed by request name.
pub struct StaticResourceHandler {
    dir: PathBuf,
    content_types: HashMap<String, &'static str>,
    cache: Mutex<LruCache<String, Arc<CachedFile>>>,
    max_cached_file_size: usize,
}

impl StaticResourceHandler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let entries = NonZeroUsize::new(DEFAULT_CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN);
        Self {
            dir: dir.into(),
            content_types: DEFAULT_CONTENT_TYPES
                .iter()
                .map(|(ext, ct)| ((*ext).to_string(), *ct))
                .collect(),
            cache: Mutex::new(LruCache::new(entries)),
            max_cached_file_size: DEFAULT_MAX_CACHED_FILE_SIZE,
        }
    }

    /// Serve files with `extension` as `content_type`
    #[must_use]
    pub fn with_extension(mut self, extension: &str, content_type: &'static str) -> Self {
        self.content_types
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), content_type);
        self
    }

    /// Only cache files strictly smaller than `size` bytes
    #[must_use]
    pub fn with_max_cached_file_size(mut self, size: usize) -> Self {
        self.max_cached_file_size = size;
        self
    }

    /// Limit the cache to `entries` files
    #[must_use]
    pub fn with_cache_entries(self, entries: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(entries)),
            ..self
        }
    }

    /// Whether `name` is currently cached
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(name))
            .unwrap_or(false)
    }

    fn cached(&self, name: &str) -> Option<Arc<CachedFile>> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(name).map(Arc::clone)
    }

    fn store(&self, name: &str, item: &Arc<CachedFile>) {
        if item.data.len() >= self.max_cached_file_size {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(name.to_string(), Arc::clone(item));
        }
    }

    fn respond(ctx: &mut Context, item: &CachedFile) {
        ctx.resp_status = 200;
        ctx.set_header("Content-Type", item.content_type);
        ctx.resp_body.clone_from(&item.data);
    }

    pub fn handle(&self, ctx: &mut Context) {
        let name = match ctx.path_value(STATIC_FILE_PARAM) {
            Ok(name) => name.to_string(),
            Err(_) => {
                ctx.resp_string(400, "missing file name");
                return;
            }
        };
        if let Some(item) = self.cached(&name) {
            debug!(request_id = %ctx.request_id, file = %name, "Static file served from cache");
            Self::respond(ctx, &item);
            return;
        }

        let Some(path) = map_path(&self.dir, &name) else {
            ctx.resp_string(400, "invalid file path");
            return;
        };
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let Some(content_type) = self.content_types.get(&extension).copied() else {
            ctx.resp_string(400, "unsupported file type");
            return;
        };
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ctx.resp_string(404, "file not found");
                return;
            }
            Err(e) => {
                warn!(request_id = %ctx.request_id, path = %path.display(), error = %e, "Static file read failed");
                ctx.resp_string(500, "file read failed");
                return;
            }
        };

        let item = Arc::new(CachedFile { content_type, data });
        self.store(&name, &item);
        Self::respond(ctx, &item);
    }

    /// Turn the handler into a route handler
    #[must_use]
    pub fn into_handler(self) -> HandlerFn {
        handler(move |ctx: &mut Context| self.handle(ctx))
    }
}
