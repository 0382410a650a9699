//! Saving uploaded files.
//!
//! Content is streamed through a bounded buffer into a temporary file next to the
//! destination, synced, then renamed into place, so a failed upload never leaves a
//! partial file under the final name.

use crate::body::OptionReqBody;
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::RequestContext;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http_body_util::BodyExt;
use mime::Mime;
use multer::Multipart;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info};
use uuid::Uuid;

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// A file part read incrementally from a multipart body.
pub type MultipartReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

/// An incoming file: its client-supplied name and metadata plus the content stream.
pub struct UploadRequest<R> {
    file_name: String,
    content_type: Option<Mime>,
    size: Option<u64>,
    content: R,
}

impl<R> UploadRequest<R> {
    pub fn new(file_name: impl Into<String>, content: R) -> Self {
        Self { file_name: file_name.into(), content_type: None, size: None, content }
    }

    #[must_use]
    pub fn content_type(mut self, content_type: Mime) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Declares the expected size; a different byte count fails the upload.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn declared_content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    pub fn declared_size(&self) -> Option<u64> {
        self.size
    }
}

impl<R> fmt::Debug for UploadRequest<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUpload {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Saves uploads under a root directory.
#[derive(Debug, Clone)]
pub struct UploadHandler {
    root: PathBuf,
    buffer_size: usize,
}

impl UploadHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), buffer_size: DEFAULT_BUFFER_SIZE }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.root.clone()).buffer_size(config.buffer_size)
    }

    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save<R>(&self, request: UploadRequest<R>) -> Result<SavedUpload, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.save_to(request, &self.root).await
    }

    pub async fn save_to<R>(&self, request: UploadRequest<R>, dir: &Path) -> Result<SavedUpload, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let UploadRequest { file_name, content_type, size, content } = request;
        validate_file_name(&file_name)?;

        fs::create_dir_all(dir).await.map_err(|source| UploadError::CreateDir { path: dir.to_path_buf(), source })?;

        let target = dir.join(&file_name);
        // never embeds the client name
        let temp = dir.join(format!(".upload-{}.part", Uuid::new_v4().simple()));
        debug!(file = %file_name, content_type = ?content_type, declared_size = ?size, "receiving upload");

        let bytes_written = match write_file(&temp, content, self.buffer_size).await {
            Ok(written) => written,
            Err(e) => {
                error!(file = %file_name, cause = %e, "failed to write upload");
                remove_temp(&temp).await;
                return Err(e.into());
            }
        };

        if let Some(declared) = size
            && declared != bytes_written
        {
            remove_temp(&temp).await;
            return Err(UploadError::SizeMismatch { declared, written: bytes_written });
        }

        if let Err(e) = fs::rename(&temp, &target).await {
            error!(file = %file_name, cause = %e, "failed to move upload into place");
            remove_temp(&temp).await;
            return Err(e.into());
        }

        info!(path = %target.display(), bytes = bytes_written, "upload saved");
        Ok(SavedUpload { path: target, bytes_written })
    }
}

/// Streams `request` into `dir` with the default buffer size.
pub async fn save_upload<R>(request: UploadRequest<R>, dir: impl AsRef<Path>) -> Result<SavedUpload, UploadError>
where
    R: AsyncRead + Unpin + Send,
{
    let dir = dir.as_ref();
    UploadHandler::new(dir).save_to(request, dir).await
}

async fn write_file<R>(path: &Path, content: R, buffer_size: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin + Send,
{
    let mut file = OpenOptions::new().write(true).create_new(true).open(path).await?;
    let mut reader = BufReader::with_capacity(buffer_size, content);
    let written = tokio::io::copy_buf(&mut reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        error!(path = %path.display(), cause = %e, "failed to remove temporary upload file");
    }
}

/// Accepts a bare file name only: no separators, no parent references, no drive or
/// absolute prefix, no NUL.
fn validate_file_name(name: &str) -> Result<(), UploadError> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0', ':'])
        || Path::new(name).is_absolute();

    if invalid {
        return Err(UploadError::InvalidFileName { name: name.to_owned() });
    }
    Ok(())
}

/// Finds the file field `field_name` in a `multipart/form-data` request and returns it
/// as an [`UploadRequest`] reading the part incrementally.
///
/// The part's `Content-Length` header, when present, becomes the declared size.
pub async fn multipart_upload(
    req: &RequestContext,
    body: &OptionReqBody,
    field_name: &str,
) -> Result<UploadRequest<MultipartReader>, UploadError> {
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|content_type| multer::parse_boundary(content_type).ok())
        .ok_or(UploadError::NotMultipart)?;

    let body = body.take().await.ok_or(UploadError::BodyConsumed)?;
    let mut multipart = Multipart::new(body.into_data_stream(), boundary);

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().cloned();
        let size = field
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let stream = field.map_err(io::Error::other).boxed();
        let mut request = UploadRequest::new(file_name, StreamReader::new(stream));
        request.content_type = content_type;
        request.size = size;
        return Ok(request);
    }

    Err(UploadError::MissingField { name: field_name.to_owned() })
}
