//! Upload request construction.

use crate::error::{Error, Result};
use crate::transport::progress::{ProgressReporter, UploadProgressStream};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use uuid::Uuid;

/// Name of the multipart field carrying the file contents
pub const FILE_FIELD: &str = "file";

/// Name of the multipart field carrying the destination path on the backend
pub const PATH_FIELD: &str = "path";

/// Backend upload routes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadTarget {
    /// Upload into a folder; the server appends the uploaded file's name
    Folder {
        /// Storage the file belongs to
        storage_id: Uuid,
        /// Folder path inside the storage ("" for the root)
        folder: String,
    },
    /// Upload to an exact path, file name included
    ExactPath {
        /// Storage the file belongs to
        storage_id: Uuid,
        /// Full path of the file inside the storage
        path: String,
    },
}

impl UploadTarget {
    /// Destination relative to the configured base URL
    pub fn destination(&self) -> String {
        match self {
            UploadTarget::Folder { storage_id, .. } => {
                format!("storages/{storage_id}/files/upload")
            }
            UploadTarget::ExactPath { storage_id, .. } => {
                format!("storages/{storage_id}/files/upload_to")
            }
        }
    }

    /// Value sent in the `path` form field
    pub fn path_field(&self) -> &str {
        match self {
            UploadTarget::Folder { folder, .. } => folder,
            UploadTarget::ExactPath { path, .. } => path,
        }
    }
}

/// Multipart body of an upload: the file plus accompanying metadata fields
#[derive(Clone, Debug, Default)]
pub struct UploadPayload {
    /// File contents
    pub file: Bytes,
    /// Text fields sent before the file, in order
    pub fields: Vec<(String, String)>,
    /// MIME type of the file part (None = let the client pick)
    pub mime: Option<String>,
}

impl UploadPayload {
    /// Payload carrying only the file
    pub fn new(file: impl Into<Bytes>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    /// Build the multipart form, streaming the file through `reporter`.
    /// The file part is always last.
    pub(crate) fn into_form(
        self,
        file_name: &str,
        block_size: usize,
        reporter: ProgressReporter,
    ) -> Result<Form> {
        let len = self.file.len() as u64;
        let stream = UploadProgressStream::new(self.file, block_size, reporter);
        let mut part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), len)
            .file_name(file_name.to_string());
        if let Some(mime) = &self.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| Error::Other(format!("invalid MIME type '{mime}': {e}")))?;
        }

        let form = self
            .fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        Ok(form.part(FILE_FIELD, part))
    }
}

/// Everything needed to start one upload
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Absolute URL, or path relative to the configured base URL
    pub destination: String,
    /// Token for the `Authorization` header (overrides the configured token)
    pub auth_token: Option<String>,
    /// Multipart body
    pub payload: UploadPayload,
    /// Display name, also sent as the file part's file name
    pub file_name: String,
}

impl UploadRequest {
    /// Upload in-memory `contents` as `file_name`
    pub fn new(
        destination: impl Into<String>,
        file_name: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self {
            destination: destination.into(),
            auth_token: None,
            payload: UploadPayload::new(contents),
            file_name: file_name.into(),
        }
    }

    /// Size of the file part in bytes
    ///
    /// Both the record's size and its progress percentage are derived from it.
    pub fn file_size(&self) -> u64 {
        self.payload.file.len() as u64
    }

    /// Upload to one of the backend's storage routes
    ///
    /// ```
    /// use upload_tracker::{UploadRequest, UploadTarget};
    ///
    /// let target = UploadTarget::Folder {
    ///     storage_id: uuid::Uuid::nil(),
    ///     folder: "photos/2024".into(),
    /// };
    /// let request = UploadRequest::for_target(&target, "cat.jpg", b"...".to_vec());
    /// assert_eq!(
    ///     request.destination,
    ///     "storages/00000000-0000-0000-0000-000000000000/files/upload"
    /// );
    /// assert_eq!(request.payload.fields, vec![("path".to_string(), "photos/2024".to_string())]);
    /// ```
    pub fn for_target(
        target: &UploadTarget,
        file_name: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self::new(target.destination(), file_name, contents)
            .with_field(PATH_FIELD, target.path_field())
    }

    /// Read a local file and upload it under its own file name
    pub async fn from_path(destination: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' does not name a file", path.display()),
                ))
            })?;
        let contents = tokio::fs::read(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read '{}': {}", path.display(), e),
            ))
        })?;
        Ok(Self::new(destination, file_name, contents))
    }

    /// Send `token` as the bearer credential
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a text field to the form
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.fields.push((name.into(), value.into()));
        self
    }

    /// Set the MIME type of the file part
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.payload.mime = Some(mime.into());
        self
    }
}
