//! Attachment uploads for the composer.
//!
//! Files picked by the user are screened locally (image support, count,
//! size), then uploaded concurrently. Each accepted file holds a pending
//! slot until its upload finishes; failed uploads drop their slot and
//! report a notice.

use std::path::Path;

use uuid::Uuid;

use crate::api::{BackendClient, UploadResponse};
use crate::chat::ContentPart;
use crate::config::UploadConfig;
use crate::error::{ClientError, Result};
use crate::state::Store;

const IMAGE_UNSUPPORTED: &str = "This model does not support image uploads.";
const TOO_MANY_FILES: &str = "Maximum number of files exceeded.";

/// A file read from disk, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    /// MIME type is guessed from the file name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self { name, mime, bytes }
    }

    /// Read `path` from disk.
    ///
    /// # Errors
    ///
    /// `ClientError::Upload` when the file cannot be read.
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Upload(format!("failed to read '{}': {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn endpoint(&self) -> &'static str {
        if self.is_image() { "/upload/image" } else { "/upload/file" }
    }
}

/// One attachment on the composer.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadSlot {
    /// Upload in flight.
    Pending { id: Uuid, name: String },
    /// Uploaded and ready to send.
    Ready { id: Uuid, part: ContentPart },
}

impl UploadSlot {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Pending { id, .. } | Self::Ready { id, .. } => *id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Result of a [`UploadQueue::process_files`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Files that uploaded successfully.
    pub uploaded: usize,
    /// Transient notices to show, in order.
    pub notices: Vec<String>,
}

/// Apply the local acceptance rules.
///
/// Any image while the model cannot read images rejects the whole batch.
/// Oversize files are dropped. If the rest exceeds the free slots it is
/// truncated and the count notice wins over the size notice.
pub fn select_files(
    files: Vec<LocalFile>,
    occupied: usize,
    can_read_image: bool,
    limits: &UploadConfig,
) -> (Vec<LocalFile>, Option<String>) {
    if !can_read_image && files.iter().any(LocalFile::is_image) {
        return (Vec::new(), Some(IMAGE_UNSUPPORTED.to_string()));
    }
    let remaining = limits.max_files.saturating_sub(occupied);
    let total = files.len();
    let mut accepted: Vec<LocalFile> = files
        .into_iter()
        .filter(|f| f.size() <= limits.max_file_size_bytes)
        .collect();
    let oversize = total - accepted.len();

    if accepted.len() > remaining {
        accepted.truncate(remaining);
        (accepted, Some(TOO_MANY_FILES.to_string()))
    } else if oversize > 0 {
        let mib = limits.max_file_size_bytes / (1024 * 1024);
        (accepted, Some(format!("Files larger than {mib}MB cannot be uploaded.")))
    } else {
        (accepted, None)
    }
}

/// Pending and finished attachments of one composer.
#[derive(Debug)]
pub struct UploadQueue {
    client: BackendClient,
    limits: UploadConfig,
    slots: Store<Vec<UploadSlot>>,
}

impl UploadQueue {
    pub fn new(client: BackendClient, limits: UploadConfig) -> Self {
        Self {
            client,
            limits,
            slots: Store::default(),
        }
    }

    /// Observable slot list.
    pub fn slots(&self) -> &Store<Vec<UploadSlot>> {
        &self.slots
    }

    /// Screen and upload `files`.
    ///
    /// # Errors
    ///
    /// Only `AuthExpired`; every other failure becomes a notice.
    pub async fn process_files(&self, files: Vec<LocalFile>, can_read_image: bool) -> Result<UploadReport> {
        let occupied = self.slots.read(Vec::len);
        let (accepted, notice) = select_files(files, occupied, can_read_image, &self.limits);
        let mut report = UploadReport {
            notices: notice.into_iter().collect(),
            ..UploadReport::default()
        };
        if accepted.is_empty() {
            return Ok(report);
        }

        let batch: Vec<(Uuid, LocalFile)> = accepted.into_iter().map(|f| (Uuid::new_v4(), f)).collect();
        self.slots.update(|slots| {
            slots.extend(batch.iter().map(|(id, f)| UploadSlot::Pending {
                id: *id,
                name: f.name.clone(),
            }));
        });

        let results = futures_util::future::join_all(batch.into_iter().map(|(id, file)| async move {
            let result = self
                .client
                .upload(file.endpoint(), &file.name, &file.mime, file.bytes.clone())
                .await;
            (id, file, result)
        }))
        .await;

        let mut auth_error = None;
        for (id, file, result) in results {
            match result {
                Ok(response) => {
                    let part = to_part(&file, response);
                    self.slots.update(|slots| {
                        if let Some(slot) = slots.iter_mut().find(|s| s.id() == id) {
                            *slot = UploadSlot::Ready { id, part };
                        }
                    });
                    report.uploaded += 1;
                }
                Err(e) => {
                    self.remove(id);
                    match e {
                        ClientError::AuthExpired(_) => auth_error = Some(e),
                        ClientError::Validation(_) => {
                            report.notices.push(format!("{} cannot be uploaded.", file.name));
                        }
                        ClientError::Upload(message) => report.notices.push(message),
                        other => {
                            tracing::warn!(file = %file.name, error = %other, "upload failed");
                            report.notices.push(format!("{}: processing failed.", file.name));
                        }
                    }
                }
            }
        }
        if let Some(e) = auth_error {
            return Err(e);
        }
        tracing::debug!(uploaded = report.uploaded, notices = report.notices.len(), "upload batch done");
        Ok(report)
    }

    /// Drop one attachment.
    pub fn remove(&self, id: Uuid) -> bool {
        self.slots.update_if(|slots| {
            let before = slots.len();
            slots.retain(|s| s.id() != id);
            slots.len() != before
        })
    }

    /// Whether any upload is still in flight.
    pub fn is_uploading(&self) -> bool {
        self.slots.read(|slots| slots.iter().any(UploadSlot::is_pending))
    }

    /// Whether a ready attachment is an image.
    pub fn has_image(&self) -> bool {
        self.slots.read(|slots| {
            slots
                .iter()
                .any(|s| matches!(s, UploadSlot::Ready { part, .. } if part.is_image()))
        })
    }

    /// Take the ready attachments for sending, leaving pending ones.
    pub fn take_ready(&self) -> Vec<ContentPart> {
        let mut ready = Vec::new();
        self.slots.update(|slots| {
            slots.retain(|slot| match slot {
                UploadSlot::Ready { part, .. } => {
                    ready.push(part.clone());
                    false
                }
                UploadSlot::Pending { .. } => true,
            });
        });
        ready
    }

    pub fn clear(&self) {
        self.slots.set(Vec::new());
    }
}

fn to_part(file: &LocalFile, response: UploadResponse) -> ContentPart {
    let name = response.name.unwrap_or_else(|| file.name.clone());
    let content = response.content.unwrap_or_default();
    let is_image = match response.kind.as_deref() {
        Some(kind) => kind == "image",
        None => file.is_image(),
    };
    if is_image {
        ContentPart::Image {
            name: Some(name),
            content,
        }
    } else {
        ContentPart::File {
            name,
            content,
            file_path: response.file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: usize) -> LocalFile {
        LocalFile::new(name, vec![0u8; size])
    }

    fn limits() -> UploadConfig {
        UploadConfig {
            max_files: 10,
            max_file_size_bytes: 1024,
        }
    }

    #[test]
    fn mime_is_guessed_from_name() {
        assert!(file("cat.PNG", 1).is_image());
        assert_eq!(file("notes.txt", 1).mime, "text/plain");
        assert_eq!(file("blob", 1).mime, "application/octet-stream");
        assert_eq!(file("a.jpg", 1).endpoint(), "/upload/image");
        assert_eq!(file("a.pdf", 1).endpoint(), "/upload/file");
    }

    #[test]
    fn image_without_vision_rejects_batch() {
        let (accepted, notice) = select_files(vec![file("a.txt", 1), file("b.png", 1)], 0, false, &limits());
        assert!(accepted.is_empty());
        assert_eq!(notice.as_deref(), Some(IMAGE_UNSUPPORTED));
    }

    #[test]
    fn overflow_truncates_to_remaining_with_one_notice() {
        let files = (0..5).map(|i| file(&format!("{i}.txt"), 1)).collect();
        let (accepted, notice) = select_files(files, 8, true, &limits());
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].name, "0.txt");
        assert_eq!(notice.as_deref(), Some(TOO_MANY_FILES));
    }

    #[test]
    fn oversize_files_are_dropped() {
        let (accepted, notice) = select_files(vec![file("a.txt", 1), file("big.txt", 2048)], 0, true, &limits());
        assert_eq!(accepted.len(), 1);
        assert!(notice.is_some_and(|n| n.contains("0MB")));
    }

    #[test]
    fn count_notice_wins_over_size_notice() {
        let files = vec![file("a.txt", 1), file("b.txt", 1), file("big.txt", 4096)];
        let (accepted, notice) = select_files(files, 9, true, &limits());
        assert_eq!(accepted.len(), 1);
        assert_eq!(notice.as_deref(), Some(TOO_MANY_FILES));
    }

    #[test]
    fn response_kind_picks_part_type() {
        let part = to_part(
            &file("doc.pdf", 1),
            UploadResponse {
                kind: Some("file".into()),
                name: Some("doc.pdf".into()),
                content: Some("text".into()),
                file_path: Some("/uploads/doc.pdf".into()),
                error: None,
            },
        );
        assert!(matches!(part, ContentPart::File { ref file_path, .. } if file_path.as_deref() == Some("/uploads/doc.pdf")));

        let image = to_part(&file("a.png", 1), UploadResponse::default());
        assert!(image.is_image());
    }
}
