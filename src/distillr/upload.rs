//! File upload through pre-signed URLs
//!
//! Flow:
//! 1. Describe every file (name, size, guessed MIME type, target path)
//! 2. POST the descriptions to `/dataSource/{token}/file`
//! 3. PUT each file's bytes to the pre-signed URL at the same position
//!
//! Upload stops at the first rejected PUT. Files already sent stay uploaded.

use super::error::{DistillrError, Result};
use super::models::{FileDescriptor, FileUploadRequest, PresignedUrlsResponse};
use super::session::Session;
use super::token::Token;
use std::path::Path;
use tracing::{debug, info};

/// Content type sent with every PUT, whatever the file's declared type
const UPLOAD_CONTENT_TYPE: &str = "text/plain";

pub struct FileUploader<'a> {
    session: &'a Session,
}

impl<'a> FileUploader<'a> {
    pub fn new(session: &'a Session) -> Self {
        FileUploader { session }
    }

    pub async fn upload<P: AsRef<Path>>(&self, data_source: &Token, paths: &[P]) -> Result<()> {
        let url = self
            .session
            .config()
            .route(&format!("dataSource/{}/file", data_source));
        self.session.authorize(&url)?;

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(describe(path.as_ref()).await?);
        }

        let body = serde_json::to_value(FileUploadRequest { files: &files })?;
        let reply: PresignedUrlsResponse =
            serde_json::from_value(self.session.post(&url, &body).await?)?;

        if reply.presigned_urls.len() != files.len() {
            return Err(DistillrError::server(
                &url,
                format!(
                    "expected {} pre-signed URLs, got {}",
                    files.len(),
                    reply.presigned_urls.len()
                ),
                None,
            ));
        }

        for (path, target) in paths.iter().zip(&reply.presigned_urls) {
            let path = path.as_ref();
            let bytes = tokio::fs::read(path).await?;
            debug!(file = %path.display(), bytes = bytes.len(), "uploading");

            let status = self
                .session
                .transport()
                .put_bytes(target, bytes, UPLOAD_CONTENT_TYPE)
                .await?;
            if !(200..300).contains(&status) {
                return Err(DistillrError::FileUpload {
                    url: target.clone(),
                    path: path.display().to_string(),
                    status,
                });
            }
        }

        info!(%data_source, files = files.len(), "files uploaded");
        Ok(())
    }
}

async fn describe(path: &Path) -> Result<FileDescriptor> {
    let metadata = tokio::fs::metadata(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DistillrError::Config(format!("{} does not name a file", path.display()))
        })?;

    Ok(FileDescriptor {
        size: metadata.len(),
        content_type: mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
        path: format!("/{}", name),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distillr::session::tests::{logged_in, BASE};
    use crate::distillr::testing::{Call, ScriptedTransport};
    use serde_json::json;

    const TARGET_1: &str = "https://s3.test/uploads/weekdays.csv?X-Amz-Signature=1";
    const TARGET_2: &str = "https://s3.test/uploads/months.bin?X-Amz-Signature=2";

    fn fixture_files(dir: &tempfile::TempDir) -> Vec<std::path::PathBuf> {
        let weekdays = dir.path().join("weekdays.csv");
        let months = dir.path().join("months.bin");
        std::fs::write(&weekdays, "day\nMonday\nTuesday\n").unwrap();
        std::fs::write(&months, [0u8, 1, 2, 3]).unwrap();
        vec![weekdays, months]
    }

    #[tokio::test]
    async fn test_positional_upload() {
        let dir = tempfile::tempdir().unwrap();
        let files = fixture_files(&dir);
        let (session, transport) = logged_in(ScriptedTransport::new().reply(
            &format!("{BASE}/dataSource/5555555/file"),
            json!({"presignedUrls": [TARGET_1, TARGET_2]}),
        ))
        .await;

        FileUploader::new(&session)
            .upload(&Token::from(5555555u64), &files)
            .await
            .unwrap();

        let calls = transport.calls();
        let posted = calls
            .iter()
            .find_map(|c| match c {
                Call::Post(_, body) => Some(body.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            posted,
            json!({"files": [
                {"name": "weekdays.csv", "size": 19, "type": "text/csv", "path": "/weekdays.csv"},
                {"name": "months.bin", "size": 4, "type": "application/octet-stream", "path": "/months.bin"}
            ]})
        );

        let puts: Vec<_> = calls
            .into_iter()
            .filter_map(|c| match c {
                Call::Put(url, bytes, content_type) => Some((url, bytes, content_type)),
                _ => None,
            })
            .collect();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].0, TARGET_1);
        assert_eq!(puts[0].1, b"day\nMonday\nTuesday\n".to_vec());
        assert_eq!(puts[1].0, TARGET_2);
        assert_eq!(puts[1].1, vec![0u8, 1, 2, 3]);
        assert!(puts.iter().all(|(_, _, ct)| ct == "text/plain"));
    }

    #[tokio::test]
    async fn test_stops_at_first_rejected_put() {
        let dir = tempfile::tempdir().unwrap();
        let files = fixture_files(&dir);
        let (session, transport) = logged_in(
            ScriptedTransport::new()
                .reply(
                    &format!("{BASE}/dataSource/5555555/file"),
                    json!({"presignedUrls": [TARGET_1, TARGET_2]}),
                )
                .put_status(TARGET_1, 403),
        )
        .await;

        let err = FileUploader::new(&session)
            .upload(&Token::from(5555555u64), &files)
            .await
            .unwrap_err();

        match err {
            DistillrError::FileUpload { url, status, path } => {
                assert_eq!(url, TARGET_1);
                assert_eq!(status, 403);
                assert!(path.ends_with("weekdays.csv"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let puts = transport
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Put(..)))
            .count();
        assert_eq!(puts, 1);
    }

    #[tokio::test]
    async fn test_url_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let files = fixture_files(&dir);
        let (session, _) = logged_in(ScriptedTransport::new().reply(
            &format!("{BASE}/dataSource/5555555/file"),
            json!({"presignedUrls": [TARGET_1]}),
        ))
        .await;

        let err = FileUploader::new(&session)
            .upload(&Token::from(5555555u64), &files)
            .await
            .unwrap_err();
        assert!(matches!(err, DistillrError::Server { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_request() {
        let (session, transport) = logged_in(ScriptedTransport::new()).await;
        let before = transport.calls().len();

        let err = FileUploader::new(&session)
            .upload(&Token::from(5555555u64), &["/definitely/not/here.csv"])
            .await
            .unwrap_err();

        assert!(matches!(err, DistillrError::Io(_)));
        assert_eq!(transport.calls().len(), before);
    }
}
