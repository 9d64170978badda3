//! HTTP client for the intake server

use crate::config::IntakeConfig;
use crate::error::{Error, Result};
use crate::session::token::TokenResponse;
use crate::upload::{Category, FileEntry, FileSource, UploadResponse};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde_json::json;
use tokio_util::io::ReaderStream;

/// Multipart field every file of a batch is sent under
pub const FILES_FIELD: &str = "files";

/// Server operations the intake pipeline depends on
#[async_trait]
pub trait IntakeApi: Send + Sync {
    /// Post one batch to the category's upload endpoint.
    ///
    /// A non-success HTTP status is returned as [`Error::Transport`]; a parsed body is returned
    /// as-is, including `success: false`.
    async fn send_batch(&self, category: Category, batch: &[FileEntry]) -> Result<UploadResponse>;

    /// Hand an access token to the server
    async fn register_token(&self, token: &str) -> Result<TokenResponse>;
}

#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    config: IntakeConfig,
}

impl HttpApi {
    pub fn new(config: &IntakeConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config: config.clone(),
        })
    }

    /// Multipart form for `batch`. File content is streamed from disk as the request is sent,
    /// so a batch never has to fit in memory.
    async fn build_form(batch: &[FileEntry]) -> Result<Form> {
        let mut form = Form::new();
        for entry in batch {
            let part = match &entry.source {
                FileSource::Disk(path) => {
                    let file = tokio::fs::File::open(path).await?;
                    let length = file.metadata().await?.len();
                    Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
                }
                FileSource::Memory(bytes) => {
                    let length = bytes.len() as u64;
                    let reader = std::io::Cursor::new(bytes.clone());
                    Part::stream_with_length(Body::wrap_stream(ReaderStream::new(reader)), length)
                }
                FileSource::Restored => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{}: content is not available after a restore", entry.name),
                    )))
                }
            };
            form = form.part(FILES_FIELD, part.file_name(entry.name.clone()));
        }
        Ok(form)
    }
}

#[async_trait]
impl IntakeApi for HttpApi {
    async fn send_batch(&self, category: Category, batch: &[FileEntry]) -> Result<UploadResponse> {
        let url = self.config.endpoint(category.upload_route());
        let form = Self::build_form(batch).await?;

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<UploadResponse>().await?)
    }

    async fn register_token(&self, token: &str) -> Result<TokenResponse> {
        let url = self.config.endpoint("token");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "token": token }))
            .send()
            .await?;
        let status = response.status();

        // The server reports most failures in the body, so read it whatever the status
        match response.json::<TokenResponse>().await {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(Error::Transport {
                status: status.as_u16(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::EntryId;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpApi {
        let config = IntakeConfig {
            server_url: server.uri(),
            ..Default::default()
        };
        HttpApi::new(&config).unwrap()
    }

    fn memory_entry(id: u64, name: &str, content: &'static [u8]) -> FileEntry {
        FileEntry {
            id: EntryId(id),
            name: name.to_string(),
            size: content.len() as u64,
            category: Category::Csv,
            source: FileSource::Memory(Arc::from(content)),
        }
    }

    #[tokio::test]
    async fn test_batch_is_posted_as_multipart_files() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/csv"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "skipped": [{"name": "b.csv", "reason": "duplicate"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = vec![
            memory_entry(1, "a.csv", b"date,amount\n"),
            memory_entry(2, "b.csv", b"date,amount\n"),
        ];
        let response = api_for(&server)
            .send_batch(Category::Csv, &batch)
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.skipped.len(), 1);
        assert_eq!(response.skipped[0].reason, "duplicate");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert_eq!(body.matches("name=\"files\"").count(), 2);
        assert!(body.contains("filename=\"a.csv\""));
        assert!(body.contains("filename=\"b.csv\""));
    }

    #[tokio::test]
    async fn test_disk_files_are_read_at_send_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.md");
        std::fs::write(&file_path, "# quarterly notes").unwrap();
        let entry = FileEntry {
            id: EntryId(1),
            name: "notes.md".into(),
            size: 17,
            category: Category::Docs,
            source: FileSource::Disk(file_path),
        };

        api_for(&server)
            .send_batch(Category::Docs, &[entry])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(String::from_utf8_lossy(&requests[0].body).contains("# quarterly notes"));
    }

    #[tokio::test]
    async fn test_large_disk_file_arrives_intact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        // Several read chunks' worth, with a recognisable pattern
        let content: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("scan.pdf");
        std::fs::write(&file_path, &content).unwrap();
        let entry = FileEntry {
            id: EntryId(1),
            name: "scan.pdf".into(),
            size: content.len() as u64,
            category: Category::Docs,
            source: FileSource::Disk(file_path),
        };

        api_for(&server)
            .send_batch(Category::Docs, &[entry])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        assert!(body
            .windows(content.len())
            .any(|window| window == content.as_slice()));
    }

    #[tokio::test]
    async fn test_missing_disk_file_fails_before_sending() {
        let server = MockServer::start().await;
        let entry = FileEntry {
            id: EntryId(1),
            name: "gone.pdf".into(),
            size: 10,
            category: Category::Docs,
            source: FileSource::Disk("/definitely/not/here/gone.pdf".into()),
        };

        let err = api_for(&server)
            .send_batch(Category::Docs, &[entry])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_becomes_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .send_batch(Category::Csv, &[memory_entry(1, "a.csv", b"x")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { status: 500 }));
    }

    #[tokio::test]
    async fn test_restored_entries_cannot_be_sent() {
        let server = MockServer::start().await;
        let entry = FileEntry {
            id: EntryId(1),
            name: "old.csv".into(),
            size: 0,
            category: Category::Csv,
            source: FileSource::Restored,
        };

        let err = api_for(&server)
            .send_batch(Category::Csv, &[entry])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_is_posted_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_json(serde_json::json!({"token": "abc123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "saved",
                "company_name": "Example KK"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = api_for(&server).register_token("abc123").await.unwrap();
        assert!(response.success);
        assert_eq!(response.company_name.as_deref(), Some("Example KK"));
    }

    #[tokio::test]
    async fn test_token_failure_body_is_returned_even_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "success": false,
                "error": "token rejected"
            })))
            .mount(&server)
            .await;

        let response = api_for(&server).register_token("bad").await.unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("token rejected"));
    }

    #[tokio::test]
    async fn test_token_error_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = api_for(&server).register_token("abc").await.unwrap_err();
        assert!(matches!(err, Error::Transport { status: 502 }));
    }
}
