use anyhow::anyhow;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::info;

use crate::backend::check;

/// Bucket of a Supabase compatible object storage, used to archive the schedule pdfs.
pub struct Storage {
  client: Client,
  url: Url,
  key: String,
  bucket: String,
}

impl Storage {
  pub fn new(url: Url, key: String, bucket: String) -> Self {
    Self {
      client: Client::new(),
      url,
      key,
      bucket,
    }
  }

  pub fn object_url(&self, folder: &str, file_name: &str) -> anyhow::Result<Url> {
    let mut url = self.url.clone();
    url
      .path_segments_mut()
      .map_err(|_| anyhow!("{} can not be a storage base url", self.url))?
      .pop_if_empty()
      .extend(["storage", "v1", "object", self.bucket.as_str(), folder, file_name]);

    Ok(url)
  }

  pub async fn upload(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
    let url = self.object_url(folder, file_name)?;

    let response = self
      .client
      .post(url.clone())
      .bearer_auth(&self.key)
      .header("apikey", &self.key)
      .header(CONTENT_TYPE, "application/pdf")
      .body(bytes)
      .send()
      .await?;

    check(response).await?;

    info!("Archived {} in bucket {}", url, self.bucket);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderMap, StatusCode};
  use axum::routing::post;
  use axum::Router;

  use super::*;

  async fn archive(headers: HeaderMap, body: axum::body::Bytes) -> (StatusCode, &'static str) {
    match headers.get("apikey").and_then(|value| value.to_str().ok()) {
      Some("key") if !body.is_empty() => (StatusCode::OK, "{}"),
      _ => (StatusCode::BAD_REQUEST, " duplicate object "),
    }
  }

  async fn storage(key: &str) -> Storage {
    let app = Router::new().route("/storage/v1/object/schedules/:folder/:file", post(archive));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    Storage::new(
      Url::parse(&format!("http://{addr}/")).unwrap(),
      key.to_string(),
      "schedules".to_string(),
    )
  }

  #[tokio::test]
  async fn upload_sends_key() {
    storage("key")
      .await
      .upload("2023-2024", "schedule.pdf", b"%PDF".to_vec())
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn rejected_upload_carries_status_and_body() {
    let err = storage("wrong")
      .await
      .upload("2023-2024", "schedule.pdf", b"%PDF".to_vec())
      .await
      .unwrap_err()
      .to_string();

    assert!(err.contains("400 Bad Request"), "{}", err);
    assert!(err.ends_with(": duplicate object"), "{}", err);
  }

  #[test]
  fn object_url_escapes_segments() {
    let storage = Storage::new(
      Url::parse("https://project.supabase.co/").unwrap(),
      "key".to_string(),
      "schedules".to_string(),
    );

    assert_eq!(
      storage.object_url("2023-2024", "Grafik 2024.pdf").unwrap().as_str(),
      "https://project.supabase.co/storage/v1/object/schedules/2023-2024/Grafik%202024.pdf"
    );
  }
}
