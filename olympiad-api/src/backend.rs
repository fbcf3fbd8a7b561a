use std::fmt;

use anyhow::anyhow;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dispatch::{OlympiadRecord, OlympiadSink};
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct Credentials {
  pub username_or_email: String,
  pub password: String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username_or_email", &self.username_or_email)
      .field("password", &"***")
      .finish()
  }
}

/// Bearer token returned by the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
  pub fn new(token: impl Into<String>) -> Self {
    Self(token.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Token(***)")
  }
}

#[derive(Debug, Serialize)]
struct LoginData<'a> {
  #[serde(rename = "usernameOrEmail")]
  username_or_email: &'a str,
  #[serde(rename = "Password")]
  password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
  token: String,
}

/// Mail with the filled form attached, relayed by the backend.
#[derive(Clone, Debug)]
pub struct DocumentMail {
  pub to_email: String,
  pub cc_email: Option<String>,
  pub subject: String,
  pub body: String,
  pub file_name: String,
  pub document: Vec<u8>,
}

/// Client of the olympiad backend api, e.g. `http://localhost:5138/api/`.
pub struct Backend {
  client: Client,
  base: Url,
}

impl Backend {
  pub fn new(base: Url) -> Self {
    let base = if base.path().ends_with('/') {
      base
    } else {
      let mut base = base;
      base.set_path(&format!("{}/", base.path()));
      base
    };

    Self {
      client: Client::new(),
      base,
    }
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  /// Logs in, retrying according to `policy`. Running out of attempts is fatal.
  pub async fn login(&self, credentials: &Credentials, policy: &RetryPolicy) -> anyhow::Result<Token> {
    let url = self.base.join("auth/login")?;

    let token = policy
      .run("login", |attempt| {
        let url = url.clone();
        async move {
          debug!("Login attempt {} as {}", attempt, credentials.username_or_email);

          let response = self
            .client
            .post(url)
            .json(&LoginData {
              username_or_email: &credentials.username_or_email,
              password: &credentials.password,
            })
            .send()
            .await?;

          Ok(check(response).await?.json::<LoginResponse>().await?.token)
        }
      })
      .await?;

    info!("Logged in as {}", credentials.username_or_email);
    Ok(Token(token))
  }

  pub async fn upload(&self, token: &Token, record: &OlympiadRecord) -> anyhow::Result<()> {
    let response = self
      .client
      .post(self.base.join("olympiad")?)
      .bearer_auth(token.as_str())
      .json(record)
      .send()
      .await?;
    check(response).await?;

    Ok(())
  }

  pub async fn send_document(&self, token: &Token, mail: DocumentMail) -> anyhow::Result<()> {
    let mut form = Form::new()
      .text("ToEmail", mail.to_email.clone())
      .text("Subject", mail.subject)
      .text("Body", mail.body)
      .part(
        "Document",
        Part::bytes(mail.document)
          .file_name(mail.file_name)
          .mime_str("application/pdf")?,
      );

    if let Some(cc) = mail.cc_email {
      form = form.text("CcEmail", cc);
    }

    let response = self
      .client
      .post(self.base.join("email/send-document")?)
      .bearer_auth(token.as_str())
      .multipart(form)
      .send()
      .await?;
    check(response).await?;

    info!("Mailed document to {}", mail.to_email);
    Ok(())
  }

  /// Pairs the client with a token for uploading records.
  pub fn authorized<'a>(&'a self, token: &'a Token) -> Authorized<'a> {
    Authorized {
      backend: self,
      token,
    }
  }
}

/// Turns error statuses into errors carrying the response body.
pub(crate) async fn check(response: Response) -> anyhow::Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let url = response.url().clone();
  let body = response.text().await.unwrap_or_default();
  Err(anyhow!("{} returned {}: {}", url, status, body.trim()))
}

pub struct Authorized<'a> {
  backend: &'a Backend,
  token: &'a Token,
}

impl OlympiadSink for Authorized<'_> {
  async fn send(&self, record: &OlympiadRecord) -> anyhow::Result<()> {
    self.backend.upload(self.token, record).await
  }
}
