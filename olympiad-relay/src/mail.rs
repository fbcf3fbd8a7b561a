use anyhow::anyhow;
use sailfish::TemplateOnce;
use tracing::info;

use olympiad_api::{Backend, Credentials, DocumentMail, RetryPolicy};
use olympiad_forms::Application;

use crate::config::{BackendConfig, MailArgs};

#[derive(TemplateOnce)]
#[template(path = "mail.stpl")]
struct MailBody<'a> {
  parent_name: &'a str,
  student_name: &'a str,
  grade: &'a str,
  test: &'a str,
}

pub fn compose(
  application: &Application,
  args: &MailArgs,
  file_name: &str,
  document: Vec<u8>,
) -> anyhow::Result<DocumentMail> {
  let to_email = match application.email.as_deref().map(str::trim) {
    None | Some("") => return Err(anyhow!("Application of {} has no email", application.student_name)),
    Some(email) => email.to_string(),
  };

  let body = MailBody {
    parent_name: application.parent_name.trim(),
    student_name: application.student_name.trim(),
    grade: application.grade.trim(),
    test: application.test.trim(),
  }
  .render_once()?;

  Ok(DocumentMail {
    to_email,
    cc_email: args.mail_cc.clone(),
    subject: args.mail_subject.clone(),
    body,
    file_name: file_name.to_string(),
    document,
  })
}

/// Sends filled forms through the backend's document mail endpoint.
pub struct Mailer {
  backend: Backend,
  credentials: Credentials,
  policy: RetryPolicy,
  args: MailArgs,
}

impl Mailer {
  pub fn new(config: BackendConfig, args: MailArgs) -> Self {
    Self {
      backend: config.backend,
      credentials: config.credentials,
      policy: config.policy,
      args,
    }
  }

  /// Returns the recipient.
  pub async fn send(
    &self,
    application: &Application,
    file_name: &str,
    document: Vec<u8>,
  ) -> anyhow::Result<String> {
    let mail = compose(application, &self.args, file_name, document)?;
    let recipient = mail.to_email.clone();

    let token = self.backend.login(&self.credentials, &self.policy).await?;
    self.backend.send_document(&token, mail).await?;
    info!("Mailed {} to {}", file_name, recipient);

    Ok(recipient)
  }
}
