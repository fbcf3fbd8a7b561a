use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use olympiad_forms::Application;

use crate::config::{FormConfig, FILLED_FILE_NAME};
use crate::mail::Mailer;

pub struct AppState {
  pub form: FormConfig,
  pub mailer: Option<Mailer>,
}

#[derive(Serialize)]
struct Filled {
  message: String,
  output_file: String,
}

#[derive(Serialize)]
struct Failure {
  error: String,
}

/// Missing template or font files answer 404, everything else 500.
struct AppError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for AppError {
  fn from(err: E) -> Self {
    Self(err.into())
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let not_found = self.0.chain().any(|cause| {
      cause
        .downcast_ref::<io::Error>()
        .is_some_and(|err| err.kind() == io::ErrorKind::NotFound)
    });
    let status = if not_found {
      StatusCode::NOT_FOUND
    } else {
      StatusCode::INTERNAL_SERVER_ERROR
    };

    error!("Unable to fill form: {:#}", self.0);
    (status, Json(Failure { error: format!("{:#}", self.0) })).into_response()
  }
}

async fn fill_pdf(
  State(state): State<Arc<AppState>>,
  Json(application): Json<Application>,
) -> Result<Json<Filled>, AppError> {
  let form = state.form.clone();
  let filled = application.clone();
  let document =
    tokio::task::spawn_blocking(move || form.filler()?.fill_to(&filled, &form.output)).await??;
  info!("Filled form for {}", application.student_name);

  let mut message = "PDF filled successfully!".to_string();
  if let Some(mailer) = &state.mailer {
    let recipient = mailer.send(&application, FILLED_FILE_NAME, document).await?;
    message = format!("PDF filled successfully and sent to {}!", recipient);
  }

  Ok(Json(Filled {
    message,
    output_file: state.form.output.display().to_string(),
  }))
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/fill_pdf", post(fill_pdf))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(Arc::new(state))
}

pub async fn serve(listen: SocketAddr, state: AppState) -> anyhow::Result<()> {
  let listener = TcpListener::bind(listen).await?;
  info!("Listening on {}", listener.local_addr()?);

  axum::serve(listener, router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    error!("Unable to listen for shutdown signal: {}", err);
  }
}
