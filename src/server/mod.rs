//! HTTP surface: `POST /predict` and `POST /sprite`, both taking a
//! multipart upload in the `file` field.

pub mod error;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use image::DynamicImage;
use tokio::{net::TcpListener, signal};
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::features::{AttributeExtractor, FeatureSet};
use crate::llm::VisionClient;
use crate::sprite::{AssetStore, SpriteComposer};

/// Multipart field carrying the photo.
pub const UPLOAD_FIELD: &str = "file";

/// Request-independent collaborators shared by every handler.
pub struct AppState {
    pub extractor: AttributeExtractor,
    pub composer: SpriteComposer,
    /// Parent of the per-request scratch directories.
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(
        extractor: AttributeExtractor,
        composer: SpriteComposer,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            extractor,
            composer,
            output_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = VisionClient::from_config(&config.llm);
        Self::new(
            AttributeExtractor::new(client),
            SpriteComposer::new(AssetStore::from_config(&config.assets)),
            config.server.output_dir.clone(),
        )
    }
}

pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/sprite", post(sprite))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<FeatureSet>> {
    let upload = read_upload(multipart).await?;

    let features = run_blocking(move || {
        let image = decode_image(&upload)?;
        Ok(state.extractor.extract(&image)?)
    })
    .await?;

    info!(
        hair_color = %features.hair_color,
        cap_color = %features.cap_color,
        top_style = %features.top_style,
        "Predicted features"
    );
    Ok(Json(features))
}

async fn sprite(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let upload = read_upload(multipart).await?;

    let png = run_blocking(move || {
        let image = decode_image(&upload)?;
        let features = state.extractor.extract(&image)?;

        // Each request composes inside its own directory, removed on drop
        fs::create_dir_all(&state.output_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix("sprite-")
            .tempdir_in(&state.output_dir)?;
        let path = state
            .composer
            .compose(&features, &scratch.path().join("sprite.png"))?;
        Ok(fs::read(path)?)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Bytes of the first `file` field. Other fields are ignored.
async fn read_upload(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Bytes> {
    let mut multipart = multipart.map_err(|e| Error::invalid_upload(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_upload(e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| Error::invalid_upload(e.body_text()));
        }
    }

    Err(Error::invalid_upload(format!(
        "missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::invalid_image(e.to_string()))
}

/// Inference and image work block, so they run off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn run(config: &Config, state: AppState) -> anyhow::Result<()> {
    let router = build_router(Arc::new(state), config.server.max_upload_bytes);

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
