use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

// Internal modules
mod api;
mod charts;
mod chat;
mod config;
mod error;
mod intake;
mod ledger;
mod model;
mod session;
mod speech;
mod store;
mod triage;
mod view;
mod websockets;


use crate::charts::ChartBoard;
use crate::config::Settings;
use crate::session::SessionContext;
use crate::store::{KeyValueStore, MemoryStore, Repository, SqliteStore};
use crate::triage::TriageEngine;

/// **Global Application State**
///
/// One local user at a time, so a single session context guards every
/// request that reads or moves the session.
/// - `repo`: typed access to the key/value store.
/// - `session`: in-memory mirror of the active session.
/// - `charts`: the live chart per canvas.
/// - `triage`: keyword rules shared by every chat connection.
pub struct AppState {
    pub repo: Repository,
    pub session: tokio::sync::Mutex<SessionContext>,
    pub charts: std::sync::Mutex<ChartBoard>,
    pub triage: Arc<TriageEngine>,
    pub settings: Settings,
}

impl AppState {
    /// Resumes whatever session the store still holds.
    pub async fn open(repo: Repository, settings: Settings) -> error::Result<Self> {
        let session = SessionContext::resume(&repo).await?;
        if let Some(user) = session.user.as_ref() {
            log::info!("🔁 Resuming session for {:?}", user.user_id);
        }
        Ok(Self {
            repo,
            session: tokio::sync::Mutex::new(session),
            charts: std::sync::Mutex::new(ChartBoard::default()),
            triage: Arc::new(TriageEngine::default()),
            settings,
        })
    }
}

async fn open_store(settings: &Settings) -> error::Result<Arc<dyn KeyValueStore>> {
    if settings.uses_memory_store() {
        log::warn!("⚠️ Using in-memory store; nothing survives a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(SqliteStore::connect(&settings.database_url).await?))
}

/// **Application Entry Point**
///
/// Loads settings, opens the store, resumes the session and serves the API.
#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 1. Environment + logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let settings = Settings::from_env();

    // 2. Storage
    let store = open_store(&settings)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    // 3. Application state
    let state = AppState::open(Repository::new(store), settings.clone())
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let app_state = web::Data::new(state);

    log::info!("🚀 VitalDesk started at http://{}:{}", settings.host, settings.port);

    // 4. HTTP server
    HttpServer::new(move || {
        let cors = actix_cors::Cors::permissive();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(api::configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await
}
