use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::chat::QUICK_SYMPTOMS;
use crate::error::{HealthError, Result};
use crate::intake::IntakeTracker;
use crate::ledger::VitalsLedger;
use crate::model::{LoginForm, PublicUser, Questionnaire, RegisterForm, Theme, VitalsInput};
use crate::session::{derived_id, IdentityManager};
use crate::view::{history_lines, last_vitals, ProfileCard};
use crate::websockets::ws_handler;
use crate::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/register", web::post().to(register))
        .route("/api/login", web::post().to(login))
        .route("/api/logout", web::post().to(logout))
        .route("/api/session", web::get().to(current_session))
        .route("/api/questionnaire", web::post().to(submit_questionnaire))
        .route("/api/conditions", web::get().to(list_conditions))
        .route("/api/conditions", web::post().to(save_conditions))
        .route("/api/conditions/toggle", web::post().to(toggle_condition))
        .route("/api/records", web::post().to(append_record))
        .route("/api/records", web::get().to(list_records))
        .route("/api/records/latest", web::get().to(latest_record))
        .route("/api/charts", web::get().to(charts))
        .route("/api/profile", web::get().to(profile))
        .route("/api/preferences", web::get().to(preferences))
        .route("/api/preferences/theme", web::post().to(toggle_theme))
        .route("/api/preferences/voice", web::post().to(toggle_voice))
        .route("/api/chat/chips", web::get().to(chat_chips))
        .route("/ws", web::get().to(ws_handler));
}

/// **POST /api/register**
///
/// Creates the account and opens a session for it.
async fn register(data: web::Data<AppState>, form: web::Json<RegisterForm>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let user = IdentityManager::new(&data.repo, &mut ctx).register(form.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "user": PublicUser::from(&user), "token": ctx.token })))
}

/// **POST /api/login**
async fn login(data: web::Data<AppState>, form: web::Json<LoginForm>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let user = IdentityManager::new(&data.repo, &mut ctx).login(form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": PublicUser::from(&user), "token": ctx.token })))
}

/// **POST /api/logout**
async fn logout(data: web::Data<AppState>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    IdentityManager::new(&data.repo, &mut ctx).logout().await?;
    Ok(HttpResponse::NoContent().finish())
}

/// **GET /api/session**
///
/// The active user (if any) and the identifier their data is filed under.
async fn current_session(data: web::Data<AppState>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let mut identity = IdentityManager::new(&data.repo, &mut ctx);
    let user = identity.current_session().await?;
    let derived = identity.derived_id().await?;
    Ok(HttpResponse::Ok().json(json!({
        "user": user.as_ref().map(PublicUser::from),
        "derivedId": derived,
    })))
}

/// **POST /api/questionnaire**
///
/// Replies with the screen to show next.
async fn submit_questionnaire(data: web::Data<AppState>, answers: web::Json<Questionnaire>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let next = IntakeTracker::new(&data.repo, &mut ctx)
        .submit_questionnaire(answers.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "next": next })))
}

/// **GET /api/conditions**
///
/// Resets the draft to the saved selection and lists the catalog.
async fn list_conditions(data: web::Data<AppState>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let catalog = IntakeTracker::new(&data.repo, &mut ctx).populate_conditions().await?;
    Ok(HttpResponse::Ok().json(catalog))
}

#[derive(Deserialize)]
struct ToggleRequest {
    label: String,
}

/// **POST /api/conditions/toggle**
async fn toggle_condition(data: web::Data<AppState>, req: web::Json<ToggleRequest>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let selected = IntakeTracker::new(&data.repo, &mut ctx).toggle_condition(&req.label)?;
    Ok(HttpResponse::Ok().json(json!({ "label": req.label, "selected": selected })))
}

/// **POST /api/conditions**
///
/// Saves the current draft.
async fn save_conditions(data: web::Data<AppState>) -> Result<HttpResponse> {
    let mut ctx = data.session.lock().await;
    let saved = IntakeTracker::new(&data.repo, &mut ctx).save_draft().await?;
    Ok(HttpResponse::Ok().json(json!({ "conditions": saved })))
}

/// **POST /api/records**
async fn append_record(data: web::Data<AppState>, input: web::Json<VitalsInput>) -> Result<HttpResponse> {
    let ctx = data.session.lock().await;
    let entry = VitalsLedger::new(&data.repo, &ctx).append_entry(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(entry))
}

/// **GET /api/records**
///
/// Raw entries (oldest first) plus the rendered history and summary line.
async fn list_records(data: web::Data<AppState>) -> Result<HttpResponse> {
    let ctx = data.session.lock().await;
    let entries = VitalsLedger::new(&data.repo, &ctx).list_entries().await?;
    Ok(HttpResponse::Ok().json(json!({
        "history": history_lines(&entries),
        "lastVitals": last_vitals(&entries),
        "entries": entries,
    })))
}

/// **GET /api/records/latest**
async fn latest_record(data: web::Data<AppState>) -> Result<HttpResponse> {
    let ctx = data.session.lock().await;
    let latest = VitalsLedger::new(&data.repo, &ctx).latest().await?;
    Ok(HttpResponse::Ok().json(latest))
}

/// **GET /api/charts**
///
/// Fresh chart descriptors for the four canvases; previous ones are disposed.
async fn charts(data: web::Data<AppState>) -> Result<HttpResponse> {
    let entries = {
        let ctx = data.session.lock().await;
        VitalsLedger::new(&data.repo, &ctx).list_entries().await?
    };
    let mut board = data
        .charts
        .lock()
        .map_err(|e| HealthError::Storage(format!("chart board poisoned: {}", e)))?;
    Ok(HttpResponse::Ok().json(board.regenerate(&entries)))
}

/// **GET /api/profile**
async fn profile(data: web::Data<AppState>) -> Result<HttpResponse> {
    let ctx = data.session.lock().await;
    let pointer = data.repo.current_user().await?;
    let id = derived_id(&data.repo, &ctx).await?;
    let cached = data.repo.raw_conditions_for(&id).await?;
    let card = ProfileCard::build(ctx.user.as_ref(), pointer.as_ref(), cached.as_deref());
    Ok(HttpResponse::Ok().json(card))
}

/// **GET /api/preferences**
async fn preferences(data: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(data.repo.preferences().await?))
}

/// **POST /api/preferences/theme**
async fn toggle_theme(data: web::Data<AppState>) -> Result<HttpResponse> {
    let prefs = data.repo.preferences().await?;
    let theme = match prefs.theme {
        Theme::Dark => Theme::Light,
        Theme::Light => Theme::Dark,
    };
    data.repo.set_theme(theme).await?;
    Ok(HttpResponse::Ok().json(data.repo.preferences().await?))
}

/// **POST /api/preferences/voice**
async fn toggle_voice(data: web::Data<AppState>) -> Result<HttpResponse> {
    let prefs = data.repo.preferences().await?;
    data.repo.set_voice_enabled(!prefs.voice_enabled).await?;
    Ok(HttpResponse::Ok().json(data.repo.preferences().await?))
}

/// **GET /api/chat/chips**
async fn chat_chips() -> HttpResponse {
    HttpResponse::Ok().json(QUICK_SYMPTOMS)
}
