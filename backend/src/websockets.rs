use crate::chat::ChatSession;
use crate::model::{ChatCommand, ChatEvent};
use crate::speech::{CaptureOutcome, VoiceTicket};
use crate::AppState;
use actix_web::{web, HttpRequest, Responder};
use actix_ws::Message;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// **GET /ws**
///
/// One chat window per connection. Incoming frames are [`ChatCommand`]s;
/// everything the window should show comes back as [`ChatEvent`]s.
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<impl Responder, actix_web::Error> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();

    let chat = ChatSession::new(
        data.repo.clone(),
        data.triage.clone(),
        data.settings.typing_delay,
        &data.settings.speech_lang,
    );
    let conn_id = Uuid::new_v4();
    log::info!("💬 Chat {} opened", conn_id);

    actix_rt::spawn(async move {
        loop {
            tokio::select! {
                val = msg_stream.next() => {
                    match val {
                        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ChatCommand>(&text) {
                            Ok(ChatCommand::Message { text }) => {
                                // Replies take the typing delay; keep reading meanwhile.
                                let chat = chat.clone();
                                let tx = tx.clone();
                                actix_rt::spawn(async move {
                                    if let Err(e) = chat.submit(&text, &tx).await {
                                        let _ = tx.send(ChatEvent::Notice { message: e.to_string() });
                                    }
                                });
                            }
                            Ok(ChatCommand::VoiceStart) => {
                                chat.start_listening(&tx);
                            }
                            Ok(ChatCommand::VoiceEnd { session: ticket, transcript, error, supported }) => {
                                let chat = chat.clone();
                                let tx = tx.clone();
                                let outcome = CaptureOutcome::from_report(supported, transcript, error);
                                actix_rt::spawn(async move {
                                    if let Err(e) = chat.finish_listening(VoiceTicket(ticket), outcome, &tx).await {
                                        let _ = tx.send(ChatEvent::Notice { message: e.to_string() });
                                    }
                                });
                            }
                            Err(e) => {
                                log::warn!("⚠️ Chat {} sent an unknown frame: {}", conn_id, e);
                            }
                        },
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        None => break,
                        _ => {}
                    }
                }
                Some(event) = rx.recv() => {
                    let Ok(frame) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if session.text(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
        log::info!("💬 Chat {} closed", conn_id);
        let _ = session.close(None).await;
    });

    Ok(res)
}
