//! Subcommand: `stockroom bot` -- Telegram gateway.
//!
//! Polls Telegram for operator events, translates them into typed
//! dialog events, and renders the replies as messages with inline
//! keyboards. The dialog and engine never see a Telegram type; this
//! file owns the whole transport boundary.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use stockroom_dialog::{AccessPolicy, Dialog, Event, Reply, Select};
use stockroom_engine::InventoryEngine;
use stockroom_mailcode::MailCodeClient;
use stockroom_store::{Database, GatewayStateStore, InventoryStore};

use crate::config::{load_bot_config, parse_operators};
use crate::helpers::{env_non_empty, init_tracing};

/// Buttons per keyboard row.
const KEYBOARD_ROW: usize = 2;

/// Key under which the poll offset is persisted.
const OFFSET_KEY: &str = "poll_offset";

/// Run the Telegram gateway.
pub async fn cmd_bot(poll_timeout: u64, operators: Option<String>) -> Result<()> {
    init_tracing("info");
    info!("starting Telegram gateway");

    // A panic in one update must not take the gateway down: log and
    // keep polling.
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        tracing::error!(location = %location, payload = %payload, "PANIC caught (non-fatal)");
    }));

    let cfg = load_bot_config();
    let allowed = operators
        .as_deref()
        .map(parse_operators)
        .unwrap_or(cfg.operators);
    if allowed.is_empty() {
        anyhow::bail!(
            "no operators configured. Set [bot] operators in config/default.toml \
             or pass --operators"
        );
    }

    let bot_token = env_non_empty("STOCKROOM_BOT_TOKEN")
        .or_else(|| env_non_empty("TELEGRAM_BOT_TOKEN"))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "STOCKROOM_BOT_TOKEN is required. Create a bot at https://t.me/BotFather"
            )
        })?;
    let telegram_api = format!("https://api.telegram.org/bot{bot_token}");
    let file_api = format!("https://api.telegram.org/file/bot{bot_token}");

    // Verify the token by calling getMe.
    let http = reqwest::Client::new();
    let me: serde_json::Value = http
        .get(format!("{telegram_api}/getMe"))
        .send()
        .await
        .context("failed to reach Telegram API")?
        .json()
        .await
        .context("failed to parse getMe response")?;

    if me.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        anyhow::bail!("Telegram getMe failed: {me}");
    }
    let bot_name = me
        .pointer("/result/username")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    // Database and domain wiring.
    if let Some(parent) = std::path::Path::new(&cfg.db_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let db = Database::open_and_migrate(cfg.db_path.clone())
        .await
        .context("failed to open database")?;

    let engine = InventoryEngine::new(InventoryStore::new(db.clone()));
    let gateway_state = GatewayStateStore::new(db);
    let dialog = Arc::new(Dialog::new(
        engine.clone(),
        AccessPolicy::new(allowed.clone()),
        Arc::new(MailCodeClient::new()),
    ));

    // Periodic retention sweep, independent of conversation activity.
    let sweeper = engine.clone();
    let sweep_interval = cfg.sweep_interval_secs;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            ticker.tick().await;
            match sweeper.retention_sweep(Utc::now()).await {
                Ok(removed) => info!(removed, "retention sweep finished"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    });

    println!();
    println!("  Stockroom Telegram Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("  Bot: @{bot_name}");
    println!("  Operators: {allowed:?}");
    println!("  Long-poll timeout: {poll_timeout}s");
    println!();
    println!("  Gateway is running. Press Ctrl+C to stop.");
    println!();

    // Restore the poll offset so restarts don't replay updates.
    let mut offset: i64 = gateway_state
        .get_i64(OFFSET_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or(0);
    if offset > 0 {
        info!(offset, "restored poll offset from database");
    }

    loop {
        let updates_resp = http
            .post(format!("{telegram_api}/getUpdates"))
            .json(&serde_json::json!({
                "offset": offset,
                "timeout": poll_timeout,
                "allowed_updates": ["message", "callback_query"],
            }))
            .send()
            .await;

        let updates: serde_json::Value = match updates_resp {
            Ok(resp) => match resp.json().await {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "failed to parse Telegram response");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    continue;
                }
            },
            Err(e) => {
                warn!(error = %e, "Telegram poll failed, retrying...");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        let results = updates
            .get("result")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for update in &results {
            let update_id = update.get("update_id").and_then(|v| v.as_i64()).unwrap_or(0);
            offset = update_id + 1;

            // Persist the offset before handling, so a crash mid-update
            // skips it rather than replaying it forever.
            let _ = gateway_state.set_i64(OFFSET_KEY, offset).await;

            if let Some((operator, chat_id, event)) =
                translate_update(&http, &telegram_api, &file_api, update).await
            {
                let reply = dialog.handle(operator, event).await;
                send_reply(&http, &telegram_api, chat_id, &reply).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Update translation
// ---------------------------------------------------------------------------

/// Turn one Telegram update into `(operator, chat_id, event)`.
///
/// Callback queries are answered (to dismiss the spinner) and parsed
/// via [`Select::parse`]; text messages become [`Event::Text`]; `.txt`
/// documents are downloaded and pre-split into [`Event::Batch`].
async fn translate_update(
    http: &reqwest::Client,
    telegram_api: &str,
    file_api: &str,
    update: &serde_json::Value,
) -> Option<(i64, i64, Event)> {
    if let Some(cb) = update.get("callback_query") {
        let cb_id = cb.get("id").and_then(|v| v.as_str()).unwrap_or("");
        let _ = http
            .post(format!("{telegram_api}/answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": cb_id }))
            .send()
            .await;

        let operator = cb.pointer("/from/id").and_then(|v| v.as_i64())?;
        let chat_id = cb.pointer("/message/chat/id").and_then(|v| v.as_i64())?;
        let data = cb.get("data").and_then(|v| v.as_str())?;

        let Some(select) = Select::parse(data) else {
            warn!(data, "unparseable callback token, ignoring");
            return None;
        };
        return Some((operator, chat_id, Event::Select(select)));
    }

    let message = update.get("message")?;
    let operator = message.pointer("/from/id").and_then(|v| v.as_i64())?;
    let chat_id = message.pointer("/chat/id").and_then(|v| v.as_i64())?;

    if let Some(document) = message.get("document") {
        let mime = document
            .get("mime_type")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if mime != "text/plain" {
            warn!(mime, "unsupported document type, ignoring");
            return None;
        }
        let file_id = document.get("file_id").and_then(|v| v.as_str())?;
        let lines = download_text_file(http, telegram_api, file_api, file_id).await?;
        return Some((operator, chat_id, Event::Batch(lines)));
    }

    let text = message.get("text").and_then(|v| v.as_str())?;
    info!(operator, chat_id, text, "incoming message");

    let event = if text == "/start" {
        Event::Start
    } else {
        Event::Text(text.to_string())
    };
    Some((operator, chat_id, event))
}

/// Fetch an uploaded text file's contents, split into lines.
async fn download_text_file(
    http: &reqwest::Client,
    telegram_api: &str,
    file_api: &str,
    file_id: &str,
) -> Option<Vec<String>> {
    let info: serde_json::Value = http
        .post(format!("{telegram_api}/getFile"))
        .json(&serde_json::json!({ "file_id": file_id }))
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;

    let file_path = info.pointer("/result/file_path").and_then(|v| v.as_str())?;

    let content = http
        .get(format!("{file_api}/{file_path}"))
        .send()
        .await
        .ok()?
        .text()
        .await
        .ok()?;

    Some(content.lines().map(str::to_string).collect())
}

// ---------------------------------------------------------------------------
// Reply rendering
// ---------------------------------------------------------------------------

/// Send a dialog reply as a Telegram message with an inline keyboard.
async fn send_reply(http: &reqwest::Client, telegram_api: &str, chat_id: i64, reply: &Reply) {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": reply.text,
    });

    if !reply.choices.is_empty() {
        let rows: Vec<Vec<serde_json::Value>> = reply
            .choices
            .chunks(KEYBOARD_ROW)
            .map(|row| {
                row.iter()
                    .map(|choice| {
                        serde_json::json!({
                            "text": choice.label,
                            "callback_data": choice.select.token(),
                        })
                    })
                    .collect()
            })
            .collect();
        body["reply_markup"] = serde_json::json!({ "inline_keyboard": rows });
    }

    let result = http
        .post(format!("{telegram_api}/sendMessage"))
        .json(&body)
        .send()
        .await;

    if let Err(e) = result {
        warn!(chat_id, error = %e, "failed to send reply");
    }
}
