//! The conversation state machine.
//!
//! [`Dialog::handle`] is the single entry point: authorization first,
//! then one `match` over `(stage, event)` that invokes the inventory
//! engine and produces the next stage plus a [`Reply`]. All storage
//! and engine errors are folded into the reply — the conversation
//! never propagates an error to the transport.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use stockroom_engine::{EngineError, HISTORY_PAGE_SIZE, InventoryEngine, Statistics};

use crate::event::{AdminAction, Event, MenuAction, Select};
use crate::reply::{self, Choice, Reply};
use crate::resolver::CodeResolver;
use crate::session::{FormatOrigin, Intent, SessionRegistry, Stage};

const GREETING: &str = "Account inventory. Choose an action:";
const ADMIN_PROMPT: &str = "Admin panel:";
const ACCESS_DENIED: &str = "You do not have access to this bot.";
const CODE_PROMPT: &str =
    "Send the account as email|emailpass|login|pass|reftoken|clientid.";
const FORMAT_PROMPT: &str =
    "Type the new format (e.g. email|emailpass|login|pass|reftoken|clientid):";
const BATCH_PROMPT: &str =
    "Upload a .txt file with accounts, or paste them here, one per line:";

// ═══════════════════════════════════════════════════════════════════════
//  Access policy
// ═══════════════════════════════════════════════════════════════════════

/// Allow-list of operator identities.
///
/// Deny by default: an empty list permits nobody.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed: Vec<i64>,
}

impl AccessPolicy {
    pub fn new(allowed: Vec<i64>) -> Self {
        Self { allowed }
    }

    pub fn permits(&self, operator: i64) -> bool {
        self.allowed.contains(&operator)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Dialog
// ═══════════════════════════════════════════════════════════════════════

/// Per-operator conversation controller over the inventory engine.
pub struct Dialog {
    engine: InventoryEngine,
    policy: AccessPolicy,
    resolver: Arc<dyn CodeResolver>,
    sessions: SessionRegistry,
}

impl Dialog {
    pub fn new(
        engine: InventoryEngine,
        policy: AccessPolicy,
        resolver: Arc<dyn CodeResolver>,
    ) -> Self {
        Self {
            engine,
            policy,
            resolver,
            sessions: SessionRegistry::new(),
        }
    }

    /// Process one operator event and produce the render instruction.
    ///
    /// Unauthorized operators are rejected before any session or store
    /// access. The session registry is only locked around the take/put
    /// pair, never across an engine call — the gateway delivers one
    /// event at a time per operator.
    pub async fn handle(&self, operator: i64, event: Event) -> Reply {
        if !self.policy.permits(operator) {
            warn!(operator, "unauthorized event rejected");
            return Reply::text(ACCESS_DENIED);
        }

        let stage = self.sessions.take(operator);
        debug!(operator, ?stage, ?event, "dialog event");
        let (next, reply) = self.transition(stage, event).await;
        self.sessions.put(operator, next);
        reply
    }

    /// Current stage of an operator's session, if one exists.
    /// Introspection for transports and tests.
    pub fn current_stage(&self, operator: i64) -> Option<Stage> {
        self.sessions.stage_of(operator)
    }

    // ── transition table ─────────────────────────────────────────────

    async fn transition(&self, stage: Stage, event: Event) -> (Stage, Reply) {
        // Global escapes work from any stage and drop all flow data.
        let event = match event {
            Event::Start => return main_menu(GREETING),
            Event::Select(Select::Back) => return main_menu(GREETING),
            Event::Select(Select::BackToAdmin) => return admin_menu(ADMIN_PROMPT),
            other => other,
        };

        match (stage, event) {
            // ── main menu ────────────────────────────────────────────
            (Stage::MainMenu, Event::Select(Select::Menu(action))) => {
                self.from_main_menu(action).await
            }

            // ── category selection ───────────────────────────────────
            (Stage::ChoosingCategory { intent }, Event::Select(Select::Category(name))) => {
                self.with_category(intent, name).await
            }
            (Stage::ChoosingCategory { intent: Intent::Add }, Event::Select(Select::NewCategory)) => (
                Stage::NamingCategory { intent: Intent::Add },
                Reply::with_choices("Type the name of the new category:", reply::back_choices()),
            ),
            (Stage::NamingCategory { intent }, Event::Text(name)) => {
                match self.engine.create_category(&name, Utc::now()).await {
                    Ok(()) => {
                        info!(category = %name.trim(), "category created");
                        main_menu(format!("Category '{}' created.", name.trim()))
                    }
                    Err(err) => self.fold_err(
                        Stage::NamingCategory { intent },
                        err,
                        reply::back_choices(),
                    ),
                }
            }

            // ── add flow ─────────────────────────────────────────────
            (Stage::AwaitingBatch { category }, Event::Text(text)) => {
                let lines = text.lines().map(str::to_string).collect();
                self.accept_batch(category, lines).await
            }
            (Stage::AwaitingBatch { category }, Event::Batch(lines)) => {
                self.accept_batch(category, lines).await
            }
            (
                Stage::ChoosingFormat { category, batch },
                Event::Select(Select::Format(format)),
            ) => {
                match self
                    .engine
                    .add_batch(&category, batch.clone(), &format, Utc::now())
                    .await
                {
                    Ok(added) => main_menu(format!("Added {added} accounts to '{category}'.")),
                    Err(err) => self.fold_err(
                        Stage::ChoosingFormat { category, batch },
                        err,
                        reply::back_choices(),
                    ),
                }
            }
            (Stage::ChoosingFormat { category, batch }, Event::Select(Select::NewFormat)) => (
                Stage::NamingFormat {
                    origin: FormatOrigin::BatchFlow { category, batch },
                },
                Reply::with_choices(FORMAT_PROMPT, reply::back_choices()),
            ),

            // ── format registration ──────────────────────────────────
            (Stage::NamingFormat { origin }, Event::Text(name)) => {
                self.register_format(origin, name).await
            }

            // ── withdraw flow ────────────────────────────────────────
            (Stage::ChoosingCount { category }, Event::Select(Select::Count(count))) => {
                self.issue(category, count).await
            }
            (Stage::ChoosingCount { category }, Event::Select(Select::CustomCount)) => (
                Stage::TypingCount { category },
                Reply::with_choices("Type how many accounts you need:", reply::back_choices()),
            ),
            (Stage::TypingCount { category }, Event::Text(text)) => {
                match text.trim().parse::<u32>() {
                    Ok(count) if count > 0 => self.issue(category, count).await,
                    _ => (
                        Stage::TypingCount { category },
                        Reply::with_choices(
                            "That is not a valid amount. Type a positive number:",
                            reply::back_choices(),
                        ),
                    ),
                }
            }

            // ── history browsing ─────────────────────────────────────
            (Stage::BrowsingHistory { category, .. }, Event::Select(Select::Page(page))) => {
                self.history_view(category, page.max(1)).await
            }

            // ── admin panel ──────────────────────────────────────────
            (Stage::AdminMenu, Event::Select(Select::Admin(action))) => {
                self.from_admin_menu(action).await
            }
            (Stage::ConfirmingWipe, Event::Select(Select::Confirm(true))) => {
                match self.engine.wipe_accounts().await {
                    Ok(deleted) => admin_menu(format!("Deleted {deleted} accounts.")),
                    Err(err) => {
                        self.fold_err(Stage::ConfirmingWipe, err, reply::confirm_choices())
                    }
                }
            }
            (Stage::ConfirmingWipe, Event::Select(Select::Confirm(false))) => {
                admin_menu("Cancelled.")
            }

            // ── format management ────────────────────────────────────
            (Stage::ManagingFormats, Event::Select(Select::NewFormat)) => (
                Stage::NamingFormat {
                    origin: FormatOrigin::AdminPanel,
                },
                Reply::with_choices(FORMAT_PROMPT, reply::back_choices()),
            ),
            (Stage::ManagingFormats, Event::Select(Select::DeleteFormat)) => {
                match self.engine.list_formats().await {
                    Ok(formats) => (
                        Stage::ChoosingFormatToDelete,
                        Reply::with_choices(
                            "Choose a format to delete:",
                            reply::format_choices(&formats, false),
                        ),
                    ),
                    Err(err) => {
                        self.fold_err(Stage::ManagingFormats, err, reply::back_choices())
                    }
                }
            }
            (Stage::ChoosingFormatToDelete, Event::Select(Select::Format(name))) => {
                match self.engine.remove_format(&name).await {
                    Ok(()) => self.formats_view(format!("Format '{name}' deleted.")).await,
                    Err(err) => self.fold_err(
                        Stage::ChoosingFormatToDelete,
                        err,
                        reply::back_choices(),
                    ),
                }
            }

            // ── code lookup ──────────────────────────────────────────
            (Stage::AwaitingCodeAccount, Event::Text(payload)) => {
                self.lookup_code(payload).await
            }

            // ── anything else re-prompts without advancing ───────────
            (stage, event) => {
                debug!(?stage, ?event, "event does not fit the current stage");
                (
                    stage,
                    Reply::with_choices(
                        "That input doesn't fit this step. Use the buttons, or go back to the main menu.",
                        reply::back_choices(),
                    ),
                )
            }
        }
    }

    // ── main menu actions ────────────────────────────────────────────

    async fn from_main_menu(&self, action: MenuAction) -> (Stage, Reply) {
        match action {
            MenuAction::AddAccounts => {
                self.category_view(Intent::Add, "Choose a category or create a new one:")
                    .await
            }
            MenuAction::GetAccounts => self.category_view(Intent::Withdraw, "Choose a category:").await,
            MenuAction::DeleteCategory => {
                self.category_view(Intent::Delete, "Choose a category to delete:")
                    .await
            }
            MenuAction::History => self.category_view(Intent::History, "Choose a category:").await,
            MenuAction::ViewInventory => match self.engine.inventory_summary().await {
                Ok(summary) if summary.is_empty() => (
                    Stage::MainMenu,
                    Reply::with_choices("No accounts in stock.", reply::back_choices()),
                ),
                Ok(summary) => {
                    let lines: Vec<String> = summary
                        .iter()
                        .map(|(category, count)| format!("{category}: {count} accounts"))
                        .collect();
                    (
                        Stage::MainMenu,
                        Reply::with_choices(lines.join("\n"), reply::back_choices()),
                    )
                }
                Err(err) => self.fold_err(Stage::MainMenu, err, reply::main_menu_choices()),
            },
            MenuAction::AdminPanel => admin_menu(ADMIN_PROMPT),
            MenuAction::GetCode => (
                Stage::AwaitingCodeAccount,
                Reply::with_choices(CODE_PROMPT, reply::back_choices()),
            ),
        }
    }

    /// Render the category keyboard for an intent.
    async fn category_view(&self, intent: Intent, prompt: &str) -> (Stage, Reply) {
        match self.engine.list_categories().await {
            Ok(categories) => (
                Stage::ChoosingCategory { intent },
                Reply::with_choices(
                    prompt,
                    reply::category_choices(&categories, intent == Intent::Add),
                ),
            ),
            Err(err) => self.fold_err(Stage::MainMenu, err, reply::main_menu_choices()),
        }
    }

    async fn with_category(&self, intent: Intent, category: String) -> (Stage, Reply) {
        match intent {
            Intent::Add => (
                Stage::AwaitingBatch { category },
                Reply::with_choices(BATCH_PROMPT, reply::back_choices()),
            ),
            Intent::Withdraw => (
                Stage::ChoosingCount { category },
                Reply::with_choices("How many accounts do you need?", reply::count_choices()),
            ),
            Intent::Delete => match self.engine.remove_category(&category).await {
                Ok(()) => main_menu(format!("Category '{category}' deleted.")),
                Err(err) => self.fold_err(
                    Stage::ChoosingCategory { intent },
                    err,
                    reply::back_choices(),
                ),
            },
            Intent::History => self.history_view(category, 1).await,
        }
    }

    // ── add flow ─────────────────────────────────────────────────────

    async fn accept_batch(&self, category: String, lines: Vec<String>) -> (Stage, Reply) {
        let non_blank = lines.iter().filter(|line| !line.trim().is_empty()).count();
        if non_blank == 0 {
            return (
                Stage::AwaitingBatch { category },
                Reply::with_choices(
                    "No accounts found in that input. Paste one account per line:",
                    reply::back_choices(),
                ),
            );
        }

        match self.engine.list_formats().await {
            Ok(formats) => (
                Stage::ChoosingFormat {
                    category,
                    batch: lines,
                },
                Reply::with_choices(
                    format!("{non_blank} accounts received. Choose a format:"),
                    reply::format_choices(&formats, false),
                ),
            ),
            Err(err) => self.fold_err(
                Stage::AwaitingBatch { category },
                err,
                reply::back_choices(),
            ),
        }
    }

    /// Register a new format and return to wherever the prompt came
    /// from. A rejected name re-prompts here — it must NOT advance the
    /// stage.
    async fn register_format(&self, origin: FormatOrigin, name: String) -> (Stage, Reply) {
        match self.engine.register_format(&name).await {
            Ok(()) => match origin {
                FormatOrigin::BatchFlow { category, batch } => {
                    match self.engine.list_formats().await {
                        Ok(formats) => (
                            Stage::ChoosingFormat { category, batch },
                            Reply::with_choices(
                                "Format registered. Choose a format:",
                                reply::format_choices(&formats, false),
                            ),
                        ),
                        Err(err) => self.fold_err(
                            Stage::NamingFormat {
                                origin: FormatOrigin::BatchFlow { category, batch },
                            },
                            err,
                            reply::back_choices(),
                        ),
                    }
                }
                FormatOrigin::AdminPanel => self.formats_view("Format registered.").await,
            },
            Err(err) => self.fold_err(Stage::NamingFormat { origin }, err, reply::back_choices()),
        }
    }

    /// The admin format-management screen.
    async fn formats_view(&self, text: impl Into<String>) -> (Stage, Reply) {
        match self.engine.list_formats().await {
            Ok(formats) => (
                Stage::ManagingFormats,
                Reply::with_choices(text, reply::format_choices(&formats, true)),
            ),
            Err(err) => self.fold_err(Stage::ManagingFormats, err, reply::back_choices()),
        }
    }

    // ── withdraw flow ────────────────────────────────────────────────

    async fn issue(&self, category: String, count: u32) -> (Stage, Reply) {
        match self.engine.withdraw(&category, count, Utc::now()).await {
            Ok(payloads) if payloads.is_empty() => {
                main_menu(format!("No accounts available in '{category}'."))
            }
            Ok(payloads) => main_menu(payloads.join("\n")),
            Err(err) => self.fold_err(
                Stage::ChoosingCount { category },
                err,
                reply::count_choices(),
            ),
        }
    }

    // ── history ──────────────────────────────────────────────────────

    async fn history_view(&self, category: String, page: u32) -> (Stage, Reply) {
        match self.engine.history_page(&category, page).await {
            Ok(items) => {
                let has_more = items.len() as u32 == HISTORY_PAGE_SIZE;
                let text = if items.is_empty() {
                    format!("No withdrawal history for '{category}'.")
                } else {
                    format!(
                        "Withdrawn from '{category}' (page {page}):\n{}",
                        items.join("\n")
                    )
                };
                (
                    Stage::BrowsingHistory { category, page },
                    Reply::with_choices(text, reply::history_choices(page, has_more)),
                )
            }
            Err(err) => self.fold_err(
                Stage::BrowsingHistory { category, page },
                err,
                reply::back_choices(),
            ),
        }
    }

    // ── admin panel ──────────────────────────────────────────────────

    async fn from_admin_menu(&self, action: AdminAction) -> (Stage, Reply) {
        match action {
            AdminAction::TotalAccounts => match self.engine.total_active().await {
                Ok(total) => admin_menu(format!("Accounts in stock: {total}")),
                Err(err) => self.fold_err(Stage::AdminMenu, err, reply::admin_menu_choices()),
            },
            AdminAction::WipeAccounts => (
                Stage::ConfirmingWipe,
                Reply::with_choices(
                    "Delete ALL active accounts? This cannot be undone.",
                    reply::confirm_choices(),
                ),
            ),
            AdminAction::Stats => match self.engine.statistics(Utc::now()).await {
                Ok(stats) => admin_menu(render_statistics(&stats)),
                Err(err) => self.fold_err(Stage::AdminMenu, err, reply::admin_menu_choices()),
            },
            AdminAction::Activity => match self.activity_report().await {
                Ok(text) => admin_menu(text),
                Err(err) => self.fold_err(Stage::AdminMenu, err, reply::admin_menu_choices()),
            },
            AdminAction::ManageFormats => self.formats_view("Registered formats:").await,
        }
    }

    /// Stock-age report across all categories.
    async fn activity_report(&self) -> Result<String, EngineError> {
        let now = Utc::now();
        let mut sections = Vec::new();
        for category in self.engine.list_categories().await? {
            if let Some(activity) = self.engine.category_activity(&category, now).await? {
                sections.push(format!(
                    "{category}\n  first stocked: {} ({}d {}h ago)\n  last stocked: {} ({}d {}h ago)",
                    activity.first_added.format("%Y-%m-%d %H:%M UTC"),
                    activity.days_since_first,
                    activity.hours_since_first,
                    activity.last_added.format("%Y-%m-%d %H:%M UTC"),
                    activity.days_since_last,
                    activity.hours_since_last,
                ));
            }
        }
        if sections.is_empty() {
            Ok("No stock activity to report.".to_string())
        } else {
            Ok(sections.join("\n"))
        }
    }

    // ── code lookup ──────────────────────────────────────────────────

    async fn lookup_code(&self, payload: String) -> (Stage, Reply) {
        let fields: Vec<&str> = payload.trim().split('|').collect();
        if fields.len() != 6 || fields.iter().any(|field| field.is_empty()) {
            return (
                Stage::AwaitingCodeAccount,
                Reply::with_choices(
                    format!("Invalid account format. {CODE_PROMPT}"),
                    reply::back_choices(),
                ),
            );
        }
        let (mailbox, refresh_token, client_id) = (fields[0], fields[4], fields[5]);

        match self
            .resolver
            .resolve_code(refresh_token, client_id, mailbox)
            .await
        {
            Ok(Some(code)) => main_menu(format!("Verification code: {code}")),
            Ok(None) => (
                Stage::AwaitingCodeAccount,
                Reply::with_choices(
                    "No code found yet. Send the account again to retry:",
                    reply::back_choices(),
                ),
            ),
            Err(err) => {
                warn!(error = %err, "code lookup failed");
                (
                    Stage::AwaitingCodeAccount,
                    Reply::with_choices(
                        "Code lookup failed. Check the account and try again:",
                        reply::back_choices(),
                    ),
                )
            }
        }
    }

    // ── error folding ────────────────────────────────────────────────

    /// Fold an engine error into a reply per the recovery policy:
    /// validation re-prompts in place, a stale reference returns to the
    /// main menu, and an unavailable store re-prompts in place so the
    /// operator can retry the same step.
    fn fold_err(&self, stage: Stage, err: EngineError, retry: Vec<Choice>) -> (Stage, Reply) {
        match err {
            EngineError::Validation(message) => (stage, Reply::with_choices(message, retry)),
            EngineError::NotFound { entity, name } => {
                main_menu(format!("The {entity} '{name}' no longer exists."))
            }
            EngineError::Unavailable(err) => {
                error!(error = %err, "store unavailable");
                (
                    stage,
                    Reply::with_choices(
                        "Storage is unavailable right now. Please try again.",
                        retry,
                    ),
                )
            }
        }
    }
}

// ── free helpers ─────────────────────────────────────────────────────

fn main_menu(text: impl Into<String>) -> (Stage, Reply) {
    (
        Stage::MainMenu,
        Reply::with_choices(text, reply::main_menu_choices()),
    )
}

fn admin_menu(text: impl Into<String>) -> (Stage, Reply) {
    (
        Stage::AdminMenu,
        Reply::with_choices(text, reply::admin_menu_choices()),
    )
}

fn render_statistics(stats: &Statistics) -> String {
    format!(
        "Added: day {}, week {}, month {}\nWithdrawn: day {}, week {}, month {}",
        stats.added.day,
        stats.added.week,
        stats.added.month,
        stats.retrieved.day,
        stats.retrieved.week,
        stats.retrieved.month,
    )
}
