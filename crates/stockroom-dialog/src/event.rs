//! Typed operator events.
//!
//! The transport delivers two raw shapes: a selection (a button press
//! carrying an opaque token) and free input (a text message or an
//! uploaded file). [`Select::parse`] turns the token back into a typed
//! variant; what a [`Event::Text`] means is decided by the current
//! stage, which is the state machine's job, not the transport's.

/// One incoming operator event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// First contact or an explicit request for the main menu.
    Start,
    /// A button press, already parsed into a typed selection.
    Select(Select),
    /// A free-text message.
    Text(String),
    /// An uploaded text file, pre-split into lines by the transport.
    Batch(Vec<String>),
}

/// Top-level menu actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    AddAccounts,
    GetAccounts,
    ViewInventory,
    DeleteCategory,
    History,
    AdminPanel,
    GetCode,
}

/// Admin panel actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    TotalAccounts,
    WipeAccounts,
    Stats,
    Activity,
    ManageFormats,
}

/// A typed selection token.
///
/// `token()` and `parse()` round-trip, so the transport can serialize
/// a choice into callback data and hand the echo straight back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    Menu(MenuAction),
    Category(String),
    NewCategory,
    Format(String),
    NewFormat,
    DeleteFormat,
    Count(u32),
    CustomCount,
    Admin(AdminAction),
    Confirm(bool),
    Page(u32),
    Back,
    BackToAdmin,
}

impl Select {
    /// Serialize into the opaque token carried by a button.
    pub fn token(&self) -> String {
        match self {
            Select::Menu(action) => {
                let name = match action {
                    MenuAction::AddAccounts => "add",
                    MenuAction::GetAccounts => "get",
                    MenuAction::ViewInventory => "view",
                    MenuAction::DeleteCategory => "delete",
                    MenuAction::History => "history",
                    MenuAction::AdminPanel => "admin",
                    MenuAction::GetCode => "code",
                };
                format!("menu:{name}")
            }
            Select::Category(name) => format!("category:{name}"),
            Select::NewCategory => "new_category".to_string(),
            Select::Format(name) => format!("format:{name}"),
            Select::NewFormat => "new_format".to_string(),
            Select::DeleteFormat => "delete_format".to_string(),
            Select::Count(n) => format!("count:{n}"),
            Select::CustomCount => "custom_count".to_string(),
            Select::Admin(action) => {
                let name = match action {
                    AdminAction::TotalAccounts => "total",
                    AdminAction::WipeAccounts => "wipe",
                    AdminAction::Stats => "stats",
                    AdminAction::Activity => "activity",
                    AdminAction::ManageFormats => "formats",
                };
                format!("admin:{name}")
            }
            Select::Confirm(yes) => format!("confirm:{}", if *yes { "yes" } else { "no" }),
            Select::Page(n) => format!("page:{n}"),
            Select::Back => "back".to_string(),
            Select::BackToAdmin => "back_admin".to_string(),
        }
    }

    /// Parse a token back into a selection. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Select> {
        match token {
            "new_category" => return Some(Select::NewCategory),
            "new_format" => return Some(Select::NewFormat),
            "delete_format" => return Some(Select::DeleteFormat),
            "custom_count" => return Some(Select::CustomCount),
            "back" => return Some(Select::Back),
            "back_admin" => return Some(Select::BackToAdmin),
            _ => {}
        }

        if let Some(name) = token.strip_prefix("menu:") {
            let action = match name {
                "add" => MenuAction::AddAccounts,
                "get" => MenuAction::GetAccounts,
                "view" => MenuAction::ViewInventory,
                "delete" => MenuAction::DeleteCategory,
                "history" => MenuAction::History,
                "admin" => MenuAction::AdminPanel,
                "code" => MenuAction::GetCode,
                _ => return None,
            };
            return Some(Select::Menu(action));
        }
        if let Some(name) = token.strip_prefix("admin:") {
            let action = match name {
                "total" => AdminAction::TotalAccounts,
                "wipe" => AdminAction::WipeAccounts,
                "stats" => AdminAction::Stats,
                "activity" => AdminAction::Activity,
                "formats" => AdminAction::ManageFormats,
                _ => return None,
            };
            return Some(Select::Admin(action));
        }
        if let Some(name) = token.strip_prefix("category:") {
            return Some(Select::Category(name.to_string()));
        }
        if let Some(name) = token.strip_prefix("format:") {
            return Some(Select::Format(name.to_string()));
        }
        if let Some(n) = token.strip_prefix("count:") {
            return n.parse().ok().map(Select::Count);
        }
        if let Some(n) = token.strip_prefix("page:") {
            return n.parse().ok().map(Select::Page);
        }
        if let Some(answer) = token.strip_prefix("confirm:") {
            return match answer {
                "yes" => Some(Select::Confirm(true)),
                "no" => Some(Select::Confirm(false)),
                _ => None,
            };
        }

        None
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_roundtrip() {
        let selections = [
            Select::Menu(MenuAction::AddAccounts),
            Select::Menu(MenuAction::GetCode),
            Select::Category("US".to_string()),
            Select::NewCategory,
            Select::Format("email|emailpass|login|pass|reftoken|clientid".to_string()),
            Select::NewFormat,
            Select::DeleteFormat,
            Select::Count(7),
            Select::CustomCount,
            Select::Admin(AdminAction::WipeAccounts),
            Select::Admin(AdminAction::Activity),
            Select::Confirm(true),
            Select::Confirm(false),
            Select::Page(3),
            Select::Back,
            Select::BackToAdmin,
        ];

        for select in selections {
            let token = select.token();
            assert_eq!(Select::parse(&token), Some(select), "token: {token}");
        }
    }

    #[test]
    fn category_names_may_contain_separators() {
        let select = Select::Category("US:west".to_string());
        assert_eq!(Select::parse(&select.token()), Some(select));
    }

    #[test]
    fn unknown_tokens_parse_to_none() {
        assert_eq!(Select::parse(""), None);
        assert_eq!(Select::parse("menu:unknown"), None);
        assert_eq!(Select::parse("count:notanumber"), None);
        assert_eq!(Select::parse("confirm:maybe"), None);
        assert_eq!(Select::parse("garbage"), None);
    }
}
