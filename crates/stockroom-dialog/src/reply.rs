//! Transport-agnostic render instructions.
//!
//! A [`Reply`] is what the state machine hands back for every event:
//! the text to show and the selections currently on offer. The
//! transport decides how to draw them (inline keyboard, numbered list,
//! whatever).

use crate::event::{AdminAction, MenuAction, Select};

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Label shown to the operator.
    pub label: String,
    /// The typed selection the transport echoes back on press.
    pub select: Select,
}

impl Choice {
    pub fn new(label: impl Into<String>, select: Select) -> Self {
        Self {
            label: label.into(),
            select,
        }
    }
}

/// A render instruction: text plus the available selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Reply {
    /// A reply with no selections.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    /// A reply with selections.
    pub fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }
}

// ── keyboard builders ────────────────────────────────────────────────

/// The main menu.
pub fn main_menu_choices() -> Vec<Choice> {
    vec![
        Choice::new("Add accounts", Select::Menu(MenuAction::AddAccounts)),
        Choice::new("Get accounts", Select::Menu(MenuAction::GetAccounts)),
        Choice::new("View inventory", Select::Menu(MenuAction::ViewInventory)),
        Choice::new("Delete category", Select::Menu(MenuAction::DeleteCategory)),
        Choice::new("History", Select::Menu(MenuAction::History)),
        Choice::new("Admin panel", Select::Menu(MenuAction::AdminPanel)),
        Choice::new("Get code", Select::Menu(MenuAction::GetCode)),
    ]
}

/// The admin panel.
pub fn admin_menu_choices() -> Vec<Choice> {
    vec![
        Choice::new("Total accounts", Select::Admin(AdminAction::TotalAccounts)),
        Choice::new("Delete all accounts", Select::Admin(AdminAction::WipeAccounts)),
        Choice::new("Statistics", Select::Admin(AdminAction::Stats)),
        Choice::new("Stock age", Select::Admin(AdminAction::Activity)),
        Choice::new("Formats", Select::Admin(AdminAction::ManageFormats)),
        Choice::new("Main menu", Select::Back),
    ]
}

/// One button per category, optionally with a "new category" entry,
/// always with a way back.
pub fn category_choices(categories: &[String], include_new: bool) -> Vec<Choice> {
    let mut choices: Vec<Choice> = categories
        .iter()
        .map(|name| Choice::new(name.clone(), Select::Category(name.clone())))
        .collect();
    if include_new {
        choices.push(Choice::new("New category", Select::NewCategory));
    }
    choices.push(Choice::new("Back", Select::Back));
    choices
}

/// One button per registered format.
pub fn format_choices(formats: &[String], include_delete: bool) -> Vec<Choice> {
    let mut choices: Vec<Choice> = formats
        .iter()
        .map(|name| Choice::new(name.clone(), Select::Format(name.clone())))
        .collect();
    choices.push(Choice::new("Add format", Select::NewFormat));
    if include_delete {
        choices.push(Choice::new("Delete format", Select::DeleteFormat));
    }
    choices.push(Choice::new("Back", Select::BackToAdmin));
    choices
}

/// Quick counts 1–10, a custom-count entry, and a way back.
pub fn count_choices() -> Vec<Choice> {
    let mut choices: Vec<Choice> = (1..=10)
        .map(|n| Choice::new(n.to_string(), Select::Count(n)))
        .collect();
    choices.push(Choice::new("Other amount", Select::CustomCount));
    choices.push(Choice::new("Back", Select::Back));
    choices
}

/// Just a way back to the main menu.
pub fn back_choices() -> Vec<Choice> {
    vec![Choice::new("Back", Select::Back)]
}

/// Yes/no confirmation.
pub fn confirm_choices() -> Vec<Choice> {
    vec![
        Choice::new("Yes", Select::Confirm(true)),
        Choice::new("No", Select::Confirm(false)),
    ]
}

/// History pager: previous/next page plus a way back.
pub fn history_choices(page: u32, has_more: bool) -> Vec<Choice> {
    let mut choices = Vec::new();
    if page > 1 {
        choices.push(Choice::new("Previous", Select::Page(page - 1)));
    }
    if has_more {
        choices.push(Choice::new("Next", Select::Page(page + 1)));
    }
    choices.push(Choice::new("Back", Select::Back));
    choices
}

// ── tests ────────────────────────────────────────────────────────────
