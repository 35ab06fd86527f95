use relay_config::UiSettings;
use relay_core::{Message, Role, UsageStats};
use std::io::{self, Write};

/// Format one history entry for the terminal, with its usage caption if any
pub fn format_message(message: &Message, ui: &UiSettings) -> String {
    let avatar = match message.role {
        Role::User => ui.user_avatar.as_str(),
        Role::Assistant => ui.assistant_avatar.as_str(),
        Role::System => "⚙️",
    };

    match message.usage_caption() {
        Some(caption) => format!("{avatar} {}\n    {caption}", message.content),
        None => format!("{avatar} {}", message.content),
    }
}

/// Format running totals as a small status block
pub fn format_totals(totals: &UsageStats) -> String {
    format!(
        "📊 Total Token Usage\n   Prompt: {}\n   Completion: {}\n   Total: {}",
        totals.prompt_tokens, totals.completion_tokens, totals.total_tokens
    )
}

pub fn display_message(message: &Message, ui: &UiSettings) {
    println!("{}", format_message(message, ui));
    io::stdout().flush().ok();
}

pub fn display_totals(totals: &UsageStats) {
    println!("{}", format_totals(totals));
}
