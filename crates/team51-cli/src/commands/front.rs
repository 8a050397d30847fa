//! Front commands.

use anyhow::{Result, anyhow};
use chrono::DateTime;
use team51_clients::front::{Conversation, Inbox};
use team51_core::export::ExportFormat;
use team51_core::{CommandOutcome, OutputFormat, Table};

use super::{Context, export_to_cwd, yes_no};

pub async fn list_inboxes(ctx: &Context) -> Result<CommandOutcome> {
    let inboxes = ctx.front()?.list_inboxes().await?;
    if inboxes.is_empty() {
        return Ok(CommandOutcome::empty("No Front inboxes"));
    }

    let mut table = Table::new(["ID", "Name", "Private"]);
    for inbox in inboxes {
        table.push_row([inbox.id, inbox.name, yes_no(inbox.is_private).to_string()]);
    }
    Ok(CommandOutcome::success(table.render(OutputFormat::Table)))
}

/// Match an inbox by ID or case-insensitive name.
fn find_inbox<'a>(inboxes: &'a [Inbox], query: &str) -> Option<&'a Inbox> {
    inboxes
        .iter()
        .find(|i| i.id == query)
        .or_else(|| inboxes.iter().find(|i| i.name.eq_ignore_ascii_case(query)))
}

fn conversation_table(conversations: &[Conversation]) -> Table {
    let mut table = Table::new(["ID", "Subject", "Status", "Created", "Assignee", "Recipient"]);
    for conversation in conversations {
        let created = DateTime::from_timestamp(conversation.created_at as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.push_row([
            conversation.id.clone(),
            conversation.subject.clone(),
            conversation.status.clone(),
            created,
            conversation.assignee_email().to_string(),
            conversation.recipient_handle().to_string(),
        ]);
    }
    table
}

pub async fn export_conversations(ctx: &Context, inbox: &str, export: ExportFormat) -> Result<CommandOutcome> {
    let front = ctx.front()?;
    let inboxes = front.list_inboxes().await?;
    let inbox = find_inbox(&inboxes, inbox).ok_or_else(|| anyhow!("Front inbox {} not found", inbox))?;

    let conversations = front.list_conversations(&inbox.id).await?;
    if conversations.is_empty() {
        return Ok(CommandOutcome::empty(format!("{} has no conversations", inbox.name)));
    }

    let table = conversation_table(&conversations);
    let stem = format!("front-{}-conversations", inbox.id);
    let path = export_to_cwd(&table, export, &stem)?;
    Ok(CommandOutcome::success(format!(
        "Exported {} conversations from {} to {}",
        table.len(),
        inbox.name,
        path.display()
    )))
}
