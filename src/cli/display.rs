//! Table rendering for CLI output.

use comfy_table::{presets::UTF8_FULL, Cell, Table};

use crate::domain::models::{Bot, PoolSlot};

pub fn bot_table(bots: &[Bot]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Tenant", "Platform", "Status", "Display name", "Last heartbeat", "Error",
    ]);

    for bot in bots {
        table.add_row(vec![
            Cell::new(bot.id),
            Cell::new(bot.tenant_id),
            Cell::new(bot.meeting_info.platform),
            Cell::new(bot.status),
            Cell::new(&bot.display_name),
            Cell::new(
                bot.last_heartbeat
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(bot.deployment_error.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn slot_table(slots: &[PoolSlot]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Slot", "Platform", "Status", "Bot", "Last used", "Attempts", "Error",
    ]);

    for slot in slots {
        table.add_row(vec![
            Cell::new(&slot.slot_name),
            Cell::new(slot.platform),
            Cell::new(slot.status),
            Cell::new(
                slot.assigned_bot_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(slot.last_used_at.to_rfc3339()),
            Cell::new(slot.recovery_attempts),
            Cell::new(slot.error_message.as_deref().unwrap_or("-")),
        ]);
    }
    table
}
