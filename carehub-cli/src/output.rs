//! Table and JSON rendering for command results.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use carehub_sync::{
    Medication, MedicationOrder, Observation, OrderStatus, Resident, SyncQueueItem,
};

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn list<T: Serialize>(&self, items: &[T], row: fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(items)?);
            return Ok(());
        }
        if items.is_empty() {
            println!("{}", "(none)".dimmed());
        }
        for item in items {
            println!("{}", row(item));
        }
        Ok(())
    }

    pub fn one<T: Serialize>(&self, item: &T, row: fn(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(item)?);
        } else {
            println!("{}", row(item));
        }
        Ok(())
    }

    pub fn message(&self, message: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "message": message }));
        } else {
            println!("{}", message.bright_green());
        }
    }
}

pub fn resident_row(r: &Resident) -> String {
    format!(
        "{}  {:<28} room {}",
        r.id.to_string().dimmed(),
        r.full_name(),
        r.room_number.as_deref().unwrap_or("-")
    )
}

pub fn medication_row(m: &Medication) -> String {
    let stock = format!("{:>5}", m.stock_quantity);
    let stock = if m.is_low_stock() {
        stock.bright_red().to_string()
    } else {
        stock
    };
    let owner = m.resident_name.as_deref().unwrap_or("inventory");
    format!(
        "{}  {:<24} stock {} / reorder {:<4} {}",
        m.id.to_string().dimmed(),
        m.med_name,
        stock,
        m.reorder_level,
        owner
    )
}

pub fn observation_row(o: &Observation) -> String {
    format!(
        "{}  {}  {:<20} {:<8} {}",
        o.id.to_string().dimmed(),
        o.recorded_at.format("%Y-%m-%d %H:%M"),
        o.resident_name,
        o.kind.bright_white(),
        o.value
    )
}

pub fn order_row(o: &MedicationOrder) -> String {
    let status = match o.status {
        OrderStatus::Requested => o.status.as_str().yellow(),
        OrderStatus::Ordered => o.status.as_str().bright_blue(),
        OrderStatus::Received => o.status.as_str().bright_green(),
        OrderStatus::Cancelled => o.status.as_str().dimmed(),
    };
    format!(
        "{}  medication {}  qty {:<5} {:<10} by {}",
        o.id.to_string().dimmed(),
        o.medication_id,
        o.requested_quantity,
        status,
        o.requested_by
    )
}

pub fn queue_row(item: &SyncQueueItem) -> String {
    let attempts = if item.attempt_count > 0 {
        format!("attempts {} ({})", item.attempt_count, item.last_error)
            .bright_red()
            .to_string()
    } else {
        "pending".to_string()
    };
    format!(
        "#{:<4} {} {:<12} {:<7} {}  {}",
        item.sequence,
        item.created_at.format("%Y-%m-%d %H:%M:%S"),
        item.entity_type,
        item.operation.as_str(),
        item.entity_id,
        attempts
    )
}
