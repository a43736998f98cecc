//! Subcommands and their dispatch onto the `CareHub` services.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use carehub_sync::{
    CareHub, Medication, NewOrder, Observation, OrderStatus, RecordService, RejectReason, Resident,
    SyncQueue, TransitionOutcome,
};

use crate::output::{self, Printer};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resident records
    Residents {
        #[command(subcommand)]
        action: ResidentAction,
    },
    /// Medication inventory and prescriptions
    Medications {
        #[command(subcommand)]
        action: MedicationAction,
    },
    /// Resident observations (vitals, notes)
    Observations {
        #[command(subcommand)]
        action: ObservationAction,
    },
    /// Medication reorders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Changes waiting to be sent to the remote authority
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Replay queued changes now
    Sync,
}

#[derive(Subcommand, Debug)]
pub enum ResidentAction {
    List,
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        room: Option<String>,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum MedicationAction {
    List,
    /// Facility inventory at or below its reorder level
    LowStock,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0)]
        stock: u32,
        #[arg(long, default_value_t = 10)]
        reorder_level: i32,
        #[arg(long)]
        dosage: Option<String>,
        /// Owning resident; omit for facility inventory
        #[arg(long)]
        resident: Option<Uuid>,
    },
    /// Add or remove stock; the level never drops below zero
    Adjust {
        id: Uuid,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ObservationAction {
    List {
        #[arg(long)]
        resident: Option<Uuid>,
    },
    Add {
        #[arg(long)]
        resident: Uuid,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrderAction {
    List {
        #[arg(long)]
        medication: Option<Uuid>,
    },
    Create {
        medication: Uuid,
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        requested_by: Option<String>,
    },
    /// Move an order to Requested, Ordered, Received or Cancelled
    Status {
        order: Uuid,
        status: OrderStatus,
    },
    Delete {
        order: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueueAction {
    List,
    /// Drop every queued change without sending it
    Clear,
}

pub async fn run(hub: &CareHub, command: Command, out: &Printer) -> Result<()> {
    match command {
        Command::Residents { action } => residents(hub, action, out).await,
        Command::Medications { action } => medications(hub, action, out).await,
        Command::Observations { action } => observations(hub, action, out).await,
        Command::Orders { action } => orders(hub, action, out).await,
        Command::Queue { action } => queue(hub, action, out).await,
        Command::Sync => {
            let replayed = hub.sync_all().await?;
            let remaining = hub.queue().get_all().await?.len();
            out.message(&format!("Replayed {} change(s), {} still queued", replayed, remaining));
            Ok(())
        }
    }
}

async fn residents(hub: &CareHub, action: ResidentAction, out: &Printer) -> Result<()> {
    match action {
        ResidentAction::List => {
            let items = hub.residents().load_all().await?;
            out.list(&items, output::resident_row)
        }
        ResidentAction::Add {
            first_name,
            last_name,
            room,
        } => {
            let mut resident = Resident::new(first_name, last_name);
            resident.room_number = room;
            let saved = hub.residents().create(resident).await?;
            out.one(&saved, output::resident_row)
        }
        ResidentAction::Delete { id } => {
            let resident = hub
                .resident_store()
                .get(id)
                .await?
                .with_context(|| format!("No resident with id {}", id))?;
            hub.residents().delete(&resident).await?;
            out.message(&format!("Deleted resident {}", resident.full_name()));
            Ok(())
        }
    }
}

async fn medications(hub: &CareHub, action: MedicationAction, out: &Printer) -> Result<()> {
    match action {
        MedicationAction::List => {
            let items = hub.medications().load_all().await?;
            out.list(&items, output::medication_row)
        }
        MedicationAction::LowStock => {
            let items = hub.medication_store().low_stock().await?;
            out.list(&items, output::medication_row)
        }
        MedicationAction::Add {
            name,
            stock,
            reorder_level,
            dosage,
            resident,
        } => {
            let mut medication = Medication::new(name, stock, reorder_level);
            medication.dosage = dosage.unwrap_or_default();
            medication.resident_id = resident;
            let saved = hub.medications().create(medication).await?;
            out.one(&saved, output::medication_row)
        }
        MedicationAction::Adjust { id, delta } => match hub.adjust_stock(id, delta).await? {
            Some(stock) => {
                out.message(&format!("Stock for {} is now {}", id, stock));
                Ok(())
            }
            None => bail!("No medication with id {}", id),
        },
    }
}

async fn observations(hub: &CareHub, action: ObservationAction, out: &Printer) -> Result<()> {
    match action {
        ObservationAction::List { resident: Some(id) } => {
            let items = hub.observation_store().by_resident(id).await?;
            out.list(&items, output::observation_row)
        }
        ObservationAction::List { resident: None } => {
            let items = hub.observations().load_all().await?;
            out.list(&items, output::observation_row)
        }
        ObservationAction::Add {
            resident,
            kind,
            value,
        } => {
            let mut observation = Observation::new(resident, kind, value);
            observation.recorded_by = hub.session().operator.clone();
            if let Some(found) = hub.resident_store().get(resident).await? {
                observation.resident_name = found.full_name();
            }
            let saved = hub.observations().create(observation).await?;
            out.one(&saved, output::observation_row)
        }
    }
}

async fn orders(hub: &CareHub, action: OrderAction, out: &Printer) -> Result<()> {
    match action {
        OrderAction::List { medication } => {
            let items = match medication {
                Some(id) => hub.orders().by_medication(id).await?,
                None => hub.orders().load_all().await?,
            };
            out.list(&items, output::order_row)
        }
        OrderAction::Create {
            medication,
            quantity,
            notes,
            requested_by,
        } => {
            let order = hub
                .orders()
                .create_order(NewOrder {
                    medication_id: medication,
                    requested_quantity: quantity,
                    requested_by,
                    notes,
                })
                .await?;
            out.one(&order, output::order_row)
        }
        OrderAction::Status { order, status } => {
            match hub.orders().update_status(order, status).await? {
                TransitionOutcome::Applied { from, to } => {
                    out.message(&format!("Order {} moved from {} to {}", order, from, to));
                }
                TransitionOutcome::Rejected(RejectReason::NotFound) => {
                    bail!("No order with id {}", order)
                }
                TransitionOutcome::Rejected(RejectReason::AlreadyInStatus) => {
                    out.message(&format!("Order {} is already {}", order, status));
                }
                TransitionOutcome::Rejected(RejectReason::NotAllowed { from, to }) => {
                    out.message(&format!("Order {} cannot move from {} to {}", order, from, to));
                }
            }
            Ok(())
        }
        OrderAction::Delete { order } => {
            if !hub.orders().delete(order).await? {
                bail!("No order with id {}", order);
            }
            out.message(&format!("Deleted order {}", order));
            Ok(())
        }
    }
}

async fn queue(hub: &CareHub, action: QueueAction, out: &Printer) -> Result<()> {
    match action {
        QueueAction::List => {
            let items = hub.queue().get_all().await?;
            out.list(&items, output::queue_row)
        }
        QueueAction::Clear => {
            hub.queue().clear().await?;
            out.message("Sync queue cleared");
            Ok(())
        }
    }
}
