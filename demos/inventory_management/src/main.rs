//! Inventory Management Example
//!
//! Orders arrive at random, are picked from a warehouse collection point and
//! shipped. When the warehouse runs low, a delivery is ordered (gated by a
//! small-stock guard) and restocks it about a day later.
//!
//! Usage: `inventory_management [model.ron] [ron|json|csv|text]`
//!
//! Set `RUST_LOG=debug` to follow every firing.

use qnet_core::qalculator::{determine_remaining_demand, quantity_update_removing_available_items};
use qnet_core::{BindingFunction, CollectionCounter, ItemCounter, ObjectStore, ObjectType, Value, ValueMap};
use qnet_journal::{Auditor, ExportFormat, Exporter};
use qnet_script::{Loader, ModelDef};
use qnet_sim::{Action, ActivityBehavior, EventContext, Instruction, Simulation};
use std::env;
use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const MODEL: &str = include_str!("../inventory.ron");
const WAREHOUSE: &str = "c1";

fn orders(binding: &BindingFunction) -> Vec<qnet_core::ObjectId> {
    binding
        .get(&ObjectType::new("order"))
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default()
}

/// Total demand of the bound orders
fn demand(binding: &BindingFunction, objects: &ObjectStore) -> ItemCounter {
    let mut total = ItemCounter::new();
    for order in orders(binding) {
        if let Some(object) = objects.get(order) {
            total.update(&object.quantities);
        }
    }
    total
}

/// Take what the orders need, or as much of it as the warehouse holds
fn pick_from_warehouse(state: &CollectionCounter, binding: &BindingFunction, objects: &ObjectStore) -> CollectionCounter {
    let wanted = -&demand(binding, objects);
    let available = state.get(WAREHOUSE).cloned().unwrap_or_default();
    [(WAREHOUSE, quantity_update_removing_available_items(&wanted, &available))]
        .into_iter()
        .collect()
}

fn deliver_to_warehouse(_state: &CollectionCounter, _binding: &BindingFunction, _objects: &ObjectStore) -> CollectionCounter {
    [(WAREHOUSE, ItemCounter::from([("A", 40), ("B", 40)]))]
        .into_iter()
        .collect()
}

/// Gives every new order its demand
struct PlaceOrder;

impl ActivityBehavior for PlaceOrder {
    fn on_start(&mut self, ctx: &EventContext) -> Vec<Instruction> {
        orders(ctx.binding)
            .into_iter()
            .map(|order| {
                let raw = order.raw() as i64;
                let quantities = ItemCounter::from([("A", 1 + raw % 3), ("B", raw % 2)]);
                Instruction::now(Action::UpdateQuantities { object: order, quantities })
            })
            .collect()
    }
}

/// Records what could not be picked
struct PickItems;

impl ActivityBehavior for PickItems {
    fn on_end(&mut self, ctx: &EventContext) -> Vec<Instruction> {
        let picked = ctx
            .event
            .quantity_operations
            .get(WAREHOUSE)
            .map(|ops| -ops)
            .unwrap_or_default();
        let missing = determine_remaining_demand(&picked, &demand(ctx.binding, ctx.objects))
            .positive_part()
            .total();
        if missing == 0 {
            return Vec::new();
        }
        info!(event = %ctx.event.id, missing, "order only partly picked");
        orders(ctx.binding)
            .into_iter()
            .map(|order| {
                let attributes: ValueMap = [("backorder".to_string(), Value::Int(missing))].into_iter().collect();
                Instruction::now(Action::UpdateAttributes { object: order, attributes })
            })
            .collect()
    }
}

fn build(def: &ModelDef) -> Result<Simulation, Box<dyn Error>> {
    let mut sim = def.build()?;
    sim.net_mut().set_qalculator("t2", Box::new(pick_from_warehouse))?;
    sim.net_mut().set_qalculator("t5", Box::new(deliver_to_warehouse))?;
    sim.set_activity_behavior("place order", Box::new(PlaceOrder))?;
    sim.set_activity_behavior("pick items", Box::new(PickItems))?;
    Ok(sim)
}

fn parse_format(arg: &str) -> Option<ExportFormat> {
    match arg {
        "ron" => Some(ExportFormat::Ron),
        "json" => Some(ExportFormat::Json),
        "csv" => Some(ExportFormat::Csv),
        "text" => Some(ExportFormat::Text),
        _ => None,
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (path, format) = match args.as_slice() {
        [] => (None, None),
        [one] => match parse_format(one) {
            Some(format) => (None, Some(format)),
            None => (Some(one.as_str()), None),
        },
        [path, format, ..] => (
            Some(path.as_str()),
            Some(parse_format(format).ok_or_else(|| format!("unknown export format {format}"))?),
        ),
    };

    println!("=== Qnet Inventory Management Example ===\n");

    let def = match path {
        Some(path) => {
            let mut loader = Loader::new();
            loader.load_file(path)?;
            loader.finish()
        }
        None => Loader::parse(MODEL)?,
    };
    let mut sim = build(&def)?;

    println!("Start: {}", sim.current_time());
    println!("Initial stock: {}", sim.net().quantity_state().get(WAREHOUSE).cloned().unwrap_or_default());
    println!("Running...\n");

    let reason = sim.run()?;
    info!(?reason, steps = sim.steps(), "run finished");

    println!("Stopped: {:?} after {} steps at {}", reason, sim.steps(), sim.current_time());
    println!("Final stock: {}\n", sim.net().quantity_state().get(WAREHOUSE).cloned().unwrap_or_default());

    let auditor = Auditor::new(sim.log());
    println!("{}", auditor.generate_report());

    let backorders = sim
        .log()
        .objects()
        .filter(|o| o.get("backorder").and_then(Value::as_int).is_some_and(|n| n > 0))
        .count();
    println!("Orders with backorders: {}", backorders);

    if let Some(format) = format {
        let mut stdout = std::io::stdout().lock();
        Exporter::new(sim.log()).export_to(&mut stdout, format)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
