//! Resistor chain example: a source, two resistors and a ground in a row.
//!
//! Places the cells one by one, prints the assembled netlist, then breaks
//! the chain in the middle and shows the resulting split.
//!
//! Run with: `cargo run -p cellgrid-core --example resistor_chain`
//! (set `RUST_LOG=info` to hide the per-edge debug events)

use std::sync::Arc;

use cellgrid_core::cell::{BasicCellProvider, CellProvider};
use cellgrid_core::container::ContainerMap;
use cellgrid_core::electrical::{GroundObject, ResistorObject, VoltageSourceObject};
use cellgrid_core::id::CellTypeId;
use cellgrid_core::manager::CellGraphManager;
use cellgrid_core::mask::DirectionMask;
use cellgrid_core::object::{SimulationObject, SimulationObjectSet};
use cellgrid_core::space::{BlockPos, Direction};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn two_terminal(
    type_id: u32,
    name: &str,
    object: fn() -> SimulationObject,
) -> Arc<dyn CellProvider> {
    Arc::new(BasicCellProvider::new(
        CellTypeId(type_id),
        name,
        DirectionMask::LEFT + DirectionMask::RIGHT,
        move || Ok(SimulationObjectSet::single(object())),
    ))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let source = two_terminal(0, "source", || {
        SimulationObject::electrical(VoltageSourceObject::new(12.0))
    });
    let resistor = two_terminal(1, "resistor", || {
        SimulationObject::electrical(ResistorObject::new(100.0))
    });
    let ground: Arc<dyn CellProvider> = Arc::new(BasicCellProvider::new(
        CellTypeId(2),
        "ground",
        DirectionMask::HORIZONTALS,
        || Ok(SimulationObjectSet::single(SimulationObject::electrical(GroundObject::new()))),
    ));

    let mut manager = CellGraphManager::new();
    let mut host = ContainerMap::new();

    // --- Step 1: Place the chain west to east ---

    let layout = [&ground, &source, &resistor, &resistor, &ground];
    let mut cells = Vec::new();
    for (x, provider) in layout.into_iter().enumerate() {
        let pos = BlockPos::new(x as i32, 64, 0);
        let (cell, change) = host
            .place_block(&mut manager, pos, Direction::North, provider.clone())
            .expect("placement succeeds");
        println!(
            "placed {} at x={x}: graphs {:?}, removed {:?}",
            provider.name(),
            change.graphs,
            change.removed
        );
        cells.push(cell);
    }

    // --- Step 2: Inspect the circuit ---

    let graph_id = manager.cell(cells[0]).unwrap().graph().unwrap();
    let graph = manager.graph(graph_id).unwrap();
    let circuit = graph.circuit().expect("graph was built");
    println!(
        "\ngraph {graph_id}: {} cells, {} components, {} wires, {} nets",
        graph.len(),
        circuit.component_count(),
        circuit.wires().len(),
        circuit.nets().len()
    );
    for (id, component) in circuit.components() {
        println!("  {id:?}: {component:?}");
    }

    // --- Step 3: Break the chain ---

    let removed = host
        .destroy_block(&mut manager, BlockPos::new(2, 64, 0))
        .expect("removal succeeds");
    println!(
        "\nremoved the first resistor: {} graphs now, {} retired",
        manager.graph_count(),
        removed.change.removed.len()
    );
    for graph in manager.graphs() {
        println!("  {}: {} cells", graph.id(), graph.len());
    }
}
