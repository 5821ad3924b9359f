//! Cellgrid Core -- connectivity and simulation objects for cells placed in a
//! block world.
//!
//! Cells are small simulation units living inside host-side containers.
//! Neighbouring cells that accept each other are connected, connected cells
//! form graphs, and every graph assembles one circuit and one heat network
//! from the simulation objects of its members.
//!
//! # Placement Pipeline
//!
//! [`container::ContainerMap::place_block`] runs the whole sequence:
//!
//! 1. **Create** -- the provider builds the cell and its object set.
//! 2. **Discover** -- the container queries its horizontal neighbours; both
//!    sides must accept the connection in their own rotated frame.
//! 3. **Record** -- edges are stored on both cells and both containers.
//! 4. **Apply** -- the cell starts, joins or merges graphs.
//! 5. **Rebuild** -- the affected graph re-gathers connections, registers all
//!    components, then wires them.
//!
//! Removal runs the reverse, splitting a graph into fresh ones when the
//! removed cell was a cut vertex.
//!
//! # Key Types
//!
//! - [`mask::DirectionMask`] -- 6-bit direction set with const rotation tables.
//! - [`object::SimulationObjectSet`] -- at most one object per domain.
//! - [`electrical::ElectricalObject`] -- the electrical part of a cell.
//! - [`graph::CellGraph`] -- a connected component and its circuit.
//! - [`manager::CellGraphManager`] -- all cells and graphs of one world.
//! - [`connection::CellConnectionManager`] -- placement and removal.

pub mod cell;
pub mod config;
pub mod connection;
pub mod container;
pub mod dirty;
pub mod electrical;
pub mod graph;
pub mod id;
pub mod manager;
pub mod mask;
pub mod object;
pub mod profiling;
pub mod space;
pub mod thermal;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
