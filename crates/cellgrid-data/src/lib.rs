pub mod loader;
pub mod provider;
pub mod schema;

pub use loader::{load_cellgrid_data, CellgridData, DataLoadError};
