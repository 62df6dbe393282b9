//! SSO service resources.

mod population;
mod populations;

pub use population::{PopulationModel, PopulationResource};
pub use populations::{PopulationsDataSource, PopulationsModel};
