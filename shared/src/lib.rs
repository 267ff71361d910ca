pub mod layer;
pub mod server_legend;
pub mod snapshot;

pub use layer::*;
pub use server_legend::*;
pub use snapshot::*;
