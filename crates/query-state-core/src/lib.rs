pub mod error;
pub mod ids;
pub mod options;
pub mod search_params;
mod value;

pub use error::{QueryStateError, Result};
pub use ids::SessionId;
pub use options::{AdapterOptions, HistoryMode, Options};
pub use search_params::SearchParams;
pub use value::QueryValue;
