pub mod feedback;
pub mod paper;
pub mod query;
pub mod slot;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use feedback::{FeedbackRecord, SlotIds};
pub use paper::{PaperSummary, PipelineId, PipelineResult};
pub use query::{Query, QueryKey, RawQuery, YearBounds};
pub use slot::{Layout, Ranking, Slot};
