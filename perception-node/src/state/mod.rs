mod live;
mod status;

pub use live::{LiveState, Snapshot};
pub use status::StatusStore;
