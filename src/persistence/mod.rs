pub mod cookies;
pub mod state;

pub use cookies::{CookieJar, CookieRecord};
pub use state::{JsonFileStateStore, RunState, StateStore};
