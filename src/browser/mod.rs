pub mod manager;

pub use manager::{BrowserManager, SessionError, Viewport};
