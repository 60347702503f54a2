pub mod requests;
pub mod responses;
pub mod script;
pub mod session;

pub use requests::*;
pub use responses::*;
pub use script::*;
pub use session::*;
