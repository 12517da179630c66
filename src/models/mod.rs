pub mod content;
mod de;
pub mod event;
pub mod session;

pub use content::{ContentUnit, ProblemType, Question};
pub use event::{ClientMessage, ServerEvent};
pub use session::Session;
