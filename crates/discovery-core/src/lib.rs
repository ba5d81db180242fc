mod controller;
mod error;
mod export;
mod outcome;
mod state;

pub use controller::{end_allowed, SessionController, DEFAULT_MIN_EXCHANGES};
pub use error::{RequiredField, SessionError};
pub use export::{render_export, DEFAULT_EXPORT_FILE, FEEDBACK_HEADER, TRANSCRIPT_HEADER};
pub use outcome::TurnOutcome;
pub use state::{BusinessContext, Persona, PersonaChoice, Phase, SessionState, SetupForm};
