//! The Abyss Controller and the glue around it.

pub mod feedback;
pub mod report;
pub mod run;

pub use feedback::{FeedbackPlayer, SoundCue};
pub use report::{MethodAttempt, RunMode, RunReport};
pub use run::AbyssController;
