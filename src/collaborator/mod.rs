//! External collaborators: the producer, verifier and publisher.
//!
//! The scheduler never calls these itself. The daemon's tick asks the
//! coordinator for admission, calls one collaborator with no store lock held,
//! and feeds the outcome back as progress and as a trigger-monitor sample.

mod command;
mod traits;

pub use command::{CommandConfig, CommandProducer, CommandPublisher, CommandVerifier, DUPLICATE_EXIT_CODE};
pub use traits::{AutoApprove, Collaborators, Producer, Publisher, Verifier};
