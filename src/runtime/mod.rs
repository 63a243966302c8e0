//! Runtime Module
//!
//! Host-facing layer: subsystem scheduling, the adapters that expose game
//! services as subsystems, the fixed-step clock and service assembly.
//!
//! ## Module Structure
//!
//! - `scheduler`: descriptors, priority-ordered boot, frame loop
//! - `systems`: subsystem adapters over the game services
//! - `clock`: fixed-timestep accumulator
//! - `simulation`: builds and wires everything

pub mod scheduler;
pub mod systems;
pub mod clock;
pub mod simulation;

pub use scheduler::{default_descriptors, Scheduler, SchedulerError, Subsystem, SubsystemDescriptor};
pub use systems::ContentSource;
pub use clock::FrameClock;
pub use simulation::Simulation;
