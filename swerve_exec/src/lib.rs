//! # Swerve drive motion control library
//!
//! Converts motion intents (field-relative velocities, trajectories,
//! rotate-in-place goals, servo goals) into per-module drive velocity and
//! steering angle commands which respect the robot's kinodynamic limits.
//!
//! The pipeline is layered as:
//!
//! - [`behaviour`] - long running actions, run once per tick by the scheduler
//! - [`control`] - holonomic controllers producing field-relative velocities
//! - [`drive`] - the drive subsystem, frame transform and odometry
//! - [`setpoint_gen`] - the per-tick feasibility filter on chassis speeds
//! - [`kinematics`] - chassis to module conversions and limits
//! - [`servo`] - drive and steering servos over opaque actuators

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Behaviours and their scheduler
pub mod behaviour;

/// Context owning the subsystems, passed to behaviours
pub mod context;

/// Holonomic trajectory and heading controllers
pub mod control;

/// The swerve drive subsystem
pub mod drive;

/// Poses and twists in the plane
pub mod geom;

/// Swerve kinematics and kinodynamic limits
pub mod kinematics;

/// Executable parameters
pub mod params;

/// Trapezoid motion profiles
pub mod profile;

/// Feasible setpoint generation
pub mod setpoint_gen;

/// Actuator and sensor contracts, and the servos built on them
pub mod servo;

/// Time parameterisation and sampling of paths
pub mod trajectory;
