//! Swerve drive executable
//!
//! Runs the motion control pipeline against simulated modules.
//!
//! # Architecture
//!
//! Each tick of the main loop:
//!
//!     - Behaviour processing, which commands the drive
//!     - Drive processing, if no behaviour commanded it, to hold it stopped
//!     - Telemetry

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::{
    f64::consts::FRAC_PI_2,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use swerve_lib::{
    behaviour::{Behaviour, FollowTrajectoryList, Rotate, Scheduler},
    context::{RobotContext, RobotMode},
    drive::{Hardware, InitData, SwerveDrive},
    geom::Pose2,
    params::SwerveExecParams,
    trajectory::{
        CapsizeConstraint, CentripetalConstraint, Path, ScheduleGenerator,
        SwerveDriveDynamicsConstraint, Trajectory, TrajectoryError, YawRateConstraint,
    },
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
    telemetry::{CsvSink, LogSink, Telemetry},
    time::duration_to_seconds,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Fraction of the drive's limits used when timing the demo trajectories.
const TRAJECTORY_SPEED_FACTOR: f64 = 0.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "swerve_exec", about = "Simulated swerve drive motion control")]
struct Opt {
    /// Parameter file, relative to the params directory
    #[structopt(short, long, default_value = "swerve_exec.toml")]
    params: String,

    /// Behaviour to run: "rotate" or "square"
    #[structopt(short, long, default_value = "square")]
    behaviour: String,

    /// Simulated duration in seconds
    #[structopt(short, long, default_value = "10")]
    duration: f64,

    /// Archive telemetry into the session directory
    #[structopt(short, long)]
    archive: bool,

    /// Run as fast as possible instead of in real time
    #[structopt(short, long)]
    fast: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("swerve_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Swerve Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: SwerveExecParams =
        util::params::load(&opt.params).wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TELEMETRY ----

    let csv_sink = if opt.archive {
        Some(Arc::new(
            CsvSink::new(session.arch_root.join("telemetry.csv"))
                .wrap_err("Failed to create the telemetry archive")?,
        ))
    } else {
        None
    };

    let telemetry = match &csv_sink {
        Some(sink) => Telemetry::new(params.telemetry_level, sink.clone()),
        None => Telemetry::new(params.telemetry_level, LogSink),
    };

    // ---- INITIALISE MODULES ----

    let drive = SwerveDrive::init(InitData {
        params: params.drive,
        hardware: Hardware::Simulated,
        telemetry: telemetry.clone(),
    })
    .wrap_err("Failed to initialise the drive")?;

    let mut ctx = RobotContext::new(drive, &telemetry);
    ctx.mode = RobotMode::Autonomous;

    let mut scheduler = Scheduler::new(&telemetry);

    let behaviour = make_behaviour(&opt.behaviour, &ctx, &telemetry)?;
    if !scheduler.schedule(&mut ctx, behaviour) {
        return Err(eyre!("The scheduler refused the behaviour"));
    }

    info!("Initialisation complete, running for {:.02} s\n", opt.duration);

    // ---- MAIN LOOP ----

    let dt = params.tick_period_s;
    let num_ticks = (opt.duration / dt).ceil() as u64;
    let run_start = Utc::now();

    for _ in 0..num_ticks {
        let tick_start = Instant::now();

        scheduler.run(&mut ctx, dt);

        if let Err(e) = ctx.end_tick(dt) {
            warn!("Drive error: {}", e);
        }

        if scheduler.is_empty() {
            info!("All behaviours finished");
            break;
        }

        if !opt.fast {
            let elapsed = tick_start.elapsed().as_secs_f64();
            if elapsed < dt {
                thread::sleep(Duration::from_secs_f64(dt - elapsed));
            } else {
                warn!("Tick overran by {:.06} s", elapsed - dt);
            }
        }
    }

    // ---- SHUTDOWN ----

    scheduler.cancel_all(&mut ctx);
    ctx.drive.close();

    info!(
        "Ran for {:.03} s, final pose: {:?}",
        duration_to_seconds(Utc::now() - run_start).unwrap_or(std::f64::NAN),
        ctx.pose()
    );

    if let Some(output) = ctx.output() {
        session.save("final_output.json", *output);
    }

    if let Some(sink) = csv_sink {
        sink.close();
    }

    session.exit();

    Ok(())
}

/// Build the behaviour named on the command line.
fn make_behaviour(
    name: &str,
    ctx: &RobotContext,
    telemetry: &Telemetry,
) -> Result<Box<dyn Behaviour>, Report> {
    match name {
        "rotate" => Ok(Box::new(Rotate::new(
            ctx.pose().heading_rad + FRAC_PI_2,
            telemetry,
        ))),
        "square" => {
            let kd = ctx.drive.kinodynamics().clone();
            let generator = ScheduleGenerator::new(vec![
                Box::new(CentripetalConstraint::new(
                    kd.max_capsize_accel_mss() * TRAJECTORY_SPEED_FACTOR,
                )),
                Box::new(SwerveDriveDynamicsConstraint::new(kd.clone())),
                Box::new(CapsizeConstraint::new(kd.clone(), TRAJECTORY_SPEED_FACTOR)),
                Box::new(YawRateConstraint::new(&kd, TRAJECTORY_SPEED_FACTOR)),
            ]);
            let max_velocity_ms = kd.max_drive_velocity_ms() * TRAJECTORY_SPEED_FACTOR;
            let max_accel_mss = kd.max_drive_acceleration_mss() * TRAJECTORY_SPEED_FACTOR;

            let trajectories = square(&ctx.pose(), 1.0)
                .wrap_err("Failed to build the square")?
                .iter()
                .map(|path| {
                    generator.time_parameterize(path, 0.0, 0.0, max_velocity_ms, max_accel_mss)
                })
                .collect::<Result<Vec<Trajectory>, _>>()
                .wrap_err("Failed to time the square")?;

            Ok(Box::new(FollowTrajectoryList::fixed(trajectories, telemetry)))
        }
        other => Err(eyre!("Unknown behaviour \"{}\"", other)),
    }
}

/// Four straight sides of a square with the given side length, starting
/// from `start`, turning a quarter at each corner.
fn square(start: &Pose2, side_m: f64) -> Result<Vec<Path>, TrajectoryError> {
    let corners = [
        (0.0, 0.0),
        (side_m, 0.0),
        (side_m, side_m),
        (0.0, side_m),
        (0.0, 0.0),
    ];

    corners
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let heading = start.heading_rad + FRAC_PI_2 * i as f64;
            let from = Pose2::new(start.x_m() + w[0].0, start.y_m() + w[0].1, heading);
            let to = Pose2::new(start.x_m() + w[1].0, start.y_m() + w[1].1, heading + FRAC_PI_2);
            Path::straight(from, to, 0.05)
        })
        .collect()
}
