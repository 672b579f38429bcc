//! # Setpoint Generator Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nalgebra::Vector2;
use std::{f64::consts::PI, sync::Arc};
use swerve_lib::{
    geom::Pose2,
    kinematics::{presets, ChassisSpeeds, SwerveKinodynamics},
    setpoint_gen::{SetpointGenerator, SwerveSetpoint},
    trajectory::{CapsizeConstraint, CentripetalConstraint, Path, ScheduleGenerator, SwerveDriveDynamicsConstraint},
};
use util::telemetry::Telemetry;

fn setpoint_gen_benchmark(c: &mut Criterion) {
    let kd = Arc::new(SwerveKinodynamics::new(presets::comp_bot()).unwrap());
    let mut generator = SetpointGenerator::new(kd, &Telemetry::disabled());

    // Moving sideways, asked to go forwards and spin, which exercises every
    // limiter
    let start = SwerveSetpoint::default();
    let desired = ChassisSpeeds::new(4.0, 0.0, 3.0);

    c.bench_function("setpoint_gen_tick", |b| {
        b.iter(|| {
            generator.reset(start);
            generator.generate(&ChassisSpeeds::new(0.0, 2.0, 0.0), 0.02);
            black_box(generator.generate(black_box(&desired), 0.02))
        })
    });
}

fn time_parameterize_benchmark(c: &mut Criterion) {
    let kd = Arc::new(SwerveKinodynamics::new(presets::comp_bot()).unwrap());

    let schedule = ScheduleGenerator::new(vec![
        Box::new(CentripetalConstraint::new(kd.max_capsize_accel_mss())),
        Box::new(SwerveDriveDynamicsConstraint::new(kd.clone())),
        Box::new(CapsizeConstraint::new(kd.clone(), 0.8)),
    ]);

    let straight = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(4.0, 0.0, PI / 2.0), 0.02).unwrap();
    let arc = Path::arc(Vector2::zeros(), 1.5, 0.0, PI, 0.0, 0.02).unwrap();

    c.bench_function("time_parameterize_straight", |b| {
        b.iter(|| {
            black_box(
                schedule
                    .time_parameterize(black_box(&straight), 0.0, 0.0, 4.0, 4.0)
                    .unwrap(),
            )
        })
    });

    c.bench_function("time_parameterize_arc", |b| {
        b.iter(|| {
            black_box(
                schedule
                    .time_parameterize(black_box(&arc), 0.0, 0.0, 4.0, 4.0)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, setpoint_gen_benchmark, time_parameterize_benchmark);
criterion_main!(benches);
