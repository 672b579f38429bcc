//! The swerve drive in the robot frame
//!
//! [`SwerveLocal`] knows nothing about the field. It takes robot-relative
//! chassis speeds, makes them feasible and sends one command to each module
//! per tick.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error};
use nalgebra::Vector2;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::sync::Arc;

// Internal
use super::{DesaturationOrder, DriveError, Params, SwerveModule};
use crate::{
    kinematics::{
        ChassisAccelerations, ChassisSpeeds, ModulePosition, ModuleRate, ModuleState,
        SwerveKinodynamics, NUM_MODULES,
    },
    setpoint_gen::{SetpointGenerator, SwerveSetpoint},
    servo::ActuatorFault,
};
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Module angles forming an "X", resisting being pushed.
const DEFENSE_ANGLES_RAD: [f64; NUM_MODULES] =
    [FRAC_PI_4, -FRAC_PI_4, 3.0 * FRAC_PI_4, -3.0 * FRAC_PI_4];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Four swerve modules and the setpoint generator driving them.
pub struct SwerveLocal {
    kinodynamics: Arc<SwerveKinodynamics>,

    modules: [SwerveModule; NUM_MODULES],

    /// Holds the setpoint last sent to the modules, whichever path sent it
    generator: SetpointGenerator,

    setpoint_generator_enabled: bool,
    second_order_enabled: bool,
    desaturation_order: DesaturationOrder,

    /// Angle to give each module when inverse kinematics leaves it stopped
    headings: [Option<f64>; NUM_MODULES],

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveLocal {
    pub fn new(
        kinodynamics: Arc<SwerveKinodynamics>,
        modules: [SwerveModule; NUM_MODULES],
        params: &Params,
        telemetry: &Telemetry,
    ) -> Self {
        let telemetry = telemetry.child("swerve_local");

        Self {
            generator: SetpointGenerator::new(kinodynamics.clone(), &telemetry),
            kinodynamics,
            modules,
            setpoint_generator_enabled: params.setpoint_generator_enabled,
            second_order_enabled: params.second_order_kinematics_enabled,
            desaturation_order: params.desaturation_order,
            headings: [None; NUM_MODULES],
            telemetry,
        }
    }

    // ---- ACTUATORS ----
    //
    // Only one of these may be called per tick.

    /// Drive the modules towards robot-relative `speeds`.
    ///
    /// `yaw_rate_rads` is the measured yaw rate, which stands in for the
    /// previous spin rate when estimating chassis acceleration. Returns the
    /// fraction of the requested change that was achieved, 1 without the
    /// setpoint generator.
    pub fn set_chassis_speeds(
        &mut self,
        speeds: &ChassisSpeeds,
        yaw_rate_rads: f64,
        dt: f64,
    ) -> Result<f64, DriveError> {
        self.telemetry
            .log_serialize(Level::Trace, "desired_speeds", || *speeds);

        if self.setpoint_generator_enabled {
            self.set_with_generator(speeds, dt)
        } else {
            self.set_directly(speeds, yaw_rate_rads, dt)?;
            Ok(1.0)
        }
    }

    /// Turn the modules towards the angles needed for `speeds` without
    /// driving. Returns true once every module is at its goal.
    pub fn steer_at_rest(&mut self, speeds: &ChassisSpeeds, dt: f64) -> Result<bool, DriveError> {
        let kinematics = self.kinodynamics.kinematics();
        let prev = *self.generator.prev();

        let mut states = kinematics.to_module_states(speeds, &self.headings);
        for (state, prev) in states.iter_mut().zip(prev.states.iter()) {
            if state.angle_rad.is_none() {
                state.angle_rad = prev.angle_rad;
            }
            state.speed_ms = 0.0;
        }

        let result = self.set_raw_module_states(&states, dt);

        let aligned = self.at_goal().iter().all(|g| *g);
        self.telemetry.log_bool(Level::Debug, "aligned", || aligned);

        result.map(|_| aligned)
    }

    /// Point the wheels in an "X".
    pub fn defense(&mut self, dt: f64) -> Result<(), DriveError> {
        let mut states = [ModuleState::default(); NUM_MODULES];
        for (s, a) in states.iter_mut().zip(DEFENSE_ANGLES_RAD.iter()) {
            *s = ModuleState::at_rest(*a);
        }
        self.set_raw_module_states(&states, dt)
    }

    /// Point every wheel straight ahead.
    pub fn steer0(&mut self, dt: f64) -> Result<(), DriveError> {
        self.set_raw_module_states(&[ModuleState::at_rest(0.0); NUM_MODULES], dt)
    }

    /// Point every wheel to the left.
    pub fn steer90(&mut self, dt: f64) -> Result<(), DriveError> {
        self.set_raw_module_states(&[ModuleState::at_rest(FRAC_PI_2); NUM_MODULES], dt)
    }

    /// Send the states as given, without desaturating or optimizing, and
    /// remember their angles as the headings for stopped modules.
    pub fn set_raw_module_states(
        &mut self,
        states: &[ModuleState; NUM_MODULES],
        dt: f64,
    ) -> Result<(), DriveError> {
        let (sent, fault) = self.dispatch(states, &[ModuleRate::default(); NUM_MODULES], dt, true);
        self.reset_headings(&sent);
        self.commit(&sent);

        match fault {
            Some(f) => Err(DriveError::ActuatorFault(f)),
            None => Ok(()),
        }
    }

    /// Stop all modules where they are.
    pub fn stop(&mut self) {
        for m in self.modules.iter_mut() {
            m.stop();
        }

        let mut states = self.generator.prev().states;
        for s in states.iter_mut() {
            s.speed_ms = 0.0;
        }
        self.generator
            .commit(SwerveSetpoint::new(ChassisSpeeds::zero(), states));
    }

    // ---- OBSERVERS ----

    pub fn desired_states(&self) -> [ModuleState; NUM_MODULES] {
        let mut states = [ModuleState::default(); NUM_MODULES];
        for (s, m) in states.iter_mut().zip(self.modules.iter()) {
            *s = m.desired();
        }
        states
    }

    pub fn states(&self) -> [Option<ModuleState>; NUM_MODULES] {
        let mut states = [None; NUM_MODULES];
        for (s, m) in states.iter_mut().zip(self.modules.iter()) {
            *s = m.state();
        }
        states
    }

    pub fn positions(&self) -> [Option<ModulePosition>; NUM_MODULES] {
        let mut positions = [None; NUM_MODULES];
        for (p, m) in positions.iter_mut().zip(self.modules.iter()) {
            *p = m.position();
        }
        positions
    }

    pub fn at_setpoint(&self) -> [bool; NUM_MODULES] {
        let mut at = [false; NUM_MODULES];
        for (a, m) in at.iter_mut().zip(self.modules.iter()) {
            *a = m.at_setpoint();
        }
        at
    }

    pub fn at_goal(&self) -> [bool; NUM_MODULES] {
        let mut at = [false; NUM_MODULES];
        for (a, m) in at.iter_mut().zip(self.modules.iter()) {
            *a = m.at_goal();
        }
        at
    }

    pub fn module_locations(&self) -> &[Vector2<f64>; NUM_MODULES] {
        self.kinodynamics.kinematics().module_locations()
    }

    /// The setpoint last sent to the modules.
    pub fn setpoint(&self) -> &SwerveSetpoint {
        self.generator.prev()
    }

    /// The setpoint generator's scale factor on the last tick it ran.
    pub fn last_scalar(&self) -> f64 {
        self.generator.last_scalar()
    }

    pub fn kinodynamics(&self) -> &Arc<SwerveKinodynamics> {
        &self.kinodynamics
    }

    // ---- LIFECYCLE ----

    /// Replace the setpoint the next tick moves on from.
    pub fn reset_setpoint(&mut self, setpoint: SwerveSetpoint) {
        self.generator.reset(setpoint);
    }

    /// Remember these angles for modules that inverse kinematics leaves
    /// stopped. Absent angles are left as they were.
    pub fn reset_headings(&mut self, states: &[ModuleState; NUM_MODULES]) {
        for (h, s) in self.headings.iter_mut().zip(states.iter()) {
            if s.angle_rad.is_some() {
                *h = s.angle_rad;
            }
        }
    }

    /// Re-anchor every servo on its measurement and restart the setpoint
    /// from the measured module states.
    pub fn reset(&mut self) {
        for m in self.modules.iter_mut() {
            m.reset();
        }

        let mut states = [ModuleState::default(); NUM_MODULES];
        for (s, m) in states.iter_mut().zip(self.modules.iter()) {
            *s = m.state().unwrap_or_else(|| ModuleState::new(0.0, None));
        }
        let speeds = self.kinodynamics.kinematics().to_chassis_speeds(&states);

        self.reset_headings(&states);
        self.generator.reset(SwerveSetpoint::new(speeds, states));
    }

    /// Update the module sensors. Call once per tick before any actuator
    /// method.
    pub fn periodic(&mut self, dt: f64) {
        for m in self.modules.iter_mut() {
            m.periodic(dt);
        }
    }

    pub fn close(&mut self) {
        for m in self.modules.iter_mut() {
            m.close();
        }
    }

    // ---- PRIVATE ----

    fn set_with_generator(&mut self, speeds: &ChassisSpeeds, dt: f64) -> Result<f64, DriveError> {
        let prev = *self.generator.prev();

        let desired = match self.desaturation_order {
            DesaturationOrder::BeforeGenerator => {
                let kinematics = self.kinodynamics.kinematics();
                let mut states = kinematics.to_module_states(speeds, &prev.angles());
                self.kinodynamics.desaturate(&mut states, &prev.states, dt);
                kinematics.to_chassis_speeds(&states)
            }
            DesaturationOrder::AfterGenerator => *speeds,
        };

        let setpoint = self.generator.generate(&desired, dt);
        let scalar = self.generator.last_scalar();

        let mut states = setpoint.states;
        if self.desaturation_order == DesaturationOrder::AfterGenerator {
            self.kinodynamics.desaturate(&mut states, &prev.states, dt);
        }

        self.telemetry.log_f64(Level::Debug, "s", || scalar);
        self.telemetry
            .log_serialize(Level::Trace, "setpoint_delta", || setpoint.speeds - *speeds);

        // The generator already reverses wheels where that is quicker
        let (sent, fault) = self.dispatch(&states, &[ModuleRate::default(); NUM_MODULES], dt, true);
        self.reset_headings(&sent);
        self.commit(&sent);

        match fault {
            Some(f) => Err(DriveError::ActuatorFault(f)),
            None => Ok(scalar),
        }
    }

    fn set_directly(
        &mut self,
        speeds: &ChassisSpeeds,
        yaw_rate_rads: f64,
        dt: f64,
    ) -> Result<(), DriveError> {
        let prev = *self.generator.prev();
        let discrete = speeds.discretize(dt);

        let (mut states, rates) = if self.second_order_enabled {
            let mut heading_states = [ModuleState::default(); NUM_MODULES];
            for (s, h) in heading_states.iter_mut().zip(self.headings.iter()) {
                *s = ModuleState::new(0.0, *h);
            }

            let prev_speeds = ChassisSpeeds::new(prev.speeds.vx_ms, prev.speeds.vy_ms, yaw_rate_rads);
            let accels = ChassisAccelerations::between(&prev_speeds, &discrete, dt);

            self.kinodynamics
                .second_order()
                .to_module_states(&discrete, &accels, &heading_states)
        } else {
            (
                self.kinodynamics
                    .kinematics()
                    .to_module_states(&discrete, &self.headings),
                [ModuleRate::default(); NUM_MODULES],
            )
        };

        let s = self.kinodynamics.desaturate(&mut states, &prev.states, dt);
        if s < 1.0 {
            debug!("Desaturated request by {:.3}", s);
        }

        let (sent, fault) = self.dispatch(&states, &rates, dt, false);
        self.reset_headings(&sent);
        self.commit(&sent);

        match fault {
            Some(f) => Err(DriveError::ActuatorFault(f)),
            None => Ok(()),
        }
    }

    /// Send one command to every module, returning what was actually sent
    /// and the first fault. A faulted module is stopped and the others are
    /// still commanded.
    fn dispatch(
        &mut self,
        states: &[ModuleState; NUM_MODULES],
        rates: &[ModuleRate; NUM_MODULES],
        dt: f64,
        raw: bool,
    ) -> ([ModuleState; NUM_MODULES], Option<ActuatorFault>) {
        let mut sent = *states;
        let mut first_fault = None;

        for i in 0..NUM_MODULES {
            let module = &mut self.modules[i];

            let result = if raw {
                module.set_raw_desired_state(&states[i], &rates[i], dt)
            } else {
                module.set_desired_state(&states[i], &rates[i], dt)
            };

            match result {
                Ok(s) => sent[i] = s,
                Err(fault) => {
                    error!("Module {} stopped: {}", module.name(), fault);
                    self.telemetry
                        .log_str(Level::Comp, "fault", || fault.to_string());

                    module.stop();
                    sent[i] = ModuleState::new(0.0, states[i].angle_rad);

                    if first_fault.is_none() {
                        first_fault = Some(fault);
                    }
                }
            }
        }

        (sent, first_fault)
    }

    /// Record what was sent as the setpoint the next tick starts from.
    fn commit(&mut self, sent: &[ModuleState; NUM_MODULES]) {
        let speeds = self.kinodynamics.kinematics().to_chassis_speeds(sent);

        self.telemetry
            .log_serialize(Level::Comp, "achieved_speeds", || speeds);

        self.generator.commit(SwerveSetpoint::new(speeds, *sent));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive::SimulatedModule;
    use crate::kinematics::presets;
    use std::f64::consts::PI;
    use util::telemetry::MemorySink;

    const DT: f64 = 0.02;

    fn local(params: Params) -> ([SimulatedModule; NUM_MODULES], SwerveLocal) {
        let kd = Arc::new(SwerveKinodynamics::new(presets::for_test()).unwrap());
        let sims = SimulatedModule::all(&kd);
        let t = Telemetry::disabled();
        let modules = [
            sims[0].build(&kd, &t),
            sims[1].build(&kd, &t),
            sims[2].build(&kd, &t),
            sims[3].build(&kd, &t),
        ];
        let local = SwerveLocal::new(kd, modules, &params, &t);
        (sims, local)
    }

    fn direct() -> Params {
        Params {
            setpoint_generator_enabled: false,
            ..Params::default()
        }
    }

    #[test]
    fn test_generator_limits_accel() {
        let (_, mut local) = local(Params::default());

        local.periodic(DT);
        let s = local
            .set_chassis_speeds(&ChassisSpeeds::new(5.0, 0.0, 0.0), 0.0, DT)
            .unwrap();

        // One tick of 1 m/s/s towards a request clamped to 1 m/s
        assert!((local.setpoint().speeds.vx_ms - 0.02).abs() < 1e-6);
        assert!(s < 1.0);
        for st in local.desired_states().iter() {
            assert!(st.angle_rad.unwrap().abs() < 1e-9);
        }
    }

    #[test]
    fn test_direct_desaturates() {
        let (_, mut local) = local(direct());

        local.periodic(DT);
        let s = local
            .set_chassis_speeds(&ChassisSpeeds::new(5.0, 0.0, 0.0), 0.0, DT)
            .unwrap();
        assert_eq!(s, 1.0);

        for st in local.desired_states().iter() {
            assert!(st.speed_ms.abs() <= 1.0 + 1e-9);
        }
        assert!((local.setpoint().speeds.vx_ms - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_direct_reversal_records_commanded() {
        let (sims, mut local) = local(direct());

        for _ in 0..200 {
            local.periodic(DT);
            local
                .set_chassis_speeds(&ChassisSpeeds::new(1.0, 0.0, 0.0), 0.0, DT)
                .unwrap();
        }

        local.periodic(DT);
        local
            .set_chassis_speeds(&ChassisSpeeds::new(-1.0, 0.0, 0.0), 0.0, DT)
            .unwrap();

        // Still slowing down at the deceleration limit
        let sp = local.setpoint();
        assert!((sp.speeds.vx_ms - 0.98).abs() < 1e-9);
        for (state, sim) in sp.states.iter().zip(sims.iter()) {
            assert!((state.speed_ms - sim.drive.commanded()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_spin_angles() {
        let (_, mut local) = local(direct());

        local.periodic(DT);
        local
            .set_chassis_speeds(&ChassisSpeeds::new(0.0, 0.0, 0.1), 0.0, DT)
            .unwrap();

        let expected = [3.0 * PI / 4.0, PI / 4.0, -3.0 * PI / 4.0, -PI / 4.0];
        let states = local.desired_states();
        for (s, e) in states.iter().zip(expected.iter()) {
            let a = s.angle_rad.unwrap();
            // Either the angle itself or reversed, depending on the optimizer
            let d = util::maths::angle_modulus(a - e).abs();
            assert!(d < 1e-6 || (d - PI).abs() < 1e-6);
        }
        for s in states.iter() {
            assert!((s.speed_ms.abs() - states[0].speed_ms.abs()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_steer_at_rest_aligns() {
        let (sims, mut local) = local(Params::default());
        let request = ChassisSpeeds::new(0.0, 1.0, 0.0);

        let mut aligned = false;
        for _ in 0..100 {
            local.periodic(DT);
            aligned = local.steer_at_rest(&request, DT).unwrap();
            if aligned {
                break;
            }
        }

        assert!(aligned);
        for sim in sims.iter() {
            assert_eq!(sim.drive.commanded(), 0.0);
            assert!((sim.steering.position() - FRAC_PI_2).abs() < 0.05);
        }
        assert!(local.setpoint().speeds.is_zero(1e-12));
    }

    #[test]
    fn test_defense() {
        let (_, mut local) = local(Params::default());
        local.periodic(DT);
        local.defense(DT).unwrap();

        let states = local.desired_states();
        for (s, a) in states.iter().zip(DEFENSE_ANGLES_RAD.iter()) {
            assert_eq!(s.speed_ms, 0.0);
            assert!((s.angle_rad.unwrap() - a).abs() < 1e-12);
        }

        // Stopped modules keep the X
        local.periodic(DT);
        local
            .set_chassis_speeds(&ChassisSpeeds::zero(), 0.0, DT)
            .unwrap();
        for (s, a) in local.desired_states().iter().zip(DEFENSE_ANGLES_RAD.iter()) {
            assert!((s.angle_rad.unwrap() - a).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fault_stops_module() {
        let kd = Arc::new(SwerveKinodynamics::new(presets::for_test()).unwrap());
        let sims = SimulatedModule::all(&kd);
        let sink = Arc::new(MemorySink::default());
        let t = Telemetry::new(Level::Comp, sink.clone());
        let modules = [
            sims[0].build(&kd, &t),
            sims[1].build(&kd, &t),
            sims[2].build(&kd, &t),
            sims[3].build(&kd, &t),
        ];
        let mut local = SwerveLocal::new(kd, modules, &direct(), &t);

        sims[1].drive.set_fault(Some("overcurrent"));
        local.periodic(DT);
        let err = local
            .set_chassis_speeds(&ChassisSpeeds::new(0.5, 0.0, 0.0), 0.0, DT)
            .unwrap_err();

        match err {
            DriveError::ActuatorFault(f) => assert_eq!(f.name, "front_right/drive"),
            e => panic!("unexpected error {}", e),
        }
        assert!(sink.get("swerve_local/fault").is_some());

        // The faulted module is recorded as stopped, the others moving
        let sp = local.setpoint();
        assert_eq!(sp.states[1].speed_ms, 0.0);
        assert!(sp.states[0].speed_ms > 0.0);
        assert_eq!(sims[1].drive.commanded(), 0.0);
    }

    #[test]
    fn test_stop_keeps_angles() {
        let (_, mut local) = local(direct());
        local.periodic(DT);
        local.steer90(DT).unwrap();
        local.stop();

        for s in local.setpoint().states.iter() {
            assert_eq!(s.speed_ms, 0.0);
            assert!((s.angle_rad.unwrap() - FRAC_PI_2).abs() < 1e-12);
        }
    }
}
