//! Rewind, ghost branch, loop playback and time acceleration driven through
//! the engine's input queue

mod common;

use std::sync::Arc;

use common::{cpu_config, cpu_engine, BackendCall, RecordingBackend, DT};
use fluid_engine::temporal::HistoryBuffer;
use fluid_engine::{Engine, InputEvent, LoopPhase, ParameterChange, ParticleSet, SimulationConfig};

#[test]
fn test_history_is_bounded_by_rewind_window() {
    let mut engine = cpu_engine(SimulationConfig {
        rewind_seconds: 0.25,
        ..cpu_config()
    });
    assert_eq!(engine.history().capacity(), 15);

    for _ in 0..40 {
        engine.tick(DT).unwrap();
    }
    assert_eq!(engine.history().len(), 15);
}

#[test]
fn test_shrinking_rewind_window_keeps_newest_frames() {
    let mut engine = cpu_engine(SimulationConfig {
        rewind_seconds: 0.5,
        ..cpu_config()
    });
    for _ in 0..30 {
        engine.tick(DT).unwrap();
    }
    let newest = Arc::clone(engine.history().newest().unwrap());

    engine.apply_parameter(ParameterChange::RewindSeconds(0.1));
    assert_eq!(engine.history().capacity(), HistoryBuffer::capacity_for(0.1));
    assert_eq!(engine.history().len(), engine.history().capacity());
    assert!(Arc::ptr_eq(engine.history().newest().unwrap(), &newest));
}

#[test]
fn test_rewind_is_exact_inverse_of_forward_steps() {
    let mut engine = cpu_engine(cpu_config());
    let mut frames: Vec<ParticleSet> = Vec::new();

    for _ in 0..5 {
        engine.tick(DT).unwrap();
        frames.push(ParticleSet::clone(engine.state().particles()));
    }
    assert_eq!(
        engine.history().newest().unwrap().kinematics(),
        frames[4].kinematics()
    );

    engine.push_input(InputEvent::RewindPressed);
    for expected in frames.iter().rev() {
        engine.tick(DT).unwrap();
        assert!(engine.is_rewinding());
        // Bit-for-bit, not approximately
        assert_eq!(engine.state().particles().kinematics(), expected.kinematics());
        assert_eq!(engine.state().particles().temperatures(), expected.temperatures());
    }
    assert!(engine.history().is_empty());

    // Out of history: the state holds at the first stepped frame
    engine.tick(DT).unwrap();
    assert_eq!(engine.state().particles().kinematics(), frames[0].kinematics());

    engine.push_input(InputEvent::RewindReleased);
    engine.tick(DT).unwrap();
    assert!(!engine.is_rewinding());
    assert_ne!(engine.state().particles().kinematics(), frames[0].kinematics());
}

#[test]
fn test_rewind_does_not_step_the_backend() {
    let (backend, calls) = RecordingBackend::new();
    let mut engine = Engine::with_backend(cpu_config(), Box::new(backend));
    for _ in 0..3 {
        engine.tick(DT).unwrap();
    }

    calls.lock().clear();
    engine.push_input(InputEvent::RewindPressed);
    engine.tick(DT).unwrap();

    let calls = calls.lock();
    assert!(calls.iter().all(|call| !matches!(call, BackendCall::Step { .. })));
    assert!(calls.contains(&BackendCall::Prepare(engine.state().particle_count())));
}

#[test]
fn test_ghost_never_mutates_canonical_state() {
    let mut engine = cpu_engine(cpu_config());
    engine.tick(DT).unwrap();
    let canonical = engine.state().clone();
    let history_len = engine.history().len();

    engine.push_input(InputEvent::GhostPressed);
    for _ in 0..10 {
        engine.tick(DT).unwrap();
    }

    assert_eq!(engine.state(), &canonical);
    assert_eq!(engine.history().len(), history_len);

    let ghost = engine.ghost().particles().expect("ghost should be active");
    assert_eq!(ghost.len(), canonical.particle_count());
    assert_ne!(ghost.kinematics(), canonical.particles().kinematics());
    assert!(!Arc::ptr_eq(ghost, canonical.particles()));

    engine.push_input(InputEvent::GhostReleased);
    engine.tick(DT).unwrap();
    assert!(engine.ghost().particles().is_none());
    assert_ne!(engine.state().particles().kinematics(), canonical.particles().kinematics());
}

#[test]
fn test_rewind_takes_precedence_over_ghost() {
    let mut engine = cpu_engine(cpu_config());
    for _ in 0..3 {
        engine.tick(DT).unwrap();
    }
    let oldest_len = engine.history().len();

    engine.push_input(InputEvent::GhostPressed);
    engine.push_input(InputEvent::RewindPressed);
    engine.tick(DT).unwrap();

    assert_eq!(engine.history().len(), oldest_len - 1);
}

#[test]
fn test_loop_playback_is_periodic() {
    let mut engine = cpu_engine(SimulationConfig {
        loop_duration: 2.0,
        ..cpu_config()
    });

    engine.push_input(InputEvent::LoopStart);
    engine.tick(DT).unwrap();
    for _ in 0..10 {
        engine.tick(DT).unwrap();
    }
    engine.push_input(InputEvent::LoopEnd);
    engine.tick(DT).unwrap();
    assert_eq!(engine.loop_recorder().phase(), LoopPhase::Armed);

    let recorder = engine.loop_recorder();
    let start = recorder.start_points().unwrap().to_vec();
    let end = recorder.end_points().unwrap().to_vec();
    assert_eq!(start.len(), end.len());

    let first = recorder.positions_at(0.0).unwrap();
    assert_eq!(first, start);

    // Past the clamp point playback shows the end frame
    let last = recorder.positions_at(1.999).unwrap();
    assert_eq!(last.len(), end.len());
    for (shown, expected) in last.iter().zip(&end) {
        assert!(shown.distance(*expected) < 1e-3);
    }

    // Halfway, scaled by ghost speed
    let mid = recorder.positions_at(1.0).unwrap();
    let weight = 0.5 * SimulationConfig::default().ghost_speed;
    for ((m, s), e) in mid.iter().zip(&start).zip(&end) {
        assert!(m.distance(*s + (*e - *s) * weight) < 1e-3);
    }
}

#[test]
fn test_loop_timer_wraps_during_playback() {
    let mut engine = cpu_engine(SimulationConfig {
        loop_duration: 2.0,
        max_delta_time: 0.1,
        ..cpu_config()
    });
    engine.push_input(InputEvent::LoopStart);
    engine.tick(0.05).unwrap();
    engine.push_input(InputEvent::LoopEnd);
    engine.push_input(InputEvent::LoopTogglePlayback);
    engine.tick(0.1).unwrap();
    assert_eq!(engine.loop_recorder().phase(), LoopPhase::Playing);

    let first = engine.loop_recorder().timer();
    let shown = engine.loop_display_positions().unwrap();

    // One full period later
    for _ in 0..20 {
        engine.tick(0.1).unwrap();
    }
    assert!((engine.loop_recorder().timer() - first).abs() < 1e-3);
    let again = engine.loop_display_positions().unwrap();
    assert_eq!(again.len(), shown.len());
    for (a, b) in shown.iter().zip(&again) {
        assert!(a.distance(*b) < 1e-2, "{:?} vs {:?}", a, b);
    }

    engine.push_input(InputEvent::LoopCancel);
    engine.tick(0.1).unwrap();
    assert_eq!(engine.loop_recorder().phase(), LoopPhase::Idle);
    assert!(engine.loop_display_positions().is_none());
}

#[test]
fn test_acceleration_scales_step_dt() {
    let (backend, calls) = RecordingBackend::new();
    let mut engine = Engine::with_backend(
        SimulationConfig {
            max_time_acceleration: 3.0,
            ..cpu_config()
        },
        Box::new(backend),
    );

    engine.push_input(InputEvent::AcceleratePressed);
    for _ in 0..120 {
        engine.tick(DT).unwrap();
    }
    assert_eq!(engine.acceleration().factor(), 3.0);

    let last_dt = calls
        .lock()
        .iter()
        .rev()
        .find_map(|call| match call {
            BackendCall::Step { dt, .. } => Some(*dt),
            _ => None,
        })
        .unwrap();
    assert!((last_dt - 3.0 * DT).abs() < 1e-6);

    engine.push_input(InputEvent::AccelerateReleased);
    engine.tick(DT).unwrap();
    assert_eq!(engine.acceleration().factor(), 1.0);
}
