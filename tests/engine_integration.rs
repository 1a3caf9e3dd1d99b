//! End-to-end engine behavior: pointer tools, parameters, listeners and the
//! fixed-rate driver

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{cpu_config, cpu_engine, DT};
use fluid_engine::constants::thermal;
use fluid_engine::particles::DiscEmitter;
use fluid_engine::{
    FixedRateDriver, InputEvent, ListenerId, ListenerRegistry, Material, MouseMode, ParameterChange,
    ParticleSet, PointerButton, SimulationConfig, SimulationListener, SimulationState,
};
use glam::Vec2;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};

/// Records the particle count of every state it is shown
#[derive(Default)]
struct CountingListener {
    seen: Mutex<Vec<usize>>,
}

impl SimulationListener for CountingListener {
    fn on_simulation_updated(&self, state: &SimulationState) {
        self.seen.lock().push(state.particle_count());
    }
}

/// Appends its tag to a shared log
struct OrderedListener {
    tag: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl SimulationListener for OrderedListener {
    fn on_simulation_updated(&self, _state: &SimulationState) {
        self.log.lock().push(self.tag);
    }
}

#[test]
fn test_zero_radius_spawn_stacks_on_center() {
    let emitter = DiscEmitter {
        rate: 5.0,
        radius: 0.0,
        material: Material::Oil,
    };
    let mut rng = StdRng::seed_from_u64(1);
    let spawned = emitter.spawn_into(&ParticleSet::empty(), Vec2::new(100.0, 100.0), &mut rng);

    assert_eq!(spawned.len(), 5);
    for i in 0..spawned.len() {
        let particle = spawned.particle(i).unwrap();
        assert_eq!(particle.position, Vec2::new(100.0, 100.0));
        assert_eq!(particle.velocity, Vec2::ZERO);
        assert_eq!(particle.temperature, thermal::INITIAL_TEMPERATURE);
        assert_eq!(particle.material, Material::Oil.index());
    }
}

#[test]
fn test_engine_spawn_stays_inside_disc() {
    let mut engine = cpu_engine(cpu_config());
    engine.clear_particles().unwrap();
    engine.set_material(Material::Gasoline);

    let added = engine.spawn_at(Vec2::new(100.0, 100.0)).unwrap();
    assert_eq!(added, 5);

    let particles = engine.state().particles();
    assert_eq!(particles.len(), 5);
    for i in 0..5 {
        assert!(particles.position(i).distance(Vec2::new(100.0, 100.0)) <= engine.config().spawn_radius);
        assert_eq!(particles.materials()[i], Material::Gasoline.index());
    }
}

#[test]
fn test_engine_zero_radius_spawns_on_cursor() {
    let mut engine = cpu_engine(SimulationConfig {
        spawn_radius: 0.0,
        ..cpu_config()
    });
    assert_eq!(engine.config().spawn_radius, 0.0);
    engine.clear_particles().unwrap();

    let added = engine.spawn_at(Vec2::new(100.0, 100.0)).unwrap();
    assert_eq!(added, 5);

    let particles = engine.state().particles();
    for i in 0..particles.len() {
        assert_eq!(particles.position(i), Vec2::new(100.0, 100.0));
        assert_eq!(particles.velocity(i), Vec2::ZERO);
    }

    engine.apply_parameter(ParameterChange::SpawnRadius(-3.0));
    assert_eq!(engine.config().spawn_radius, 0.0);
}

#[test]
fn test_spawn_events_from_another_thread() {
    let mut engine = cpu_engine(cpu_config());
    let start = engine.state().particle_count();
    let sender = engine.input_sender();

    let worker = thread::spawn(move || {
        assert!(sender.send(InputEvent::SpawnAt { x: 120.0, y: 80.0 }));
        assert!(sender.send(InputEvent::SpawnAt { x: 180.0, y: 80.0 }));
    });
    worker.join().expect("sender thread panicked");

    engine.tick(DT).unwrap();
    assert_eq!(engine.state().particle_count(), start + 10);
}

#[test]
fn test_set_temperature_reads_back_exactly() {
    let mut engine = cpu_engine(cpu_config());
    engine.set_temperature(50.0);
    assert!(engine.state().particles().temperatures().iter().all(|&t| t == 50.0));

    // Rewinding with no history holds the frame still
    engine.push_input(InputEvent::SetTemperature(150.0));
    engine.push_input(InputEvent::RewindPressed);
    engine.tick(DT).unwrap();
    assert!(engine
        .state()
        .particles()
        .temperatures()
        .iter()
        .all(|&t| t == thermal::MAX_TEMPERATURE));
}

#[test]
fn test_cooling_brush_lowers_nearby_temperature() {
    let mut engine = cpu_engine(cpu_config());
    engine.push_input(InputEvent::SetMouseMode(MouseMode::Temperature));
    engine.push_input(InputEvent::PointerMoved { x: 50.0, y: 50.0 });
    engine.push_input(InputEvent::PointerPressed(PointerButton::Secondary));
    engine.tick(DT).unwrap();

    let temperatures = engine.state().particles().temperatures();
    assert!(temperatures[0] < thermal::INITIAL_TEMPERATURE);
    assert_eq!(engine.mouse_mode(), MouseMode::Temperature);
}

#[test]
fn test_listeners_see_every_step_in_order() {
    let mut engine = cpu_engine(cpu_config());
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = engine.add_listener(Arc::new(OrderedListener {
        tag: 1,
        log: Arc::clone(&log),
    }));
    engine.add_listener(Arc::new(OrderedListener {
        tag: 2,
        log: Arc::clone(&log),
    }));

    engine.tick(DT).unwrap();
    assert_eq!(*log.lock(), vec![1, 2]);

    assert!(engine.remove_listener(first));
    assert!(!engine.remove_listener(first));
    engine.tick(DT).unwrap();
    assert_eq!(*log.lock(), vec![1, 2, 2]);
}

/// Unregisters itself the first time it is notified
struct OneShotListener {
    registry: ListenerRegistry,
    id: Mutex<Option<ListenerId>>,
    calls: AtomicUsize,
}

impl SimulationListener for OneShotListener {
    fn on_simulation_updated(&self, _state: &SimulationState) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = self.id.lock().take() {
            self.registry.remove(id);
        }
    }
}

#[test]
fn test_listener_can_unregister_itself_while_notified() {
    let mut engine = cpu_engine(cpu_config());
    let one_shot = Arc::new(OneShotListener {
        registry: engine.listeners(),
        id: Mutex::new(None),
        calls: AtomicUsize::new(0),
    });
    let id = engine.add_listener(one_shot.clone());
    *one_shot.id.lock() = Some(id);
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.add_listener(Arc::new(OrderedListener {
        tag: 7,
        log: Arc::clone(&log),
    }));

    engine.tick(DT).unwrap();
    engine.tick(DT).unwrap();
    assert_eq!(one_shot.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*log.lock(), vec![7, 7]);
    assert_eq!(engine.listeners().len(), 1);
}

#[test]
fn test_listener_sees_spawned_particles() {
    let mut engine = cpu_engine(cpu_config());
    let listener = Arc::new(CountingListener::default());
    engine.add_listener(listener.clone());

    let start = engine.state().particle_count();
    engine.push_input(InputEvent::SpawnAt { x: 150.0, y: 150.0 });
    engine.tick(DT).unwrap();

    assert_eq!(*listener.seen.lock(), vec![start + 5]);
}

#[test]
fn test_driver_runs_bounded_ticks() {
    let mut engine = cpu_engine(cpu_config());
    let driver = FixedRateDriver::new(500);
    let ticks = driver.run(&mut engine, Some(5)).unwrap();

    assert_eq!(ticks, 5);
    assert_eq!(engine.ticks(), 5);
    assert!(!driver.handle().is_running());
}

#[test]
fn test_driver_stops_from_handle() {
    let mut engine = cpu_engine(SimulationConfig {
        width: 120.0,
        height: 120.0,
        ..cpu_config()
    });
    let driver = FixedRateDriver::new(200);
    let handle = driver.handle();

    let stepped = Arc::new(AtomicUsize::new(0));
    struct TickCounter(Arc<AtomicUsize>);
    impl SimulationListener for TickCounter {
        fn on_simulation_updated(&self, _state: &SimulationState) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
    engine.add_listener(Arc::new(TickCounter(Arc::clone(&stepped))));

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.stop();
    });
    let ticks = driver.run(&mut engine, Some(10_000)).unwrap();
    stopper.join().expect("stopper thread panicked");

    assert!(ticks > 0);
    assert!(ticks < 10_000);
    assert_eq!(stepped.load(Ordering::Relaxed) as u64, ticks);
}
