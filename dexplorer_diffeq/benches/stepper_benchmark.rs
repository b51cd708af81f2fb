use std::{hint::black_box, sync::Arc};

use criterion::{Criterion, criterion_group, criterion_main};
use dexplorer_diffeq::{
    Model, OdeModel, ParameterRange, Simulation, SimulationConfig, SolvingType,
};
use nalgebra::Vector2;
use rayon::prelude::*;

// Pendulum with angle `theta` and angular velocity `omega`, parameters [g, l].
#[derive(Debug)]
struct Pendulum;

impl OdeModel for Pendulum {
    type Variable = Vector2<f64>;

    fn name(&self) -> &str {
        "pendulum"
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn initial_variable(&self, _parameters: &[f64], _derived: &[f64]) -> Vector2<f64> {
        Vector2::new(1.0, 0.0)
    }

    fn derivative(
        &self,
        parameters: &[f64],
        _derived: &[f64],
        x: &Vector2<f64>,
        _t: f64,
    ) -> Vector2<f64> {
        Vector2::new(x.y, -(parameters[0] / parameters[1]) * x.x.sin())
    }

    fn analytical_solution(&self, _parameters: &[f64], _derived: &[f64], _t: f64) -> Vector2<f64> {
        Vector2::repeat(f64::NAN)
    }
}

fn pendulum_model() -> Arc<Model<Pendulum>> {
    let mut model = Model::new(Pendulum, vec![9.81, 1.0]).unwrap();
    model.init_analysis();
    Arc::new(model)
}

fn simulation(model: &Arc<Model<Pendulum>>, solving_type: SolvingType) -> Simulation<Pendulum> {
    let config = SimulationConfig {
        solving_type,
        parameter_step: 0.01,
        range: ParameterRange::new(0.0, 100.0).unwrap(),
        nondimensionalized: false,
    };
    Simulation::new(model.clone(), config).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let model = pendulum_model();

    for solving_type in [
        SolvingType::ExplicitEuler,
        SolvingType::ExplicitRk2,
        SolvingType::ExplicitRk4,
    ] {
        let simulation = simulation(&model, solving_type);
        c.bench_function(&format!("pendulum {solving_type}"), |b| {
            b.iter(|| black_box(simulation.run()))
        });
    }

    let simulations: Vec<_> = SolvingType::ALL
        .into_iter()
        .map(|solving_type| simulation(&model, solving_type))
        .collect();
    c.bench_function("pendulum all methods parallel", |b| {
        b.iter(|| {
            let trajectories: Vec<_> = simulations.par_iter().map(|s| s.run()).collect();
            black_box(trajectories)
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
