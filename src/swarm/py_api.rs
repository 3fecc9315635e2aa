use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::navigation::RobotIo;
use super::simulation::ForagingSimulation;
use crate::core::{CpfaError, SimulationConfig};
use crate::evolution::{GaConfig, PopulationEngine};

fn to_py_err(e: CpfaError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| to_py_err(e.into()))
}

fn load_config(config_json: Option<&str>) -> PyResult<SimulationConfig> {
    match config_json {
        Some(json) => SimulationConfig::from_json_str(json).map_err(to_py_err),
        None => Ok(SimulationConfig::default()),
    }
}

#[pyclass]
pub struct PySimulation {
    sim: ForagingSimulation,
}

#[pymethods]
impl PySimulation {
    #[new]
    #[pyo3(signature = (config_json=None))]
    pub fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = load_config(config_json)?;
        Ok(Self {
            sim: ForagingSimulation::new(config).map_err(to_py_err)?,
        })
    }

    /// Advance the simulation by 1 tick
    pub fn tick(&mut self) -> u64 {
        self.sim.tick()
    }

    /// Run `ticks` more ticks, or to completion when omitted. Returns the report as JSON.
    #[pyo3(signature = (ticks=None))]
    pub fn run(&mut self, py: Python<'_>, ticks: Option<u64>) -> PyResult<String> {
        let sim = &mut self.sim;
        let report = py.allow_threads(|| match ticks {
            Some(n) => {
                for _ in 0..n {
                    if sim.is_finished() {
                        break;
                    }
                    sim.tick();
                }
                sim.report()
            }
            None => sim.run(),
        });
        to_json(&report)
    }

    pub fn report_json(&self) -> PyResult<String> {
        to_json(&self.sim.report())
    }

    pub fn food_positions(&self) -> Vec<(f64, f64)> {
        self.sim.food().iter().map(|p| (p.x, p.y)).collect()
    }

    /// (strength, waypoints) for every active trail, for rendering.
    pub fn trail_waypoints(&self) -> Vec<(f64, Vec<(f64, f64)>)> {
        self.sim
            .trails()
            .into_iter()
            .map(|t| (t.strength(), t.waypoints().iter().map(|w| (w.x, w.y)).collect()))
            .collect()
    }

    pub fn fidelity_sites(&self) -> Vec<(u32, (f64, f64))> {
        self.sim
            .fidelity_sites()
            .into_iter()
            .map(|e| (e.agent_id, (e.location.x, e.location.y)))
            .collect()
    }

    pub fn robot_poses(&self) -> Vec<(f64, f64, f64)> {
        self.sim
            .bodies()
            .iter()
            .map(|b| (b.position().x, b.position().y, b.heading()))
            .collect()
    }

    /// Extract swarm-level metrics
    pub fn get_macro_state<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let report = self.sim.report();
        let dict = PyDict::new_bound(py);
        dict.set_item("tick", report.ticks)?;
        dict.set_item("food_collected", report.food_collected)?;
        dict.set_item("food_remaining", report.food_remaining)?;
        dict.set_item("active_trails", report.active_trails)?;
        dict.set_item("fidelity_sites", report.fidelity_sites)?;
        dict.set_item("halted_agents", report.halted_agents)?;
        Ok(dict)
    }
}

#[pyclass]
pub struct PyEvolution {
    engine: PopulationEngine,
}

#[pymethods]
impl PyEvolution {
    #[new]
    #[pyo3(signature = (ga_json=None, base_json=None))]
    pub fn new(ga_json: Option<&str>, base_json: Option<&str>) -> PyResult<Self> {
        let ga = match ga_json {
            Some(json) => GaConfig::from_json_str(json).map_err(to_py_err)?,
            None => GaConfig::default(),
        };
        let base = load_config(base_json)?;
        Ok(Self {
            engine: PopulationEngine::new(ga, base).map_err(to_py_err)?,
        })
    }

    /// Score, record and breed one generation. Returns the generation record as JSON.
    pub fn run_generation(&mut self, py: Python<'_>) -> PyResult<String> {
        let engine = &mut self.engine;
        let record = py.allow_threads(|| engine.run_generation());
        to_json(&record)
    }

    pub fn generation(&self) -> u32 {
        self.engine.generation()
    }

    pub fn history_json(&self) -> String {
        self.engine.history().to_json()
    }

    pub fn champion_json(&self) -> PyResult<Option<String>> {
        self.engine.champion().map(to_json).transpose()
    }
}
