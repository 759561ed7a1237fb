use crate::{Controller, RunnerMetrics};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyStore {
    controllers: Vec<Controller>,
    received: bool,
}

impl TopologyStore {
    pub fn replace(&mut self, controllers: Vec<Controller>) {
        self.controllers = controllers;
        self.received = true;
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn get(&self, id: &str) -> Option<&Controller> {
        self.controllers.iter().find(|ctrl| ctrl.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// False until the first `ctrls` snapshot lands.
    pub fn has_snapshot(&self) -> bool {
        self.received
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsStore {
    runners: Vec<RunnerMetrics>,
}

impl MetricsStore {
    pub fn replace(&mut self, runners: Vec<RunnerMetrics>) {
        self.runners = runners;
    }

    pub fn clear(&mut self) {
        self.runners.clear();
    }

    pub fn runners(&self) -> &[RunnerMetrics] {
        &self.runners
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.runners.iter().map(|runner| runner.samples.len()).sum()
    }
}
