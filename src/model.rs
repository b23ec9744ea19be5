//! The generator model: variable, header, message and state tables plus the
//! automaton's current and next state.
//!
//! A `Model` is an ordinary value; build as many independent automata as
//! needed. Loading lives in [`crate::builder`], ticking in [`crate::executor`].

use crate::clock::{Clock, SystemClock};
use crate::header::Header;
use crate::message::Message;
use crate::state::{State, Variables};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::PathBuf;

/// Lifecycle of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    NotInitialized,
    Initialized,
    Running,
    Stopped,
}

impl ModelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelStatus::NotInitialized => "Model not initialized",
            ModelStatus::Initialized => "Model initialized",
            ModelStatus::Running => "Model running",
            ModelStatus::Stopped => "Model stopped",
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub(crate) variables: Variables,
    pub(crate) headers: Vec<Header>,
    pub(crate) headers_by_name: HashMap<String, usize>,
    pub(crate) messages: Vec<Message>,
    pub(crate) messages_by_name: HashMap<String, usize>,
    pub(crate) states: Vec<State>,
    pub(crate) states_by_name: HashMap<String, usize>,
    pub(crate) current: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) status: ModelStatus,
    pub(crate) source: Option<PathBuf>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) rng: StdRng,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    /// Empty model driven by the system clock.
    pub fn new() -> Self {
        Model::with_clock(Box::new(SystemClock::default()))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Model {
            variables: Variables::new(),
            headers: Vec::new(),
            headers_by_name: HashMap::new(),
            messages: Vec::new(),
            messages_by_name: HashMap::new(),
            states: Vec::new(),
            states_by_name: HashMap::new(),
            current: None,
            next: None,
            status: ModelStatus::NotInitialized,
            source: None,
            clock,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Make random payload fill reproducible.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Empty every table and forget both state references.
    pub fn clear(&mut self) {
        self.current = None;
        self.next = None;
        self.variables.clear();
        self.headers.clear();
        self.headers_by_name.clear();
        self.messages.clear();
        self.messages_by_name.clear();
        self.states.clear();
        self.states_by_name.clear();
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    pub fn stop(&mut self) {
        self.status = ModelStatus::Stopped;
    }

    /// Path of the last file handed to [`Model::setup`].
    pub fn source(&self) -> Option<&std::path::Path> {
        self.source.as_deref()
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<i32> {
        self.variables.get(name).copied()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers_by_name.get(name).map(|&i| &self.headers[i])
    }

    pub fn messages_table(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages_by_name.get(name).map(|&i| &self.messages[i])
    }

    /// States in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states_by_name.get(name).map(|&i| &self.states[i])
    }

    pub fn next_state_name(&self) -> Option<&str> {
        self.next.map(|i| self.states[i].name.as_str())
    }

    pub fn is_loaded(&self) -> bool {
        self.next.is_some()
    }
}
