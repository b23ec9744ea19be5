//! Tick execution: advance, read, mutate, decide.
//!
//! The four steps are exposed separately so a host can send the produced
//! buffers before the state's operations and transitions run. [`Model::tick`]
//! chains them.

use crate::error::ModelError;
use crate::field::format_bits;
use crate::message::Route;
use crate::model::{Model, ModelStatus};
use crate::state::State;
use tracing::debug;

/// Result of one full tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutput {
    /// State that was current during the tick.
    pub state: String,
    /// One buffer per message of the state, in declaration order.
    pub messages: Vec<Vec<u8>>,
    /// Routing metadata parallel to `messages`.
    pub routes: Vec<Route>,
}

impl Model {
    /// `current := next`.
    pub fn advance(&mut self) -> Result<(), ModelError> {
        let next = self.next.ok_or(ModelError::NotLoaded)?;
        self.current = Some(next);
        if self.status == ModelStatus::Initialized {
            self.status = ModelStatus::Running;
        }
        Ok(())
    }

    pub fn current_state(&self) -> Result<&State, ModelError> {
        self.current
            .map(|i| &self.states[i])
            .ok_or(ModelError::NotLoaded)
    }

    pub fn current_state_name(&self) -> Result<&str, ModelError> {
        self.current_state().map(|s| s.name.as_str())
    }

    /// Build the bytes of every message of the current state.
    pub fn messages(&mut self) -> Result<Vec<Vec<u8>>, ModelError> {
        let current = self.current.ok_or(ModelError::NotLoaded)?;
        let Model {
            states,
            messages,
            headers,
            clock,
            rng,
            ..
        } = self;
        let mut out = Vec::with_capacity(states[current].messages.len());
        for &m in &states[current].messages {
            let message = &messages[m];
            let header = message.header.map(|h| &headers[h]).ok_or_else(|| {
                ModelError::Integrity(format!(
                    "message '{}' has no bound header",
                    message.name
                ))
            })?;
            let bytes = message.build(header, &**clock, rng);
            debug!(message = %message.name, len = bytes.len(), bits = %format_bits(&bytes), "message built");
            out.push(bytes);
        }
        Ok(out)
    }

    /// Routing metadata of every message of the current state.
    pub fn routes(&self) -> Result<Vec<Route>, ModelError> {
        let state = self.current_state()?;
        Ok(state
            .messages
            .iter()
            .map(|&m| self.messages[m].route.clone())
            .collect())
    }

    fn route_column<T>(&self, f: impl Fn(&Route) -> T) -> Result<Vec<T>, ModelError> {
        let state = self.current_state()?;
        Ok(state
            .messages
            .iter()
            .map(|&m| f(&self.messages[m].route))
            .collect())
    }

    pub fn messages_src_ip(&self) -> Result<Vec<String>, ModelError> {
        self.route_column(|r| r.src_ip.clone())
    }

    pub fn messages_dst_ip(&self) -> Result<Vec<String>, ModelError> {
        self.route_column(|r| r.dst_ip.clone())
    }

    pub fn messages_interface(&self) -> Result<Vec<String>, ModelError> {
        self.route_column(|r| r.interface.clone())
    }

    pub fn messages_src_port(&self) -> Result<Vec<u32>, ModelError> {
        self.route_column(|r| r.src_port)
    }

    pub fn messages_dst_port(&self) -> Result<Vec<u32>, ModelError> {
        self.route_column(|r| r.dst_port)
    }

    /// Run the current state's operations against the variable table.
    pub fn run_operations(&mut self) -> Result<(), ModelError> {
        let current = self.current.ok_or(ModelError::NotLoaded)?;
        self.states[current].run_operations(&mut self.variables)
    }

    /// Evaluate the current state's transitions; the first that fires sets the
    /// next state. When none fires the next state is left unchanged.
    pub fn run_transitions(&mut self) -> Result<(), ModelError> {
        let current = self.current.ok_or(ModelError::NotLoaded)?;
        if let Some(dest) = self.states[current].run_transitions(&self.variables)? {
            debug!(
                from = %self.states[current].name,
                to = %self.states[dest].name,
                "transition taken"
            );
            self.next = Some(dest);
        }
        Ok(())
    }

    /// One full tick.
    pub fn tick(&mut self) -> Result<TickOutput, ModelError> {
        self.advance()?;
        let messages = self.messages()?;
        let routes = self.routes()?;
        let state = self.current_state_name()?.to_string();
        self.run_operations()?;
        self.run_transitions()?;
        Ok(TickOutput {
            state,
            messages,
            routes,
        })
    }
}
