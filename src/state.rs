//! Automaton states: operations on variables and guarded transitions.

use crate::error::ModelError;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

/// Variable table: name to current value.
pub type Variables = BTreeMap<String, i32>;

/// Name-keyed reference to a model variable.
///
/// The value is looked up in the table on every use, so a variable removed by
/// `del` is seen as missing by every holder instead of dangling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub name: String,
    bound: bool,
}

impl VarRef {
    /// Reference already checked against the variable table.
    pub fn bound(name: impl Into<String>) -> Self {
        VarRef {
            name: name.into(),
            bound: true,
        }
    }

    /// Reference to be checked by the integrity pass.
    pub fn unbound(name: impl Into<String>) -> Self {
        VarRef {
            name: name.into(),
            bound: false,
        }
    }

    pub fn bind(&mut self) {
        self.bound = true;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn get(&self, vars: &Variables) -> Result<i32, ModelError> {
        self.check()?;
        vars.get(&self.name)
            .copied()
            .ok_or_else(|| deleted(&self.name))
    }

    pub fn get_mut<'a>(&self, vars: &'a mut Variables) -> Result<&'a mut i32, ModelError> {
        self.check()?;
        vars.get_mut(&self.name).ok_or_else(|| deleted(&self.name))
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.bound {
            Ok(())
        } else {
            Err(ModelError::Integrity(format!(
                "variable '{}' is not bound",
                self.name
            )))
        }
    }
}

fn deleted(name: &str) -> ModelError {
    ModelError::Integrity(format!("variable '{}' no longer exists", name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    Delete,
    Assign,
}

impl OpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Delete => "del",
            OpKind::Assign => "=",
        }
    }
}

/// Arithmetic or deletion applied to one variable each time its state runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub variable: VarRef,
    pub kind: OpKind,
    pub operand: i32,
}

impl Operation {
    pub fn run(&self, vars: &mut Variables) -> Result<(), ModelError> {
        match self.kind {
            OpKind::Add => {
                let v = self.variable.get_mut(vars)?;
                *v = v.wrapping_add(self.operand);
            }
            OpKind::Sub => {
                let v = self.variable.get_mut(vars)?;
                *v = v.wrapping_sub(self.operand);
            }
            OpKind::Assign => *self.variable.get_mut(vars)? = self.operand,
            OpKind::Delete => {
                self.variable.check()?;
                vars.remove(&self.variable.name)
                    .ok_or_else(|| deleted(&self.variable.name))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Over,
    Under,
    Equal,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Over => ">",
            Comparator::Under => "<",
            Comparator::Equal => "==",
        }
    }

    pub fn test(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Comparator::Over => lhs > rhs,
            Comparator::Under => lhs < rhs,
            Comparator::Equal => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Fires `times - 1` times in a row, then declines once and starts over.
    Loop {
        delay_us: u64,
        times: u32,
        counter: u32,
    },
    /// Compares a variable with a threshold; a default condition always fires.
    VarCondition {
        variable: Option<VarRef>,
        comparator: Option<Comparator>,
        threshold: i32,
        is_default: bool,
    },
    /// Always fires after waiting.
    Delay { delay_us: u64 },
}

/// Edge from a state to `dest_name`, guarded by its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub dest_name: String,
    /// Index into the model's state table once resolved.
    pub dest: Option<usize>,
    pub kind: TransitionKind,
}

impl Transition {
    pub fn new(dest_name: impl Into<String>, kind: TransitionKind) -> Self {
        Transition {
            dest_name: dest_name.into(),
            dest: None,
            kind,
        }
    }

    /// Evaluate the guard. Loop and delay transitions block for their delay.
    pub fn run(&mut self, vars: &Variables) -> Result<bool, ModelError> {
        match &mut self.kind {
            TransitionKind::Loop {
                delay_us,
                times,
                counter,
            } => {
                *counter += 1;
                if *counter == *times {
                    *counter = 0;
                    Ok(false)
                } else {
                    pause(*delay_us);
                    Ok(true)
                }
            }
            TransitionKind::VarCondition {
                variable,
                comparator,
                threshold,
                is_default,
            } => {
                if *is_default {
                    return Ok(true);
                }
                let variable = variable.as_ref().ok_or_else(|| {
                    ModelError::Integrity("condition is not bound to a variable".to_string())
                })?;
                let value = variable.get(vars)?;
                let comparator = comparator.ok_or_else(|| {
                    ModelError::Integrity(format!("condition on '{}' has no comparator", variable.name))
                })?;
                Ok(comparator.test(value, *threshold))
            }
            TransitionKind::Delay { delay_us } => {
                pause(*delay_us);
                Ok(true)
            }
        }
    }

    /// Name of the variable a condition reads, if any.
    pub fn variable_mut(&mut self) -> Option<&mut VarRef> {
        match &mut self.kind {
            TransitionKind::VarCondition {
                variable: Some(v), ..
            } => Some(v),
            _ => None,
        }
    }
}

fn pause(delay_us: u64) {
    if delay_us > 0 {
        thread::sleep(Duration::from_micros(delay_us));
    }
}

/// One node of the automaton.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub name: String,
    pub operations: Vec<Operation>,
    /// Indices into the model's message table, in declaration order.
    pub messages: Vec<usize>,
    pub transitions: Vec<Transition>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        State {
            name: name.into(),
            ..State::default()
        }
    }

    /// Run every operation in order. Stops at the first failure; earlier
    /// operations stay applied.
    pub fn run_operations(&self, vars: &mut Variables) -> Result<(), ModelError> {
        for op in &self.operations {
            op.run(vars)?;
        }
        Ok(())
    }

    /// Evaluate transitions in order and return the destination of the first
    /// one that fires.
    pub fn run_transitions(&mut self, vars: &Variables) -> Result<Option<usize>, ModelError> {
        for t in &mut self.transitions {
            if t.run(vars)? {
                let dest = t.dest.ok_or_else(|| {
                    ModelError::Integrity(format!(
                        "state '{}' has an unresolved transition to '{}'",
                        self.name, t.dest_name
                    ))
                })?;
                return Ok(Some(dest));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, i32)]) -> Variables {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn op(kind: OpKind, operand: i32) -> Operation {
        Operation {
            variable: VarRef::bound("X"),
            kind,
            operand,
        }
    }

    fn condition(comparator: Comparator, threshold: i32) -> Transition {
        let mut t = Transition::new(
            "B",
            TransitionKind::VarCondition {
                variable: Some(VarRef::bound("X")),
                comparator: Some(comparator),
                threshold,
                is_default: false,
            },
        );
        t.dest = Some(1);
        t
    }

    #[test]
    fn unbound_reference_becomes_bound() {
        let mut r = VarRef::unbound("X");
        assert!(!r.is_bound());
        assert!(r.get(&vars(&[("X", 1)])).unwrap_err().is_integrity());
        r.bind();
        assert!(r.is_bound());
        assert_eq!(r.get(&vars(&[("X", 1)])).expect("get"), 1);
    }

    #[test]
    fn operations_mutate_variable() {
        let mut v = vars(&[("X", 10)]);
        op(OpKind::Add, 5).run(&mut v).expect("add");
        assert_eq!(v["X"], 15);
        op(OpKind::Sub, 20).run(&mut v).expect("sub");
        assert_eq!(v["X"], -5);
        op(OpKind::Assign, 3).run(&mut v).expect("assign");
        assert_eq!(v["X"], 3);
        op(OpKind::Delete, 0).run(&mut v).expect("del");
        assert!(v.is_empty());
    }

    #[test]
    fn deleted_variable_fails_every_holder() {
        let mut v = vars(&[("X", 1)]);
        op(OpKind::Delete, 0).run(&mut v).expect("del");
        let err = op(OpKind::Add, 1).run(&mut v).unwrap_err();
        assert!(err.is_integrity());
        let err = condition(Comparator::Equal, 1).run(&v).unwrap_err();
        assert!(err.is_integrity());
        let err = op(OpKind::Delete, 0).run(&mut v).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn loop_declines_on_last_iteration_then_repeats() {
        let mut t = Transition::new(
            "A",
            TransitionKind::Loop {
                delay_us: 0,
                times: 3,
                counter: 0,
            },
        );
        let v = Variables::new();
        let runs: Vec<bool> = (0..6).map(|_| t.run(&v).expect("run")).collect();
        assert_eq!(runs, [true, true, false, true, true, false]);
    }

    #[test]
    fn loop_of_one_never_fires() {
        let mut t = Transition::new(
            "A",
            TransitionKind::Loop {
                delay_us: 0,
                times: 1,
                counter: 0,
            },
        );
        let v = Variables::new();
        assert!(!t.run(&v).expect("run"));
        assert!(!t.run(&v).expect("run"));
    }

    #[test]
    fn comparators() {
        let v = vars(&[("X", 5)]);
        assert!(condition(Comparator::Over, 4).run(&v).expect("run"));
        assert!(!condition(Comparator::Over, 5).run(&v).expect("run"));
        assert!(condition(Comparator::Under, 6).run(&v).expect("run"));
        assert!(condition(Comparator::Equal, 5).run(&v).expect("run"));
        assert!(!condition(Comparator::Equal, 4).run(&v).expect("run"));
    }

    #[test]
    fn default_condition_always_fires() {
        let mut t = Transition::new(
            "B",
            TransitionKind::VarCondition {
                variable: Some(VarRef::unbound("missing")),
                comparator: Some(Comparator::Equal),
                threshold: 1,
                is_default: true,
            },
        );
        for x in [-1, 0, 1, 1000] {
            assert!(t.run(&vars(&[("X", x)])).expect("run"));
        }
    }

    #[test]
    fn unbound_condition_is_integrity_error() {
        let mut t = Transition::new(
            "B",
            TransitionKind::VarCondition {
                variable: Some(VarRef::unbound("X")),
                comparator: Some(Comparator::Equal),
                threshold: 1,
                is_default: false,
            },
        );
        assert!(t.run(&vars(&[("X", 1)])).unwrap_err().is_integrity());
    }

    #[test]
    fn first_firing_transition_wins() {
        let mut s = State::new("A");
        s.transitions.push(condition(Comparator::Over, 100));
        let mut second = Transition::new("C", TransitionKind::Delay { delay_us: 0 });
        second.dest = Some(2);
        s.transitions.push(second);
        let mut third = Transition::new("D", TransitionKind::Delay { delay_us: 0 });
        third.dest = Some(3);
        s.transitions.push(third);
        assert_eq!(s.run_transitions(&vars(&[("X", 0)])).expect("run"), Some(2));
    }

    #[test]
    fn no_firing_transition_keeps_state() {
        let mut s = State::new("A");
        s.transitions.push(condition(Comparator::Over, 100));
        assert_eq!(s.run_transitions(&vars(&[("X", 0)])).expect("run"), None);
    }

    #[test]
    fn failing_operation_keeps_earlier_mutations() {
        let mut s = State::new("A");
        s.operations.push(op(OpKind::Add, 1));
        s.operations.push(Operation {
            variable: VarRef::bound("gone"),
            kind: OpKind::Add,
            operand: 1,
        });
        let mut v = vars(&[("X", 0)]);
        assert!(s.run_operations(&mut v).is_err());
        assert_eq!(v["X"], 1);
    }
}
