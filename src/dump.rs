//! Human-readable description of a loaded model (diagnostics only).

use crate::field::{Endianness, Field, FieldKind, SizeScope, SizeUnit, TimeFormat};
use crate::header::Header;
use crate::message::{FillPolicy, Message};
use crate::model::Model;
use crate::state::{Operation, State, Transition, TransitionKind};
use std::fmt::{self, Write as _};
use tracing::info;

fn flag(v: bool) -> &'static str {
    if v {
        "TRUE"
    } else {
        "FALSE"
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endianness = match self.endianness {
            Endianness::Little => "LE",
            Endianness::Big => "BE",
        };
        write!(
            f,
            "{} pos={} size={} endianness={} swap={} invert={}",
            self.name,
            self.pos,
            self.size,
            endianness,
            flag(self.swap_words),
            flag(self.invert_bits)
        )?;
        match &self.kind {
            FieldKind::Value => write!(f, " value={}", self.value),
            FieldKind::Id => write!(f, " id={}", self.value),
            FieldKind::Size { unit, scope } => {
                let unit = match unit {
                    SizeUnit::U8 => "U8",
                    SizeUnit::U16 => "U16",
                    SizeUnit::U32 => "U32",
                };
                let scope = match scope {
                    SizeScope::ExcludingHeader => "excluding header",
                    SizeScope::IncludingHeader => "including header",
                };
                write!(f, " size-of {} ({})", unit, scope)
            }
            FieldKind::Time { format } => {
                let format = match format {
                    TimeFormat::Milliseconds => "ms",
                    TimeFormat::Microseconds => "us",
                    TimeFormat::DianePacked => "DIANE",
                };
                write!(f, " time {}", format)
            }
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Header {} ({} bits)", self.name, self.bit_len())?;
        for field in self.fields() {
            writeln!(f, "    {}", field)?;
        }
        Ok(())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fill = match self.fill {
            FillPolicy::Zero => "zero",
            FillPolicy::Random => "random",
        };
        write!(
            f,
            "Message {} header={} size={} fill={} {}:{} -> {}:{}",
            self.name,
            self.header_name,
            self.payload_bytes,
            fill,
            self.route.src_ip,
            self.route.src_port,
            self.route.dst_ip,
            self.route.dst_port
        )?;
        if !self.route.interface.is_empty() {
            write!(f, " on {}", self.route.interface)?;
        }
        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.variable.name, self.kind.symbol(), self.operand)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Loop {
                delay_us,
                times,
                counter,
            } => write!(
                f,
                "loop -> {} times={} delay={}us counter={}",
                self.dest_name, times, delay_us, counter
            ),
            TransitionKind::VarCondition { is_default: true, .. } => {
                write!(f, "-> {} DEFAULT", self.dest_name)
            }
            TransitionKind::VarCondition {
                variable,
                comparator,
                threshold,
                ..
            } => write!(
                f,
                "-> {} if {} {} {}",
                self.dest_name,
                variable.as_ref().map_or("?", |v| v.name.as_str()),
                comparator.map_or("?", |c| c.symbol()),
                threshold
            ),
            TransitionKind::Delay { delay_us } => {
                write!(f, "-> {} after {}us", self.dest_name, delay_us)
            }
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State {}", self.name)?;
        for op in &self.operations {
            writeln!(f, "    op {}", op)?;
        }
        if !self.messages.is_empty() {
            let ids: Vec<String> = self.messages.iter().map(|m| m.to_string()).collect();
            writeln!(f, "    messages #{}", ids.join(", #"))?;
        }
        for t in &self.transitions {
            writeln!(f, "    {}", t)?;
        }
        Ok(())
    }
}

impl Model {
    /// Sectioned text dump of every table.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.status.as_str());
        if let Some(path) = &self.source {
            let _ = writeln!(out, "Source: {}", path.display());
        }

        let _ = writeln!(out, "----- Variables ({}) -----", self.variables.len());
        for (name, value) in &self.variables {
            let _ = writeln!(out, "{} = {}", name, value);
        }

        let _ = writeln!(out, "----- Messages ({}) -----", self.messages.len());
        for (i, m) in self.messages.iter().enumerate() {
            let _ = writeln!(out, "#{} {}", i, m);
        }

        let _ = writeln!(out, "----- Headers ({}) -----", self.headers.len());
        for h in &self.headers {
            let _ = write!(out, "{}", h);
        }

        let _ = writeln!(out, "----- States ({}) -----", self.states.len());
        for s in &self.states {
            let _ = write!(out, "{}", s);
        }
        if let Some(next) = self.next_state_name() {
            let _ = writeln!(out, "Next state: {}", next);
        }
        out
    }

    /// Emit [`Model::describe`] at info level.
    pub fn log(&self) {
        for line in self.describe().lines() {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Comparator, OpKind, VarRef};

    #[test]
    fn transition_descriptions() {
        let cond = Transition::new(
            "B",
            TransitionKind::VarCondition {
                variable: Some(VarRef::bound("X")),
                comparator: Some(Comparator::Over),
                threshold: 4,
                is_default: false,
            },
        );
        assert_eq!(cond.to_string(), "-> B if X > 4");
        let default = Transition::new(
            "C",
            TransitionKind::VarCondition {
                variable: None,
                comparator: None,
                threshold: 1,
                is_default: true,
            },
        );
        assert_eq!(default.to_string(), "-> C DEFAULT");
        let op = Operation {
            variable: VarRef::bound("Y"),
            kind: OpKind::Delete,
            operand: 0,
        };
        assert_eq!(op.to_string(), "Y del 0");
    }

    #[test]
    fn describe_lists_every_section() {
        let mut m = Model::new();
        m.load_str(
            r#"<Conf>
                 <Variables><Variable name="X" init="3"/></Variables>
                 <States><State name="A"/></States>
               </Conf>"#,
        )
        .expect("load");
        let text = m.describe();
        assert!(text.contains("Model initialized"));
        assert!(text.contains("X = 3"));
        assert!(text.contains("----- Headers (0) -----"));
        assert!(text.contains("State A"));
        assert!(text.contains("Next state: A"));
    }
}
