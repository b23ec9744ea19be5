//! Build a [`Model`] from an attribute tree.
//!
//! Sections are read in a fixed order: variables, messages, headers, states.
//! References are resolved in two tiers:
//!
//! - eagerly while parsing a state: an operation's variable and a state's
//!   messages must already be declared;
//! - after every state is read: transition destinations, condition variables
//!   and message headers may be declared anywhere in the source.

use crate::error::{parse_flag, parse_int, ModelError};
use crate::field::{Endianness, Field, FieldKind, SizeScope, SizeUnit, TimeFormat};
use crate::header::Header;
use crate::message::{FillPolicy, Message, Route};
use crate::model::{Model, ModelStatus};
use crate::parser;
use crate::state::{
    Comparator, OpKind, Operation, State, Transition, TransitionKind, VarRef, Variables,
};
use crate::tree::Node;
use std::path::Path;
use tracing::{debug, error};

pub const ROOT_TAG: &str = "Conf";
pub const VARIABLES_TAG: &str = "Variables";
pub const MESSAGES_TAG: &str = "Messages";
pub const HEADERS_TAG: &str = "Headers";
pub const STATES_TAG: &str = "States";

impl Model {
    /// Load the configuration file at `path`, replacing any previous content.
    pub fn setup(&mut self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        self.status = ModelStatus::NotInitialized;
        self.clear();
        self.source = Some(path.to_path_buf());
        debug!(path = %path.display(), "configuration file set");
        let root = parser::parse_file(path).map_err(|e| {
            error!(error = %e, "configuration file parsing failed");
            e
        })?;
        self.load(&root)
    }

    /// Load configuration markup held in memory.
    pub fn load_str(&mut self, source: &str) -> Result<(), ModelError> {
        self.status = ModelStatus::NotInitialized;
        self.clear();
        let root = parser::parse(source).map_err(|e| {
            error!(error = %e, "configuration parsing failed");
            e
        })?;
        self.load(&root)
    }

    /// Populate the model from an already parsed tree. On failure every table
    /// is left empty.
    pub fn load(&mut self, root: &Node) -> Result<(), ModelError> {
        self.status = ModelStatus::NotInitialized;
        self.clear();
        match populate(self, root) {
            Ok(()) => {
                self.status = ModelStatus::Initialized;
                debug!(
                    variables = self.variables.len(),
                    headers = self.headers.len(),
                    messages = self.messages.len(),
                    states = self.states.len(),
                    "configuration parsed successfully"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "model load failed");
                self.clear();
                Err(e)
            }
        }
    }
}

fn populate(model: &mut Model, root: &Node) -> Result<(), ModelError> {
    if root.name != ROOT_TAG {
        return Err(ModelError::unknown_element("configuration", &root.name));
    }
    for section in root.children() {
        match section.name.as_str() {
            VARIABLES_TAG | MESSAGES_TAG | HEADERS_TAG | STATES_TAG => {}
            other => return Err(ModelError::unknown_element("configuration", other)),
        }
    }
    if let Some(n) = root.child(VARIABLES_TAG) {
        load_variables(model, n)?;
    }
    if let Some(n) = root.child(MESSAGES_TAG) {
        load_messages(model, n)?;
    }
    if let Some(n) = root.child(HEADERS_TAG) {
        load_headers(model, n)?;
    }
    if let Some(n) = root.child(STATES_TAG) {
        load_states(model, n)?;
    }
    check_integrity(model)
}

// ==================== Variables ====================

fn load_variables(model: &mut Model, section: &Node) -> Result<(), ModelError> {
    for node in section.children() {
        let mut name = String::new();
        let mut init = None;
        for (key, value) in node.attributes() {
            match key {
                "name" => name = value.to_string(),
                "init" => init = Some(parse_int::<i32>("variable", key, value)?),
                _ => return Err(ModelError::unknown_attribute("variable", key)),
            }
        }
        let init = match init {
            Some(v) if !name.is_empty() => v,
            _ => {
                return Err(ModelError::MissingParameter {
                    entity: "variable",
                    name,
                })
            }
        };
        if model.variables.contains_key(&name) {
            return Err(ModelError::Duplicate {
                entity: "variable",
                name,
            });
        }
        debug!(variable = %name, init, "added variable");
        model.variables.insert(name, init);
    }
    Ok(())
}

// ==================== Messages ====================

#[derive(Default)]
struct MessageDraft {
    name: String,
    header: String,
    size: u32,
    route: Route,
    fill: Option<FillPolicy>,
}

impl MessageDraft {
    const ENTITY: &'static str = "message";

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), ModelError> {
        match key {
            "name" => self.name = value.to_string(),
            "header" => self.header = value.to_string(),
            "size" => self.size = parse_int(Self::ENTITY, key, value)?,
            "ip_src" => self.route.src_ip = value.to_string(),
            "ip_dst" => self.route.dst_ip = value.to_string(),
            "port_src" => self.route.src_port = parse_int(Self::ENTITY, key, value)?,
            "port_dst" => self.route.dst_port = parse_int(Self::ENTITY, key, value)?,
            "interface" => self.route.interface = value.to_string(),
            "fill" => {
                self.fill = Some(match value {
                    "MESG_FILL_ZERO" => FillPolicy::Zero,
                    "MESG_FILL_RANDOM" => FillPolicy::Random,
                    _ => return Err(ModelError::invalid(Self::ENTITY, key, value)),
                })
            }
            _ => return Err(ModelError::unknown_attribute(Self::ENTITY, key)),
        }
        Ok(())
    }

    fn build(self) -> Result<Message, ModelError> {
        let complete = !self.name.is_empty()
            && !self.header.is_empty()
            && self.size != 0
            && self.route.src_port != 0
            && self.route.dst_port != 0
            && !self.route.src_ip.is_empty()
            && !self.route.dst_ip.is_empty();
        match self.fill {
            Some(fill) if complete => Ok(Message {
                name: self.name,
                header_name: self.header,
                header: None,
                payload_bytes: self.size,
                route: self.route,
                fill,
            }),
            _ => Err(ModelError::MissingParameter {
                entity: Self::ENTITY,
                name: self.name,
            }),
        }
    }
}

fn load_messages(model: &mut Model, section: &Node) -> Result<(), ModelError> {
    for node in section.children() {
        let mut draft = MessageDraft::default();
        for (key, value) in node.attributes() {
            draft.set_param(key, value)?;
        }
        let message = draft.build()?;
        if model.messages_by_name.contains_key(&message.name) {
            return Err(ModelError::Duplicate {
                entity: "message",
                name: message.name,
            });
        }
        debug!(message = %message.name, header = %message.header_name, "added message");
        model
            .messages_by_name
            .insert(message.name.clone(), model.messages.len());
        model.messages.push(message);
    }
    Ok(())
}

// ==================== Headers and fields ====================

/// Value of an id field declared without `value`: encodes as all ones.
const UNSET_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldTag {
    Value,
    Size,
    Time,
    Id,
}

impl FieldTag {
    fn from_tag(tag: &str) -> Result<Self, ModelError> {
        match tag {
            "Field" => Ok(FieldTag::Value),
            "Field_size" => Ok(FieldTag::Size),
            "Field_time" => Ok(FieldTag::Time),
            "Field_id" => Ok(FieldTag::Id),
            _ => Err(ModelError::unknown_element("header", tag)),
        }
    }
}

struct FieldDraft {
    tag: FieldTag,
    name: String,
    pos: Option<u32>,
    size: Option<u32>,
    value: Option<i64>,
    endianness: Option<Endianness>,
    swap_words: bool,
    invert_bits: bool,
    unit: Option<SizeUnit>,
    scope: Option<SizeScope>,
    time_format: Option<TimeFormat>,
}

impl FieldDraft {
    const ENTITY: &'static str = "field";

    fn new(tag: FieldTag) -> Self {
        FieldDraft {
            tag,
            name: String::new(),
            pos: None,
            size: None,
            value: None,
            endianness: None,
            swap_words: false,
            invert_bits: false,
            unit: None,
            scope: None,
            time_format: None,
        }
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), ModelError> {
        let e = Self::ENTITY;
        match (key, self.tag) {
            ("name", _) => self.name = value.to_string(),
            ("pos", _) => {
                let pos: i64 = parse_int(e, key, value)?;
                self.pos = Some(u32::try_from(pos).map_err(|_| ModelError::invalid(e, key, value))?);
            }
            ("size", _) => {
                let size: i64 = parse_int(e, key, value)?;
                if size <= 0 {
                    return Err(ModelError::invalid(e, key, value));
                }
                self.size = Some(u32::try_from(size).map_err(|_| ModelError::invalid(e, key, value))?);
            }
            ("value", FieldTag::Value | FieldTag::Size | FieldTag::Id) => {
                self.value = Some(parse_int(e, key, value)?)
            }
            ("endianness", _) => {
                self.endianness = Some(match value {
                    "LE" => Endianness::Little,
                    "BE" => Endianness::Big,
                    _ => return Err(ModelError::invalid(e, key, value)),
                })
            }
            ("swap", _) => self.swap_words = parse_flag(e, key, value)?,
            ("invert", _) => self.invert_bits = parse_flag(e, key, value)?,
            ("format", FieldTag::Size) => {
                self.unit = Some(match value {
                    "SIZE_FORMAT_U8" => SizeUnit::U8,
                    "SIZE_FORMAT_U16" => SizeUnit::U16,
                    "SIZE_FORMAT_U32" => SizeUnit::U32,
                    _ => return Err(ModelError::invalid(e, key, value)),
                })
            }
            ("format", FieldTag::Time) => {
                self.time_format = Some(match value {
                    "MILLISECONDS" => TimeFormat::Milliseconds,
                    "MICROSECONDS" => TimeFormat::Microseconds,
                    "HHR_DIANE" => TimeFormat::DianePacked,
                    _ => return Err(ModelError::invalid(e, key, value)),
                })
            }
            ("part", FieldTag::Size) => {
                self.scope = Some(match value {
                    "SIZE_EXCLUDING_HEADER" => SizeScope::ExcludingHeader,
                    "SIZE_INCLUDING_HEADER" => SizeScope::IncludingHeader,
                    _ => return Err(ModelError::invalid(e, key, value)),
                })
            }
            _ => return Err(ModelError::unknown_attribute(e, key)),
        }
        Ok(())
    }

    fn build(self) -> Result<Field, ModelError> {
        let missing = || ModelError::MissingParameter {
            entity: Self::ENTITY,
            name: self.name.clone(),
        };
        if self.name.is_empty() {
            return Err(missing());
        }
        let (Some(pos), Some(size), Some(endianness)) = (self.pos, self.size, self.endianness) else {
            return Err(missing());
        };
        if pos.checked_add(size).is_none() {
            return Err(ModelError::invalid(Self::ENTITY, "size", &size.to_string()));
        }
        let (kind, value) = match self.tag {
            FieldTag::Value => (FieldKind::Value, self.value.ok_or_else(missing)?),
            FieldTag::Id => (FieldKind::Id, self.value.unwrap_or(UNSET_ID)),
            FieldTag::Size => {
                let (Some(unit), Some(scope)) = (self.unit, self.scope) else {
                    return Err(missing());
                };
                (FieldKind::Size { unit, scope }, 0)
            }
            FieldTag::Time => {
                let format = self.time_format.ok_or_else(missing)?;
                (FieldKind::Time { format }, 0)
            }
        };
        Ok(Field {
            name: self.name,
            pos,
            size,
            value,
            endianness,
            swap_words: self.swap_words,
            invert_bits: self.invert_bits,
            kind,
        })
    }
}

fn build_field(node: &Node) -> Result<Field, ModelError> {
    let mut draft = FieldDraft::new(FieldTag::from_tag(&node.name)?);
    for (key, value) in node.attributes() {
        draft.set_param(key, value)?;
    }
    draft.build()
}

fn load_headers(model: &mut Model, section: &Node) -> Result<(), ModelError> {
    for node in section.children() {
        let mut header = Header::new(String::new());
        for (key, value) in node.attributes() {
            match key {
                "name" => header.name = value.to_string(),
                _ => return Err(ModelError::unknown_attribute("header", key)),
            }
        }
        for field_node in node.children() {
            header.add_field(build_field(field_node)?)?;
        }
        if header.name.is_empty() || header.is_empty() {
            return Err(ModelError::MissingParameter {
                entity: "header",
                name: header.name,
            });
        }
        if model.headers_by_name.contains_key(&header.name) {
            return Err(ModelError::Duplicate {
                entity: "header",
                name: header.name,
            });
        }
        debug!(header = %header.name, bits = header.bit_len(), "added header");
        model
            .headers_by_name
            .insert(header.name.clone(), model.headers.len());
        model.headers.push(header);
    }
    Ok(())
}

// ==================== States ====================

fn load_states(model: &mut Model, section: &Node) -> Result<(), ModelError> {
    for node in section.children() {
        if node.name != "State" {
            return Err(ModelError::unknown_element("states", &node.name));
        }
        let mut state = State::default();
        for (key, value) in node.attributes() {
            match key {
                "name" => state.name = value.to_string(),
                _ => return Err(ModelError::unknown_attribute("state", key)),
            }
        }
        if state.name.is_empty() {
            return Err(ModelError::MissingParameter {
                entity: "state",
                name: state.name,
            });
        }
        if model.states_by_name.contains_key(&state.name) {
            return Err(ModelError::Duplicate {
                entity: "state",
                name: state.name,
            });
        }

        for part in node.children() {
            match part.name.as_str() {
                "Operations" => {
                    for op in part.children() {
                        state.operations.push(build_operation(&model.variables, op)?);
                    }
                }
                "Transitions" => {
                    for t in part.children() {
                        state.transitions.push(build_transition(&state.name, t)?);
                    }
                }
                "State_messages" => {
                    for m in part.children() {
                        state.messages.push(resolve_state_message(model, m)?);
                    }
                }
                other => return Err(ModelError::unknown_element("state", other)),
            }
        }

        let index = model.states.len();
        debug!(
            state = %state.name,
            operations = state.operations.len(),
            messages = state.messages.len(),
            transitions = state.transitions.len(),
            "added state"
        );
        model.states_by_name.insert(state.name.clone(), index);
        model.states.push(state);
        if model.current.is_none() && model.next.is_none() {
            model.current = Some(index);
            model.next = Some(index);
        }
    }
    Ok(())
}

fn build_operation(vars: &Variables, node: &Node) -> Result<Operation, ModelError> {
    const ENTITY: &str = "operation";
    if node.name != "Op" {
        return Err(ModelError::unknown_element("operations", &node.name));
    }
    let mut variable = None;
    let mut kind = None;
    let mut operand = 0;
    for (key, value) in node.attributes() {
        match key {
            "var" => {
                if !vars.contains_key(value) {
                    return Err(ModelError::UnresolvedReference {
                        entity: "variable",
                        name: value.to_string(),
                    });
                }
                variable = Some(VarRef::bound(value));
            }
            "operande" => {
                kind = Some(match value {
                    "+" => OpKind::Add,
                    "-" => OpKind::Sub,
                    "del" => OpKind::Delete,
                    "=" => OpKind::Assign,
                    _ => return Err(ModelError::invalid(ENTITY, key, value)),
                })
            }
            "value" => operand = parse_int(ENTITY, key, value)?,
            _ => return Err(ModelError::unknown_attribute(ENTITY, key)),
        }
    }
    match (variable, kind) {
        (Some(variable), Some(kind)) => Ok(Operation {
            variable,
            kind,
            operand,
        }),
        (variable, _) => Err(ModelError::MissingParameter {
            entity: ENTITY,
            name: variable.map(|v| v.name).unwrap_or_default(),
        }),
    }
}

fn build_transition(owner: &str, node: &Node) -> Result<Transition, ModelError> {
    match node.name.as_str() {
        "Loop" => build_loop(owner, node),
        "Transit" => build_transit(node),
        other => Err(ModelError::unknown_element("transitions", other)),
    }
}

fn build_loop(owner: &str, node: &Node) -> Result<Transition, ModelError> {
    const ENTITY: &str = "loop transition";
    let mut dest = owner.to_string();
    let mut times = None;
    let mut delay_us = None;
    for (key, value) in node.attributes() {
        match key {
            "dest_state" => dest = value.to_string(),
            "times" => {
                let t: u32 = parse_int(ENTITY, key, value)?;
                if t == 0 {
                    return Err(ModelError::invalid(ENTITY, key, value));
                }
                times = Some(t);
            }
            "delay" => delay_us = Some(parse_int::<u64>(ENTITY, key, value)?),
            _ => return Err(ModelError::unknown_attribute(ENTITY, key)),
        }
    }
    match (times, delay_us) {
        (Some(times), Some(delay_us)) if !dest.is_empty() => Ok(Transition::new(
            dest,
            TransitionKind::Loop {
                delay_us,
                times,
                counter: 0,
            },
        )),
        _ => Err(ModelError::MissingParameter {
            entity: ENTITY,
            name: dest,
        }),
    }
}

fn build_transit(node: &Node) -> Result<Transition, ModelError> {
    let mut dest = String::new();
    for (key, value) in node.attributes() {
        match key {
            "dest_state" => dest = value.to_string(),
            _ => return Err(ModelError::unknown_attribute("transit", key)),
        }
    }
    let mut guards = node.children();
    let (Some(guard), None) = (guards.next(), guards.next()) else {
        return Err(ModelError::MissingParameter {
            entity: "transit (exactly one Condition or Delay)",
            name: dest,
        });
    };
    match guard.name.as_str() {
        "Condition" => build_condition(dest, guard),
        "Delay" => build_delay(dest, guard),
        other => Err(ModelError::unknown_element("transit", other)),
    }
}

fn build_condition(mut dest: String, node: &Node) -> Result<Transition, ModelError> {
    const ENTITY: &str = "condition";
    let mut name = String::new();
    let mut comparator = None;
    let mut threshold = None;
    let mut is_default = false;
    for (key, value) in node.attributes() {
        match key {
            "name" => name = value.to_string(),
            "operande" => {
                comparator = Some(match value {
                    ">" => Comparator::Over,
                    "<" => Comparator::Under,
                    "==" => Comparator::Equal,
                    _ => return Err(ModelError::invalid(ENTITY, key, value)),
                })
            }
            "value" if value == "DEFAULT" => {
                is_default = true;
                threshold = Some(1);
            }
            "value" => threshold = Some(parse_int::<i32>(ENTITY, key, value)?),
            "dest_state" => dest = value.to_string(),
            _ => return Err(ModelError::unknown_attribute(ENTITY, key)),
        }
    }
    let complete = is_default || (!name.is_empty() && comparator.is_some() && threshold.is_some());
    if dest.is_empty() || !complete {
        return Err(ModelError::MissingParameter {
            entity: ENTITY,
            name: dest,
        });
    }
    let variable = (!name.is_empty()).then(|| VarRef::unbound(name));
    Ok(Transition::new(
        dest,
        TransitionKind::VarCondition {
            variable,
            comparator,
            threshold: threshold.unwrap_or(1),
            is_default,
        },
    ))
}

fn build_delay(mut dest: String, node: &Node) -> Result<Transition, ModelError> {
    const ENTITY: &str = "delay";
    let mut delay_us = None;
    for (key, value) in node.attributes() {
        match key {
            "value" => delay_us = Some(parse_int::<u64>(ENTITY, key, value)?),
            "dest_state" => dest = value.to_string(),
            _ => return Err(ModelError::unknown_attribute(ENTITY, key)),
        }
    }
    match delay_us {
        Some(delay_us) if !dest.is_empty() => {
            Ok(Transition::new(dest, TransitionKind::Delay { delay_us }))
        }
        _ => Err(ModelError::MissingParameter {
            entity: ENTITY,
            name: dest,
        }),
    }
}

fn resolve_state_message(model: &Model, node: &Node) -> Result<usize, ModelError> {
    if node.name != "State_mesg" {
        return Err(ModelError::unknown_element("state messages", &node.name));
    }
    let mut index = None;
    for (key, value) in node.attributes() {
        match key {
            "name" => {
                let i = model.messages_by_name.get(value).copied().ok_or_else(|| {
                    ModelError::UnresolvedReference {
                        entity: "message",
                        name: value.to_string(),
                    }
                })?;
                index = Some(i);
            }
            _ => return Err(ModelError::unknown_attribute("state message", key)),
        }
    }
    index.ok_or_else(|| ModelError::MissingParameter {
        entity: "state message",
        name: String::new(),
    })
}

// ==================== Deferred integrity pass ====================

fn check_integrity(model: &mut Model) -> Result<(), ModelError> {
    for state in &mut model.states {
        for t in &mut state.transitions {
            let dest = model
                .states_by_name
                .get(&t.dest_name)
                .copied()
                .ok_or_else(|| {
                    ModelError::Integrity(format!(
                        "transition of state '{}' targets unknown state '{}'",
                        state.name, t.dest_name
                    ))
                })?;
            t.dest = Some(dest);
            if let Some(var) = t.variable_mut() {
                if !model.variables.contains_key(&var.name) {
                    return Err(ModelError::Integrity(format!(
                        "condition of state '{}' reads unknown variable '{}'",
                        state.name, var.name
                    )));
                }
                var.bind();
            }
        }
    }

    for message in &mut model.messages {
        let header = model
            .headers_by_name
            .get(&message.header_name)
            .copied()
            .ok_or_else(|| {
                ModelError::Integrity(format!(
                    "message '{}' references unknown header '{}'",
                    message.name, message.header_name
                ))
            })?;
        message.header = Some(header);
    }

    debug!("model integrity successfully checked");
    Ok(())
}
