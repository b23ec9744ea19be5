//! # modgen: binary protocol message generator
//!
//! A declarative configuration describes variables, bit-level headers,
//! messages and a finite-state automaton. Each tick the automaton's current
//! state emits its messages as byte buffers, mutates variables and picks the
//! next state.
//!
//! ## Configuration structure
//!
//! - **Variables**: named 32-bit signed integers with an initial value
//! - **Messages**: a header reference, payload size, fill policy and routing metadata
//! - **Headers**: fields placed at absolute bit offsets
//!   (`Field`, `Field_size`, `Field_time`, `Field_id`)
//! - **States**: operations on variables, emitted messages, guarded transitions
//!   (`Loop`, `Transit` with `Condition` or `Delay`)
//!
//! ## Example configuration
//!
//! ```text
//! <Conf>
//!   <Variables><Variable name="X" init="0"/></Variables>
//!   <Messages>
//!     <Message name="M" header="H" size="10" ip_src="127.0.0.1" ip_dst="127.0.0.1"
//!              port_src="1111" port_dst="2222" fill="MESG_FILL_ZERO"/>
//!   </Messages>
//!   <Headers>
//!     <Header name="H">
//!       <Field name="tag" pos="0" size="8" value="16" endianness="LE" swap="FALSE" invert="FALSE"/>
//!       <Field_size name="len" pos="8" size="8" endianness="LE" swap="FALSE" invert="FALSE"
//!                   format="SIZE_FORMAT_U8" part="SIZE_EXCLUDING_HEADER"/>
//!     </Header>
//!   </Headers>
//!   <States>
//!     <State name="A">
//!       <Operations><Op var="X" operande="+" value="1"/></Operations>
//!       <State_messages><State_mesg name="M"/></State_messages>
//!       <Transitions><Loop times="3" delay="1000"/></Transitions>
//!     </State>
//!   </States>
//! </Conf>
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! let mut model = modgen::Model::new();
//! model.setup("Conf/conf_test.xml")?;
//! loop {
//!     let out = model.tick()?;
//!     println!("{}: {} message(s)", out.state, out.messages.len());
//! }
//! # Ok::<(), modgen::ModelError>(())
//! ```

pub mod builder;
pub mod clock;
pub mod dump;
pub mod error;
pub mod executor;
pub mod field;
pub mod header;
pub mod message;
pub mod model;
pub mod parser;
pub mod state;
pub mod tree;

pub use clock::{diane_now, diane_value, Clock, DianeTime, FixedClock, SystemClock};
pub use error::ModelError;
pub use executor::TickOutput;
pub use field::{format_bits, Endianness, Field, FieldKind, SizeScope, SizeUnit, TimeFormat};
pub use header::Header;
pub use message::{FillPolicy, Message, Route};
pub use model::{Model, ModelStatus};
pub use parser::{parse, parse_file};
pub use state::{Comparator, OpKind, Operation, State, Transition, TransitionKind, VarRef, Variables};
pub use tree::Node;
