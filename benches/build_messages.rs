//! Benchmark: header composition and full ticks over a small automaton.
//! `compose` encodes one header per iteration; `tick_*` run advance, read,
//! mutate and decide, with zero and random payload fill.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use modgen::{FixedClock, Model};

fn source(fill: &str) -> String {
    format!(
        r#"<Conf>
  <Variables><Variable name="X" init="0"/></Variables>
  <Messages>
    <Message name="M" header="H" size="512" ip_src="127.0.0.1" ip_dst="127.0.0.1"
             port_src="1111" port_dst="2222" fill="{fill}"/>
  </Messages>
  <Headers>
    <Header name="H">
      <Field name="tag" pos="0" size="8" value="16" endianness="LE" swap="FALSE" invert="FALSE"/>
      <Field name="kind" pos="8" size="3" value="5" endianness="LE" swap="FALSE" invert="TRUE"/>
      <Field name="word" pos="11" size="32" value="305419896" endianness="BE" swap="TRUE" invert="FALSE"/>
      <Field_time name="t" pos="43" size="48" endianness="LE" swap="FALSE" invert="FALSE" format="HHR_DIANE"/>
      <Field_size name="len" pos="91" size="16" endianness="LE" swap="FALSE" invert="FALSE"
                  format="SIZE_FORMAT_U16" part="SIZE_INCLUDING_HEADER"/>
    </Header>
  </Headers>
  <States>
    <State name="A">
      <Operations><Op var="X" operande="+" value="1"/></Operations>
      <State_messages><State_mesg name="M"/></State_messages>
      <Transitions>
        <Transit dest_state="B"><Condition name="X" operande="&gt;" value="10"/></Transit>
        <Loop times="4" delay="0"/>
      </Transitions>
    </State>
    <State name="B">
      <Operations><Op var="X" operande="=" value="0"/></Operations>
      <State_messages><State_mesg name="M"/><State_mesg name="M"/></State_messages>
      <Transitions><Transit dest_state="A"><Delay value="0"/></Transit></Transitions>
    </State>
  </States>
</Conf>"#
    )
}

fn loaded(fill: &str) -> Model {
    let mut model = Model::with_clock(Box::new(FixedClock(66_100_045)));
    model.reseed(1);
    model.load_str(&source(fill)).expect("load");
    model
}

fn bench_build_messages(c: &mut Criterion) {
    let model = loaded("MESG_FILL_ZERO");
    let header = model.header("H").expect("header");
    c.bench_function("compose_header", |b| {
        b.iter(|| black_box(header.compose(black_box(512), model.clock())))
    });

    let mut zero = loaded("MESG_FILL_ZERO");
    c.bench_function("tick_zero_fill", |b| {
        b.iter(|| black_box(zero.tick().expect("tick")))
    });

    let mut random = loaded("MESG_FILL_RANDOM");
    c.bench_function("tick_random_fill", |b| {
        b.iter(|| black_box(random.tick().expect("tick")))
    });

    c.bench_function("load_str", |b| {
        let src = source("MESG_FILL_ZERO");
        b.iter(|| {
            let mut m = Model::new();
            m.load_str(black_box(&src)).expect("load");
            black_box(m.states().len())
        })
    });
}

criterion_group!(benches, bench_build_messages);
criterion_main!(benches);
