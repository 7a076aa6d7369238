//! End-to-end scenarios exercising graph construction through VHDL emission.

use hwir::backend::vhdl;
use hwir::pool::{intl, ComponentPool, LiteralValue};
use hwir::{bit, field, integer, record, vector, Component, Direction, EndpointId, Op, Pools};

#[test]
fn plain_vector_port_with_generic_width() {
    let mut pools = Pools::new();
    let mut comp = Component::new("simple");
    let default = pools.literals.intern(LiteralValue::Int(8));
    let vec_width = comp.parameter(&mut pools, "vec_width", integer(), default).unwrap();
    let eight = intl(&mut pools, 8);
    comp.port("static_vec", vector("v", eight), Direction::In).unwrap();
    comp.port("param_vec", vector("v", EndpointId::Local(vec_width)), Direction::In).unwrap();

    let components = ComponentPool::new();
    let text = vhdl::emit_component(&comp, &mut pools, &components).unwrap();

    assert!(text.contains("VEC_WIDTH : integer := 8"));
    assert!(text.contains("STATIC_VEC : in std_logic_vector(7 downto 0)"));
    assert!(text.contains("PARAM_VEC : in std_logic_vector(VEC_WIDTH-1 downto 0)"));
    let arch_begin = text.find("begin").unwrap();
    let arch_end = text.find("end architecture").unwrap();
    assert!(text[arch_begin..arch_end].trim() == "begin");
}

#[test]
fn port_to_port_across_instances() {
    let mut pools = Pools::new();
    let mut comp_a = Component::new("comp_a");
    comp_a.port("a", bit(), Direction::In).unwrap();
    let mut comp_b = Component::new("comp_b");
    comp_b.port("b", bit(), Direction::Out).unwrap();

    let mut top = Component::new("top");
    let ia = top.instantiate(&mut pools, &mut comp_a, None).unwrap();
    let ib = top.instantiate(&mut pools, &mut comp_b, None).unwrap();
    let a_port = top.instance(ia).unwrap().ap("a").unwrap();
    let b_port = top.instance(ib).unwrap().ap("b").unwrap();
    top.connect(&mut pools, EndpointId::Local(a_port), EndpointId::Local(b_port)).unwrap();

    let mut components = ComponentPool::new();
    components.add(comp_a).unwrap();
    components.add(comp_b).unwrap();
    let text = vhdl::emit_component(&top, &mut pools, &components).unwrap();

    assert!(text.contains("signal COMP_A_INST_A : std_logic;"));
    assert!(text.contains("signal COMP_B_INST_B : std_logic;"));
    assert!(text.contains("COMP_A_INST_A <= COMP_B_INST_B;"));
    assert_eq!(text.matches("component ").count(), 2);
}

#[test]
fn record_handshake_reverses_ready_relative_to_valid() {
    let mut pools = Pools::new();
    let width = intl(&mut pools, 8);
    let handshake = record(
        "handshake",
        vec![field("valid", bit()), field("ready", bit()).reversed(true), field("data", vector("v", width))],
    )
    .unwrap();

    let mut producer = Component::new("producer");
    producer.port("p", handshake.clone(), Direction::Out).unwrap();
    let mut consumer = Component::new("consumer");
    consumer.port("p", handshake, Direction::In).unwrap();

    let mut top = Component::new("top");
    let pi = top.instantiate(&mut pools, &mut producer, Some("pi")).unwrap();
    let ci = top.instantiate(&mut pools, &mut consumer, Some("ci")).unwrap();
    let p_port = top.instance(pi).unwrap().ap("p").unwrap();
    let c_port = top.instance(ci).unwrap().ap("p").unwrap();
    top.connect(&mut pools, EndpointId::Local(c_port), EndpointId::Local(p_port)).unwrap();

    let mut components = ComponentPool::new();
    components.add(producer).unwrap();
    components.add(consumer).unwrap();
    let text = vhdl::emit_component(&top, &mut pools, &components).unwrap();

    assert!(text.contains("CI_P_VALID <= PI_P_VALID;"));
    assert!(text.contains("PI_P_READY <= CI_P_READY;"));
    assert!(text.contains("CI_P_DATA <= PI_P_DATA;"));
}

#[test]
fn parameter_propagates_through_instantiation() {
    let mut pools = Pools::new();
    let mut child = Component::new("child");
    let child_default = pools.literals.intern(LiteralValue::Int(8));
    let width = child.parameter(&mut pools, "width", integer(), child_default).unwrap();
    child.port("prt", vector("v", EndpointId::Local(width)), Direction::Out).unwrap();

    let mut parent = Component::new("top");
    let top_default = pools.literals.intern(LiteralValue::Int(16));
    let top_width = parent.parameter(&mut pools, "top_width", integer(), top_default).unwrap();
    let xi = parent.instantiate(&mut pools, &mut child, Some("xi")).unwrap();
    let inst_width = parent.instance(xi).unwrap().aparam("width").unwrap();
    parent.connect(&mut pools, EndpointId::Local(inst_width), EndpointId::Local(top_width)).unwrap();

    let mut components = ComponentPool::new();
    components.add(child).unwrap();
    let text = vhdl::emit_component(&parent, &mut pools, &components).unwrap();

    assert!(text.contains("WIDTH : integer"));
    assert!(text.contains("WIDTH => TOP_WIDTH"));
    assert!(text.contains("signal XI_PRT : std_logic_vector(TOP_WIDTH-1 downto 0);"));
}

#[test]
fn same_component_instantiated_twice_in_one_parent() {
    let mut pools = Pools::new();
    let mut buf = Component::new("buf");
    buf.port("p", bit(), Direction::In).unwrap();

    let mut top = Component::new("top");
    let i1 = top.instantiate(&mut pools, &mut buf, Some("i1")).unwrap();
    let i2 = top.instantiate(&mut pools, &mut buf, Some("i2")).unwrap();
    assert_ne!(top.instance(i1).unwrap().ap("p").unwrap(), top.instance(i2).unwrap().ap("p").unwrap());

    let mut components = ComponentPool::new();
    components.add(buf).unwrap();
    let text = vhdl::emit_component(&top, &mut pools, &components).unwrap();

    assert!(text.contains("signal I1_P : std_logic;"));
    assert!(text.contains("signal I2_P : std_logic;"));
    assert_eq!(text.matches("component BUF").count(), 1);
    assert_eq!(text.matches(": BUF\n").count(), 2);
}

#[test]
fn port_array_with_expression_generic_index() {
    let mut pools = Pools::new();
    let mut child = Component::new("child");
    let child_width_default = pools.literals.intern(LiteralValue::Int(2));
    let child_width = child.parameter(&mut pools, "child_width", integer(), child_width_default).unwrap();
    let size_default = pools.literals.intern(LiteralValue::Int(0));
    let size = child.parameter(&mut pools, "size", integer(), size_default).unwrap();
    child
        .port_array("arr", vector("v", EndpointId::Local(child_width)), Direction::In, EndpointId::Local(size))
        .unwrap();

    let mut parent = Component::new("top");
    let top_width_default = pools.literals.intern(LiteralValue::Int(8));
    let top_width = parent.parameter(&mut pools, "top_width", integer(), top_width_default).unwrap();
    let a = parent.port("a", vector("v", EndpointId::Local(top_width)), Direction::In).unwrap();
    let b = parent.port("b", vector("v", EndpointId::Local(top_width)), Direction::In).unwrap();

    let ci = parent.instantiate(&mut pools, &mut child, Some("child_inst")).unwrap();
    let inst_child_width = parent.instance(ci).unwrap().aparam("child_width").unwrap();
    parent.connect(&mut pools, EndpointId::Local(inst_child_width), EndpointId::Local(top_width)).unwrap();

    let arr_id = parent.instance(ci).unwrap().aarr("arr").unwrap();
    let c0 = parent.array_append(&mut pools, arr_id, true).unwrap();
    parent.connect(&mut pools, EndpointId::Local(c0), EndpointId::Local(a)).unwrap();
    let c1 = parent.array_append(&mut pools, arr_id, true).unwrap();
    parent.connect(&mut pools, EndpointId::Local(c1), EndpointId::Local(b)).unwrap();

    let mut components = ComponentPool::new();
    components.add(child).unwrap();
    let text = vhdl::emit_component(&parent, &mut pools, &components).unwrap();

    assert!(text.contains("signal CHILD_INST_ARR : std_logic_vector(2*TOP_WIDTH-1 downto 0);"));
    assert!(text.contains("SIZE => 2"));
    assert!(text.contains("CHILD_WIDTH => TOP_WIDTH"));
    assert!(text.contains("CHILD_INST_ARR(TOP_WIDTH-1 downto 0) <= A;"));
    assert!(text.contains("CHILD_INST_ARR(2*TOP_WIDTH-1 downto TOP_WIDTH) <= B;"));
}

#[test]
fn expression_minimization_cancels_and_identities() {
    let mut pools = Pools::new();
    let mut comp = Component::new("exprs");
    let default = pools.literals.intern(LiteralValue::Int(3));
    let x = comp.parameter(&mut pools, "x", integer(), default).unwrap();
    let one = intl(&mut pools, 1);

    let add = comp.expr(Op::Add, EndpointId::Local(x), one).unwrap();
    let sub = comp.expr(Op::Sub, EndpointId::Local(add), one).unwrap();
    let minimized = comp.minimize(&mut pools, EndpointId::Local(sub)).unwrap();
    assert_eq!(minimized, EndpointId::Local(x));

    let twice = comp.minimize(&mut pools, minimized).unwrap();
    assert_eq!(twice, minimized);

    let zero = intl(&mut pools, 0);
    let zero_mul = comp.expr(Op::Mul, zero, EndpointId::Local(x)).unwrap();
    let minimized_zero = comp.minimize(&mut pools, EndpointId::Local(zero_mul)).unwrap();
    assert_eq!(minimized_zero, zero);

    let five = intl(&mut pools, 5);
    let div_by_zero = comp.expr(Op::Div, five, zero).unwrap();
    let err = comp.minimize(&mut pools, EndpointId::Local(div_by_zero)).unwrap_err();
    assert!(matches!(err, hwir::Error::DivisionByZero(_)));
}
