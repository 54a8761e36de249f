//! Wire-to-execution pipeline: a program built on one host, serialized,
//! parsed elsewhere, and executed there.

use trellis::{parse, serialize, Database, Literal, MemoryBackend, Program, Txn};

#[test]
fn test_built_program_survives_the_wire() {
    let mut p = Program::new();
    p.push(Txn::write("greeting", Txn::add(Txn::text("hello "), Txn::read("name"))));
    p.ret(Txn::read("greeting"));
    let tx = p.finish();

    let encoded = serialize(&tx).unwrap();
    let decoded = parse(&encoded).unwrap();
    assert_eq!(decoded, tx);

    let db = Database::new(MemoryBackend::new());
    db.execute(&Txn::write("name", Txn::text("world"))).unwrap();
    let out = db.execute(&decoded).unwrap();
    assert_eq!(out, Literal::text("hello world"));
}

#[test]
fn test_roundtrip_is_identity_on_simplified_trees() {
    let trees = [
        Txn::write("k", Txn::add(Txn::read("k"), 1.0)),
        Txn::cons(
            Txn::store("i", 0.0),
            Txn::repeat(
                Txn::less(Txn::load("i"), 5.0),
                Txn::store("i", Txn::add(Txn::load("i"), 1.0)),
            ),
        ),
        Txn::branch(Txn::read("flag"), Txn::rollback(Txn::none()), Txn::write("ok", true)),
        Txn::matches(Txn::read("s"), Txn::text("^a+$")),
    ];
    for tx in &trees {
        let round = parse(&serialize(tx).unwrap()).unwrap();
        assert_eq!(&round, tx);
        // and a second pass changes nothing
        assert_eq!(parse(&serialize(&round).unwrap()).unwrap(), round);
    }
}
