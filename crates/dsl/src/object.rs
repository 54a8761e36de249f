//! Object handles over the flat key namespace
//!
//! An object at key `K` is laid out across derived keys:
//!
//! - `K` — existence marker (`none` once deleted)
//! - `K/$fields` — comma-joined field names
//! - `K/$indices` — comma-joined index names
//! - `K/<field>` — field value
//! - `K/<idx>/$addresses` — comma-joined addresses of an index
//! - `K/<idx>/<addr>` — indexed value
//!
//! The handle emits expressions only; nothing reads the store on the host.
//! Field and index bookkeeping (`register_name`) is itself an expression, so
//! membership checks happen transactionally at run time.

use trellis_core::{validate_user_key, Txn, TxResult};

use crate::program::{concat, Program};

/// List of field names of an object, under `K/$fields`.
pub const FIELDS_MARKER: &str = "$fields";

/// List of index names of an object, under `K/$indices`.
pub const INDICES_MARKER: &str = "$indices";

/// Address list of an index, under `K/<idx>/$addresses`.
pub const ADDRESSES_MARKER: &str = "$addresses";

/// A handle to an object bound to a literal or computed key.
#[derive(Clone)]
pub struct Object {
    key: Txn,
}

/// Select an object by validated literal key.
pub fn select(key: &str) -> TxResult<Object> {
    validate_user_key(key)?;
    Ok(Object { key: Txn::text(key) })
}

/// Select an object whose key is computed at run time (for example a
/// `load` of a variable holding the key).
pub fn select_expr(key: impl Into<Txn>) -> Object {
    Object { key: key.into() }
}

impl Object {
    /// The object's key expression.
    pub fn key(&self) -> &Txn {
        &self.key
    }

    fn derived(&self, suffix: Txn) -> Txn {
        concat([self.key.clone(), Txn::text("/"), suffix])
    }

    fn fields_key(&self) -> Txn {
        self.derived(Txn::text(FIELDS_MARKER))
    }

    fn indices_key(&self) -> Txn {
        self.derived(Txn::text(INDICES_MARKER))
    }

    /// Key of a field value.
    pub fn field_key(&self, field: &str) -> Txn {
        self.derived(Txn::text(field))
    }

    /// Whether the object exists: its marker key holds a non-`none` value.
    pub fn exists(&self) -> Txn {
        Txn::negate(Txn::equal(Txn::read(self.key.clone()), Txn::none()))
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> Txn {
        Txn::read(self.field_key(field))
    }

    /// Write a field, creating the object and registering the field name
    /// exactly once.
    pub fn set(&self, p: &mut Program, field: &str, value: impl Into<Txn>) -> TxResult<()> {
        validate_user_key(field)?;
        p.push(Txn::write(self.key.clone(), Txn::flag(true)));
        register_name(p, self.fields_key(), Txn::text(field));
        p.push(Txn::write(self.field_key(field), value));
        Ok(())
    }

    /// A handle to one of the object's indexes.
    pub fn index(&self, name: &str) -> TxResult<Index> {
        validate_user_key(name)?;
        Ok(Index {
            object_key: self.key.clone(),
            indices_key: self.indices_key(),
            name: name.to_string(),
        })
    }

    /// Delete the object: blank every field, every index entry, both
    /// bookkeeping lists, and the existence marker. Entirely expression
    /// level — the field and address lists are walked at run time.
    pub fn delete(&self, p: &mut Program) {
        let key = self.key.clone();

        let field = p.scratch();
        p.each_item(Txn::read(self.fields_key()), &field, |p| {
            p.push(Txn::write(
                concat([key.clone(), Txn::text("/"), Txn::load(field.as_str())]),
                Txn::none(),
            ));
        });
        p.release(1);

        let idx = p.scratch();
        let addr = p.scratch();
        p.each_item(Txn::read(self.indices_key()), &idx, |p| {
            let idx_base = concat([key.clone(), Txn::text("/"), Txn::load(idx.as_str())]);
            let addrs_key = concat([idx_base.clone(), Txn::text("/"), Txn::text(ADDRESSES_MARKER)]);
            p.each_item(Txn::read(addrs_key.clone()), &addr, |p| {
                p.push(Txn::write(
                    concat([idx_base.clone(), Txn::text("/"), Txn::load(addr.as_str())]),
                    Txn::none(),
                ));
            });
            p.push(Txn::write(addrs_key, Txn::none()));
        });
        p.release(2);

        p.push(Txn::write(self.fields_key(), Txn::none()));
        p.push(Txn::write(self.indices_key(), Txn::none()));
        p.push(Txn::write(self.key.clone(), Txn::none()));
    }

    /// Build the object's JSON rendering as a string expression:
    /// `{"key":"K","field":"value","idx":["v",...]}`.
    ///
    /// Nothing is read on the host; the returned expression is a `load` of
    /// the `$json` local the pushed statements assemble.
    pub fn stitch(&self, p: &mut Program) -> Txn {
        let key = self.key.clone();

        p.push(Txn::store(
            "$json",
            concat([Txn::text("{\"key\":\""), key.clone(), Txn::text("\"")]),
        ));

        let field = p.scratch();
        p.each_item(Txn::read(self.fields_key()), &field, |p| {
            let value = Txn::read(concat([
                key.clone(),
                Txn::text("/"),
                Txn::load(field.as_str()),
            ]));
            p.push(Txn::store(
                "$json",
                concat([
                    Txn::load("$json"),
                    Txn::text(",\""),
                    Txn::load(field.as_str()),
                    Txn::text("\":\""),
                    value,
                    Txn::text("\""),
                ]),
            ));
        });
        p.release(1);

        let idx = p.scratch();
        let addr = p.scratch();
        let first = p.scratch();
        p.each_item(Txn::read(self.indices_key()), &idx, |p| {
            let idx_base = concat([key.clone(), Txn::text("/"), Txn::load(idx.as_str())]);
            let addrs_key =
                concat([idx_base.clone(), Txn::text("/"), Txn::text(ADDRESSES_MARKER)]);
            p.push(Txn::store(
                "$json",
                concat([
                    Txn::load("$json"),
                    Txn::text(",\""),
                    Txn::load(idx.as_str()),
                    Txn::text("\":["),
                ]),
            ));
            p.push(Txn::store(first.as_str(), Txn::flag(true)));
            p.each_item(Txn::read(addrs_key), &addr, |p| {
                let value = Txn::read(concat([
                    idx_base.clone(),
                    Txn::text("/"),
                    Txn::load(addr.as_str()),
                ]));
                p.push(Txn::store(
                    "$json",
                    concat([
                        Txn::load("$json"),
                        Txn::branch(Txn::load(first.as_str()), Txn::text(""), Txn::text(",")),
                        Txn::text("\""),
                        value,
                        Txn::text("\""),
                    ]),
                ));
                p.push(Txn::store(first.as_str(), Txn::flag(false)));
            });
            p.push(Txn::store(
                "$json",
                concat([Txn::load("$json"), Txn::text("]")]),
            ));
        });
        p.release(3);

        p.push(Txn::store(
            "$json",
            concat([Txn::load("$json"), Txn::text("}")]),
        ));
        Txn::load("$json")
    }
}

/// A handle to one named index of an object.
#[derive(Clone)]
pub struct Index {
    object_key: Txn,
    indices_key: Txn,
    name: String,
}

impl Index {
    /// The index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key of the comma-joined address list: `K/<idx>/$addresses`.
    pub fn addresses_key(&self) -> Txn {
        concat([
            self.object_key.clone(),
            Txn::text("/"),
            Txn::text(&self.name),
            Txn::text("/"),
            Txn::text(ADDRESSES_MARKER),
        ])
    }

    /// Key of one entry: `K/<idx>/<addr>`.
    pub fn entry_key(&self, addr: impl Into<Txn>) -> Txn {
        concat([
            self.object_key.clone(),
            Txn::text("/"),
            Txn::text(&self.name),
            Txn::text("/"),
            addr.into(),
        ])
    }

    /// Read one entry.
    pub fn get(&self, addr: &str) -> Txn {
        Txn::read(self.entry_key(Txn::text(addr)))
    }

    /// Write an entry, registering the index on the object and the address
    /// in the index exactly once.
    pub fn add(&self, p: &mut Program, addr: &str, value: impl Into<Txn>) -> TxResult<()> {
        validate_user_key(addr)?;
        p.push(Txn::write(self.object_key.clone(), Txn::flag(true)));
        register_name(p, self.indices_key.clone(), Txn::text(&self.name));
        register_name(p, self.addresses_key(), Txn::text(addr));
        p.push(Txn::write(self.entry_key(Txn::text(addr)), value));
        Ok(())
    }
}

/// Append `name` to the comma-joined list at `list_key` unless it is
/// already a member. Membership is decided at run time by the emitted
/// expression, so concurrent registrations stay transactional.
fn register_name(p: &mut Program, list_key: Txn, name: Txn) {
    let cur = p.scratch();
    p.push(Txn::store(
        cur.as_str(),
        Txn::add(Txn::read(list_key.clone()), Txn::text("")),
    ));

    // wrap both sides in commas so "x" never matches "xy"
    let listed = Txn::contains(
        concat([Txn::text(","), Txn::load(cur.as_str()), Txn::text(",")]),
        concat([Txn::text(","), name.clone(), Txn::text(",")]),
    );
    let appended = Txn::branch(
        Txn::equal(Txn::load(cur.as_str()), Txn::text("")),
        name.clone(),
        concat([Txn::load(cur.as_str()), Txn::text(","), name]),
    );
    p.push(Txn::branch(listed, Txn::none(), Txn::write(list_key, appended)));
    p.release(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Literal;
    use trellis_engine::{Database, MemoryBackend};

    fn run(p: Program) -> (Literal, Database<MemoryBackend>) {
        let db = Database::new(MemoryBackend::new());
        let out = db.execute(&p.finish()).unwrap();
        (out, db)
    }

    #[test]
    fn test_select_validates_the_key() {
        assert!(select("ok").is_ok());
        assert!(select("").is_err());
        assert!(select("a/b").is_err());
        assert!(select("a,b").is_err());
    }

    #[test]
    fn test_set_writes_value_marker_and_fields_list() {
        let mut p = Program::new();
        let obj = select("user").unwrap();
        obj.set(&mut p, "name", Txn::text("ada")).unwrap();
        let (_, db) = run(p);

        assert_eq!(db.backend().revision("user").value, Literal::Flag(true));
        assert_eq!(db.backend().revision("user/name").value, Literal::text("ada"));
        assert_eq!(
            db.backend().revision("user/$fields").value,
            Literal::text("name")
        );
    }

    #[test]
    fn test_fields_register_once() {
        let mut p = Program::new();
        let obj = select("user").unwrap();
        obj.set(&mut p, "name", Txn::text("ada")).unwrap();
        obj.set(&mut p, "age", 36.0).unwrap();
        obj.set(&mut p, "name", Txn::text("grace")).unwrap();
        let (_, db) = run(p);

        assert_eq!(
            db.backend().revision("user/$fields").value,
            Literal::text("name,age")
        );
        assert_eq!(
            db.backend().revision("user/name").value,
            Literal::text("grace")
        );
    }

    #[test]
    fn test_register_does_not_match_name_prefixes() {
        let mut p = Program::new();
        let obj = select("o").unwrap();
        obj.set(&mut p, "ab", 1.0).unwrap();
        obj.set(&mut p, "a", 2.0).unwrap();
        let (_, db) = run(p);
        assert_eq!(
            db.backend().revision("o/$fields").value,
            Literal::text("ab,a")
        );
    }

    #[test]
    fn test_exists_tracks_marker() {
        let obj = select("thing").unwrap();

        let mut p = Program::new();
        p.ret(obj.exists());
        let db = Database::new(MemoryBackend::new());
        assert_eq!(db.execute(&p.finish()).unwrap(), Literal::Flag(false));

        let mut p = Program::new();
        obj.set(&mut p, "f", 1.0).unwrap();
        p.ret(obj.exists());
        assert_eq!(db.execute(&p.finish()).unwrap(), Literal::Flag(true));
    }

    #[test]
    fn test_index_add_registers_everything() {
        let mut p = Program::new();
        let obj = select("doc").unwrap();
        let tags = obj.index("tags").unwrap();
        tags.add(&mut p, "t1", Txn::text("red")).unwrap();
        tags.add(&mut p, "t2", Txn::text("blue")).unwrap();
        let (_, db) = run(p);

        assert_eq!(
            db.backend().revision("doc/$indices").value,
            Literal::text("tags")
        );
        assert_eq!(
            db.backend().revision("doc/tags/$addresses").value,
            Literal::text("t1,t2")
        );
        assert_eq!(
            db.backend().revision("doc/tags/t1").value,
            Literal::text("red")
        );
    }

    #[test]
    fn test_delete_blanks_the_whole_layout() {
        let obj = select("doc").unwrap();
        let db = Database::new(MemoryBackend::new());

        let mut p = Program::new();
        obj.set(&mut p, "title", Txn::text("T")).unwrap();
        let tags = obj.index("tags").unwrap();
        tags.add(&mut p, "t1", Txn::text("red")).unwrap();
        db.execute(&p.finish()).unwrap();

        let mut p = Program::new();
        obj.delete(&mut p);
        db.execute(&p.finish()).unwrap();

        for key in [
            "doc",
            "doc/title",
            "doc/$fields",
            "doc/$indices",
            "doc/tags/$addresses",
            "doc/tags/t1",
        ] {
            assert!(
                db.backend().revision(key).value.is_none(),
                "{} should be blanked",
                key
            );
        }

        let mut p = Program::new();
        p.ret(obj.exists());
        assert_eq!(db.execute(&p.finish()).unwrap(), Literal::Flag(false));
    }

    #[test]
    fn test_stitch_builds_json() {
        let obj = select("doc").unwrap();
        let db = Database::new(MemoryBackend::new());

        let mut p = Program::new();
        obj.set(&mut p, "title", Txn::text("T")).unwrap();
        obj.set(&mut p, "n", 2.0).unwrap();
        let tags = obj.index("tags").unwrap();
        tags.add(&mut p, "t1", Txn::text("red")).unwrap();
        tags.add(&mut p, "t2", Txn::text("blue")).unwrap();
        db.execute(&p.finish()).unwrap();

        let mut p = Program::new();
        let json = obj.stitch(&mut p);
        p.ret(json);
        let out = db.execute(&p.finish()).unwrap();
        assert_eq!(
            out,
            Literal::text(
                "{\"key\":\"doc\",\"title\":\"T\",\"n\":\"2.0\",\"tags\":[\"red\",\"blue\"]}"
            )
        );
    }

    #[test]
    fn test_stitch_of_bare_object() {
        let obj = select("empty").unwrap();
        let db = Database::new(MemoryBackend::new());

        let mut p = Program::new();
        let json = obj.stitch(&mut p);
        p.ret(json);
        let out = db.execute(&p.finish()).unwrap();
        assert_eq!(out, Literal::text("{\"key\":\"empty\"}"));
    }

    #[test]
    fn test_select_expr_binds_a_computed_key() {
        let db = Database::new(MemoryBackend::new());

        let mut p = Program::new();
        p.push(Txn::store("which", Txn::text("target")));
        let obj = select_expr(Txn::load("which"));
        obj.set(&mut p, "v", 9.0).unwrap();
        db.execute(&p.finish()).unwrap();

        assert_eq!(db.backend().revision("target/v").value, Literal::Real(9.0));
    }
}
