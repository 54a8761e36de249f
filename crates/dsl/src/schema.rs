//! The schema wrapper: build once, execute with scheduled retries
//!
//! `Schema` pairs a backoff schedule with a program-building closure. The
//! program is built exactly once — the transaction is immutable — and then
//! handed to the database, which reruns it on commit conflicts and walks the
//! schedule on transient backend failures.

use trellis_core::{Literal, TxResult};
use trellis_engine::{Backend, Database, RetrySchedule};

use crate::program::Program;

/// A reusable build-and-execute wrapper.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    backoffs: RetrySchedule,
}

impl Schema {
    /// Wrap a backoff schedule for transient backend failures.
    pub fn new(backoffs: RetrySchedule) -> Self {
        Schema { backoffs }
    }

    /// Build a program and execute it.
    ///
    /// The closure may fail (key validation); build failures surface before
    /// anything touches the backend.
    pub fn run<B: Backend>(
        &self,
        db: &Database<B>,
        build: impl FnOnce(&mut Program) -> TxResult<()>,
    ) -> TxResult<Literal> {
        let mut program = Program::new();
        build(&mut program)?;
        let tx = program.finish();
        db.execute_with_backoff(&tx, &self.backoffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::select;
    use trellis_core::{Literal, Txn};
    use trellis_engine::MemoryBackend;

    #[test]
    fn test_schema_runs_a_built_program() {
        let db = Database::new(MemoryBackend::new());
        let schema = Schema::default();

        let out = schema
            .run(&db, |p| {
                p.push(Txn::write("k", 5.0));
                p.ret(Txn::read("k"));
                Ok(())
            })
            .unwrap();
        assert_eq!(out, Literal::Real(5.0));
    }

    #[test]
    fn test_build_failures_surface_before_execution() {
        let db = Database::new(MemoryBackend::new());
        let schema = Schema::default();

        let err = schema.run(&db, |_p| {
            select("bad/key")?;
            Ok(())
        });
        assert!(err.is_err());
        assert!(db.backend().is_empty());
        assert_eq!(db.stats().committed, 0);
    }
}
