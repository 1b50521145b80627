//! Function catalog
//!
//! Functions are identified by name and arity, so `snapshot(integer)` and
//! `snapshot(text, integer)` are distinct entries. Redefining an existing
//! `(name, arity)` pair replaces its body and keeps its [`FunctionId`], so
//! plans compiled earlier keep resolving.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempora_core::{DataType, Datum, Error, FunctionDef, FunctionId, Result, ScalarFn};

/// Scalar functions every database starts with
static BUILTINS: Lazy<Vec<FunctionDef>> = Lazy::new(|| {
    let abs: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> {
        match &args[0] {
            Datum::Null => Ok(Datum::Null),
            Datum::Int(v) => v
                .checked_abs()
                .map(Datum::Int)
                .ok_or_else(|| Error::invalid_input("integer out of range")),
            other => Err(Error::type_mismatch("integer", other.type_name())),
        }
    });
    let lower: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> {
        text_fn(&args[0], |s| Datum::Text(s.to_lowercase()))
    });
    let upper: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> {
        text_fn(&args[0], |s| Datum::Text(s.to_uppercase()))
    });
    let length: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> {
        text_fn(&args[0], |s| Datum::Int(s.chars().count() as i64))
    });
    vec![
        FunctionDef::scalar("abs", vec![DataType::Integer], DataType::Integer, abs),
        FunctionDef::scalar("lower", vec![DataType::Text], DataType::Text, lower),
        FunctionDef::scalar("upper", vec![DataType::Text], DataType::Text, upper),
        FunctionDef::scalar("length", vec![DataType::Text], DataType::Integer, length),
    ]
});

fn text_fn(arg: &Datum, f: impl FnOnce(&str) -> Datum) -> Result<Datum> {
    match arg {
        Datum::Null => Ok(Datum::Null),
        Datum::Text(s) => Ok(f(s)),
        other => Err(Error::type_mismatch("text", other.type_name())),
    }
}

/// Registered functions of one database
#[derive(Debug)]
pub struct FunctionCatalog {
    by_signature: DashMap<(String, usize), FunctionId>,
    defs: DashMap<FunctionId, FunctionDef>,
    next_id: AtomicU32,
}

impl FunctionCatalog {
    /// Catalog holding only the built-in functions
    pub fn new() -> Self {
        let catalog = FunctionCatalog {
            by_signature: DashMap::new(),
            defs: DashMap::new(),
            next_id: AtomicU32::new(1),
        };
        for def in BUILTINS.iter() {
            catalog.define(def.clone());
        }
        catalog
    }

    /// Register `def`, replacing the body of an existing `(name, arity)` entry
    pub fn define(&self, def: FunctionDef) -> FunctionId {
        let key = (def.name.clone(), def.arity());
        let id = *self
            .by_signature
            .entry(key)
            .or_insert_with(|| FunctionId(self.next_id.fetch_add(1, Ordering::Relaxed)));
        tracing::debug!(
            target: "tempora::engine",
            function = %def.name,
            arity = def.arity(),
            %id,
            "function defined"
        );
        self.defs.insert(id, def);
        id
    }

    /// Identity of `name` taking `arity` arguments
    pub fn lookup(&self, name: &str, arity: usize) -> Option<FunctionId> {
        self.by_signature
            .get(&(name.to_string(), arity))
            .map(|e| *e.value())
    }

    /// Definition of `id`
    pub fn get(&self, id: FunctionId) -> Result<FunctionDef> {
        self.defs
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::internal(format!("function {} is not defined", id)))
    }
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempora_core::FunctionBody;

    fn identity() -> ScalarFn {
        Arc::new(|args: &[Datum]| -> Result<Datum> { Ok(args[0].clone()) })
    }

    fn call(catalog: &FunctionCatalog, name: &str, arg: Datum) -> Result<Datum> {
        let id = catalog.lookup(name, 1).unwrap();
        match catalog.get(id)?.body {
            FunctionBody::Scalar { body, .. } => body(&[arg]),
            FunctionBody::SetReturning { .. } => panic!("{} is set-returning", name),
        }
    }

    #[test]
    fn test_builtins_present() {
        let catalog = FunctionCatalog::new();
        assert_eq!(call(&catalog, "abs", Datum::Int(-4)).unwrap(), Datum::Int(4));
        assert_eq!(
            call(&catalog, "upper", Datum::Text("ab".into())).unwrap(),
            Datum::Text("AB".into())
        );
        assert_eq!(call(&catalog, "length", Datum::Null).unwrap(), Datum::Null);
        assert!(call(&catalog, "lower", Datum::Int(1)).is_err());
        assert!(call(&catalog, "abs", Datum::Int(i64::MIN)).is_err());
    }

    #[test]
    fn test_arity_is_part_of_identity() {
        let catalog = FunctionCatalog::new();
        let one = catalog.define(FunctionDef::scalar(
            "snapshot",
            vec![DataType::Integer],
            DataType::Integer,
            identity(),
        ));
        assert_eq!(catalog.lookup("snapshot", 1), Some(one));
        assert_eq!(catalog.lookup("snapshot", 2), None);
    }

    #[test]
    fn test_redefine_keeps_id() {
        let catalog = FunctionCatalog::new();
        let def = FunctionDef::scalar("f", vec![DataType::Integer], DataType::Integer, identity());
        let first = catalog.define(def.clone());
        let second = catalog.define(def);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_id() {
        let catalog = FunctionCatalog::new();
        assert!(catalog.get(FunctionId(9999)).is_err());
    }
}
