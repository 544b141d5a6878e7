use std::collections::BTreeMap;
use std::fmt;

/// Structural IDL type. Used for method signatures, stable layouts and the
/// type table of every wire message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Bool,
    /// Unsigned integer, carried as `u64`.
    Nat,
    /// Signed integer, carried as `i64`.
    Int,
    Text,
    Opt(Box<Type>),
    Vec(Box<Type>),
    Record(RecordType),
}

impl Type {
    pub fn opt(inner: Type) -> Self {
        Type::Opt(Box::new(inner))
    }

    pub fn vec(inner: Type) -> Self {
        Type::Vec(Box::new(inner))
    }

    /// Whether a value of `self` can be stored where `target` is declared.
    ///
    /// Identity, `nat -> int` widening, and the same rule applied through
    /// `opt`, `vec` and records with identical field sets.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (Type::Nat, Type::Int) => true,
            (Type::Opt(a), Type::Opt(b)) | (Type::Vec(a), Type::Vec(b)) => a.is_assignable_to(b),
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a.fields().all(|(name, ty)| {
                        b.get(name).is_some_and(|target| ty.is_assignable_to(target))
                    })
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => f.write_str("null"),
            Type::Bool => f.write_str("bool"),
            Type::Nat => f.write_str("nat"),
            Type::Int => f.write_str("int"),
            Type::Text => f.write_str("text"),
            Type::Opt(inner) => write!(f, "opt {inner}"),
            Type::Vec(inner) => write!(f, "vec {inner}"),
            Type::Record(r) => write!(f, "{r}"),
        }
    }
}

/// Record type. Fields are kept sorted by name, which is also their wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RecordType {
    fields: BTreeMap<String, Type>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion. A repeated name replaces the earlier type.
    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.fields.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("record {}");
        }
        f.write_str("record { ")?;
        for (name, ty) in &self.fields {
            write!(f, "{name} : {ty}; ")?;
        }
        f.write_str("}")
    }
}

/// Whether a method may change canister state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuncMode {
    Update,
    /// State changes made by a query are discarded.
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub args: Vec<Type>,
    pub rets: Vec<Type>,
    pub mode: FuncMode,
}

impl FuncType {
    pub fn update(args: Vec<Type>, rets: Vec<Type>) -> Self {
        Self { args, rets, mode: FuncMode::Update }
    }

    pub fn query(args: Vec<Type>, rets: Vec<Type>) -> Self {
        Self { args, rets, mode: FuncMode::Query }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) -> ({})", join(&self.args), join(&self.rets))?;
        if self.mode == FuncMode::Query {
            f.write_str(" query")?;
        }
        Ok(())
    }
}

/// Interface descriptor of a program version: its methods and install arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceType {
    init: Vec<Type>,
    methods: BTreeMap<String, FuncType>,
}

impl ServiceType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_args(mut self, args: Vec<Type>) -> Self {
        self.init = args;
        self
    }

    pub fn method(mut self, name: impl Into<String>, func: FuncType) -> Self {
        self.methods.insert(name.into(), func);
        self
    }

    pub fn init(&self) -> &[Type] {
        &self.init
    }

    pub fn get(&self, name: &str) -> Option<&FuncType> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &FuncType)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service : ({}) -> {{", join(&self.init))?;
        for (name, func) in &self.methods {
            write!(f, " {name} : {func};")?;
        }
        f.write_str(" }")
    }
}

fn join(types: &[Type]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
