//! Typed query construction for entity collections.
//!
//! Queries are immutable trees of field comparisons and boolean
//! combinators. They are built exclusively through the operator methods on
//! typed [`Key`]s, so a comparison against the wrong value type, or
//! against a misspelled field name, fails to compile instead of reaching
//! the storage layer.
//!
//! ```ignore
//! let query = fields.age().gte(2).and(fields.name().starts_with("Si"));
//! ```
//!
//! Operator availability follows the field's declared type: every
//! primitive field gets equality and existence checks, ordered values add
//! range comparisons, string fields add prefix/substring matching, and
//! sequence fields add element containment. Enum equality compares
//! against the case's serialized wire tag.
//!
//! Backends consume the tree through [`QueryVisitor`].

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::key::Key;
use crate::primitive::{OrderedValue, Primitive};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification: which field, which direction.
#[derive(Debug, Clone)]
pub struct Sort {
    /// The dotted wire name of the field to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// A sort over a typed key.
    pub fn by<V: OrderedValue>(key: &Key<V>, direction: SortDirection) -> Self {
        Sort { field: key.name().to_string(), direction }
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String starts with the value.
    StartsWith,
    /// String or array contains the value.
    Contains,
}

/// An immutable filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All sub-expressions must match.
    And(Vec<Expr>),
    /// Any sub-expression must match.
    Or(Vec<Expr>),
    /// Inverts the sub-expression.
    Not(Box<Expr>),
    /// The field exists (or does not).
    Exists(String, bool),
    /// A single field comparison.
    Field {
        /// Dotted wire name of the compared field.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The packed value compared against.
        value: Bson,
    },
}

impl Expr {
    pub(crate) fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines with another expression using logical AND.
    ///
    /// An existing AND node absorbs the new operand instead of nesting.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines with another expression using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

impl<V: Primitive> Key<V> {
    /// Matches documents whose field equals the value.
    ///
    /// For enumeration fields this compares against the case's serialized
    /// wire tag.
    pub fn eq(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Eq, value.into().to_primitive())
    }

    /// Matches documents whose field does not equal the value.
    pub fn ne(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Ne, value.into().to_primitive())
    }

    /// Matches documents where the field is present and non-null.
    pub fn exists(&self) -> Expr {
        Expr::Exists(self.name().to_string(), true)
    }

    /// Matches documents where the field is absent.
    pub fn not_exists(&self) -> Expr {
        Expr::Exists(self.name().to_string(), false)
    }
}

impl<V: OrderedValue> Key<V> {
    /// Matches documents whose field is strictly greater than the value.
    pub fn gt(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Gt, value.into().to_primitive())
    }

    /// Matches documents whose field is greater than or equal to the value.
    pub fn gte(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Gte, value.into().to_primitive())
    }

    /// Matches documents whose field is strictly less than the value.
    pub fn lt(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Lt, value.into().to_primitive())
    }

    /// Matches documents whose field is less than or equal to the value.
    pub fn lte(&self, value: impl Into<V>) -> Expr {
        Expr::field(self.name().to_string(), FieldOp::Lte, value.into().to_primitive())
    }
}

impl Key<String> {
    /// Matches string fields starting with the prefix.
    pub fn starts_with(&self, prefix: impl Into<String>) -> Expr {
        Expr::field(
            self.name().to_string(),
            FieldOp::StartsWith,
            Bson::String(prefix.into()),
        )
    }

    /// Matches string fields containing the substring.
    pub fn contains(&self, needle: impl Into<String>) -> Expr {
        Expr::field(
            self.name().to_string(),
            FieldOp::Contains,
            Bson::String(needle.into()),
        )
    }
}

impl<V: Primitive> Key<Vec<V>> {
    /// Matches sequence fields containing the element.
    pub fn contains_element(&self, element: impl Into<V>) -> Expr {
        Expr::field(
            self.name().to_string(),
            FieldOp::Contains,
            element.into().to_primitive(),
        )
    }
}

/// A structured query: filter plus result-shaping options.
///
/// Use [`Query::builder`] for fluent construction, or convert a bare
/// [`Expr`] with `.into()` when only a filter is needed.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    pub skip: Option<usize>,
    /// Sort specification.
    pub sort: Option<Sort>,
    /// Cursor batch-size hint; backends may ignore it.
    pub batch_size: Option<usize>,
}

impl Query {
    /// An unfiltered query matching every document.
    pub fn all() -> Self {
        Query::default()
    }

    /// Creates a new query builder.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

impl From<Expr> for Query {
    fn from(filter: Expr) -> Self {
        Query { filter: Some(filter), ..Query::default() }
    }
}

/// Fluent builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of matching documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the sort specification.
    pub fn sort<V: OrderedValue>(mut self, key: &Key<V>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort::by(key, direction));
        self
    }

    /// Sets the cursor batch-size hint.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.query.batch_size = Some(batch_size);
        self
    }

    /// Builds the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor over the expression tree, implemented by backends to translate
/// or evaluate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<MappingError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
