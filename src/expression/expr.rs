//! Expression tree
//!
//! Expressions are built programmatically, bound to table filters by the
//! planner, then evaluated per row (or per group) by the executor.
//! `sql()` renders the canonical text used for select-list matching and
//! for plan output.

use std::fmt;
use std::sync::Arc;

use super::aggregate::{AggregateKind, SlotKind};
use crate::table::{Column, TableFilter};
use crate::value::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `IS`: equal, with NULL equal to NULL
    EqNullSafe,
}

impl CompareOp {
    /// Operator with swapped operands: `a < b` is `b > a`.
    pub fn reverse(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::EqNullSafe => "IS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AndOrOp {
    And,
    Or,
}

impl AndOrOp {
    pub fn sql(self) -> &'static str {
        match self {
            AndOrOp::And => "AND",
            AndOrOp::Or => "OR",
        }
    }
}

/// Where a column reference reads from once bound.
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    /// Position of the table filter in the statement's filter list
    pub filter: usize,
    pub alias: String,
    pub column: Arc<Column>,
}

#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
    pub binding: Option<ColumnBinding>,
    /// Accumulator slot holding the column's value inside a group
    pub slot: Option<usize>,
}

impl ColumnRef {
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn filter(&self) -> Option<usize> {
        self.binding.as_ref().map(|b| b.filter)
    }

    pub fn column(&self) -> Option<&Arc<Column>> {
        self.binding.as_ref().map(|b| &b.column)
    }

    /// Whether two references resolve to the same filter column.
    pub fn same_target(&self, other: &ColumnRef) -> bool {
        match (&self.binding, &other.binding) {
            (Some(a), Some(b)) => a.filter == b.filter && a.column.column_id() == b.column.column_id(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub arg: Option<Box<Expression>>,
    pub distinct: bool,
    pub slot: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Column(ColumnRef),
    Literal(Value),
    /// Positional statement parameter, zero based
    Parameter(usize),
    Comparison {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    InList {
        left: Box<Expression>,
        values: Vec<Expression>,
    },
    AndOr {
        op: AndOrOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Aggregate(Aggregate),
    /// `*` or `alias.*`; expanded into columns by `Select::init`
    Wildcard { table: Option<String> },
    Alias {
        expr: Box<Expression>,
        alias: String,
    },
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(ColumnRef {
            qualifier: None,
            name: name.into(),
            binding: None,
            slot: None,
        })
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expression::Column(ColumnRef {
            qualifier: Some(table.into()),
            name: name.into(),
            binding: None,
            slot: None,
        })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn param(index: usize) -> Self {
        Expression::Parameter(index)
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn is_null(expr: Expression) -> Self {
        Self::compare(CompareOp::EqNullSafe, expr, Expression::Literal(Value::Null))
    }

    pub fn in_list(left: Expression, values: Vec<Expression>) -> Self {
        Expression::InList {
            left: Box::new(left),
            values,
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::AndOr {
            op: AndOrOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::AndOr {
            op: AndOrOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn count_all() -> Self {
        Expression::Aggregate(Aggregate {
            kind: AggregateKind::CountAll,
            arg: None,
            distinct: false,
            slot: None,
        })
    }

    pub fn aggregate(kind: AggregateKind, arg: Expression) -> Self {
        if kind == AggregateKind::CountAll {
            return Self::count_all();
        }
        Expression::Aggregate(Aggregate {
            kind,
            arg: Some(Box::new(arg)),
            distinct: false,
            slot: None,
        })
    }

    pub fn aggregate_distinct(kind: AggregateKind, arg: Expression) -> Self {
        match Self::aggregate(kind, arg) {
            Expression::Aggregate(mut agg) if agg.arg.is_some() => {
                agg.distinct = true;
                Expression::Aggregate(agg)
            }
            other => other,
        }
    }

    pub fn wildcard() -> Self {
        Expression::Wildcard { table: None }
    }

    pub fn table_wildcard(table: impl Into<String>) -> Self {
        Expression::Wildcard {
            table: Some(table.into()),
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Expression::Alias {
            expr: Box::new(self),
            alias: alias.into(),
        }
    }

    /// The expression under any alias.
    pub fn non_alias(&self) -> &Expression {
        match self {
            Expression::Alias { expr, .. } => expr.non_alias(),
            other => other,
        }
    }

    pub fn alias_name(&self) -> Option<&str> {
        match self {
            Expression::Alias { alias, .. } => Some(alias),
            Expression::Column(c) => Some(&c.name),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self.non_alias() {
            Expression::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Expression::Wildcard { .. })
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.non_alias(), Expression::Literal(_))
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate(_) => true,
            Expression::Comparison { left, right, .. } | Expression::AndOr { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expression::InList { left, values } => {
                left.contains_aggregate() || values.iter().any(Expression::contains_aggregate)
            }
            Expression::Alias { expr, .. } => expr.contains_aggregate(),
            Expression::Column(_)
            | Expression::Literal(_)
            | Expression::Parameter(_)
            | Expression::Wildcard { .. } => false,
        }
    }

    fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Comparison { left, right, .. } | Expression::AndOr { left, right, .. } => {
                vec![left, right]
            }
            Expression::InList { left, values } => {
                let mut children: Vec<&Expression> = vec![left];
                children.extend(values.iter());
                children
            }
            Expression::Aggregate(agg) => agg.arg.iter().map(|a| a.as_ref()).collect(),
            Expression::Alias { expr, .. } => vec![expr],
            Expression::Column(_)
            | Expression::Literal(_)
            | Expression::Parameter(_)
            | Expression::Wildcard { .. } => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Comparison { left, right, .. } | Expression::AndOr { left, right, .. } => {
                vec![left.as_mut(), right.as_mut()]
            }
            Expression::InList { left, values } => {
                let mut children: Vec<&mut Expression> = vec![left.as_mut()];
                children.extend(values.iter_mut());
                children
            }
            Expression::Aggregate(agg) => agg.arg.iter_mut().map(|a| a.as_mut()).collect(),
            Expression::Alias { expr, .. } => vec![expr.as_mut()],
            Expression::Column(_)
            | Expression::Literal(_)
            | Expression::Parameter(_)
            | Expression::Wildcard { .. } => Vec::new(),
        }
    }

    /// Visits every column reference, aggregate arguments included.
    pub fn try_for_each_column_mut<E>(
        &mut self,
        f: &mut dyn FnMut(&mut ColumnRef) -> Result<(), E>,
    ) -> Result<(), E> {
        if let Expression::Column(c) = self {
            return f(c);
        }
        for child in self.children_mut() {
            child.try_for_each_column_mut(f)?;
        }
        Ok(())
    }

    /// Replaces every column reference `f` maps to an expression.
    pub fn replace_columns(&mut self, f: &mut dyn FnMut(&ColumnRef) -> Option<Expression>) {
        if let Expression::Column(c) = self {
            if let Some(replacement) = f(c) {
                *self = replacement;
            }
            return;
        }
        for child in self.children_mut() {
            child.replace_columns(f);
        }
    }

    pub fn for_each_column(&self, f: &mut dyn FnMut(&ColumnRef)) {
        if let Expression::Column(c) = self {
            f(c);
            return;
        }
        for child in self.children() {
            child.for_each_column(f);
        }
    }

    /// Column references that are not inside an aggregate call.
    pub fn columns_outside_aggregates(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_outside_aggregates(&mut out);
        out
    }

    fn collect_outside_aggregates<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expression::Column(c) => out.push(c),
            Expression::Aggregate(_) => {}
            other => {
                for child in other.children() {
                    child.collect_outside_aggregates(out);
                }
            }
        }
    }

    pub fn contains_parameter(&self) -> bool {
        matches!(self, Expression::Parameter(_))
            || self.children().into_iter().any(Expression::contains_parameter)
    }

    /// Whether every column reference reads a filter `bound` accepts.
    pub fn is_evaluatable(&self, bound: &dyn Fn(usize) -> bool) -> bool {
        match self {
            Expression::Column(c) => c.filter().map_or(false, bound),
            Expression::Wildcard { .. } => false,
            other => other.children().into_iter().all(|c| c.is_evaluatable(bound)),
        }
    }

    pub fn references_filter(&self, filter: usize) -> bool {
        let mut found = false;
        self.for_each_column(&mut |c| found |= c.filter() == Some(filter));
        found
    }

    /// Whether the value can take part in a comparison pushed in from outside.
    pub fn is_query_comparable(&self) -> bool {
        !self.data_type().map_or(false, |t| t.is_lob())
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Expression::Column(c) => c.column().map(|col| col.data_type()),
            Expression::Literal(v) => v.data_type(),
            Expression::Parameter(_) | Expression::Wildcard { .. } => None,
            Expression::Comparison { .. } | Expression::InList { .. } | Expression::AndOr { .. } => {
                Some(DataType::Bool)
            }
            Expression::Aggregate(agg) => agg
                .kind
                .data_type(agg.arg.as_ref().and_then(|a| a.data_type())),
            Expression::Alias { expr, .. } => expr.data_type(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self.non_alias() {
            Expression::Column(c) => c.column().map_or(true, |col| col.is_nullable()),
            Expression::Literal(v) => v.is_null(),
            Expression::Aggregate(agg) => {
                !matches!(agg.kind, AggregateKind::Count | AggregateKind::CountAll)
            }
            _ => true,
        }
    }

    /// Folds constant sub-trees.
    pub fn optimize(self) -> Expression {
        match self {
            Expression::Comparison { op, left, right } => {
                let left = left.optimize();
                let right = right.optimize();
                match (&left, &right) {
                    (Expression::Literal(l), Expression::Literal(r)) => {
                        Expression::Literal(super::eval::compare_values(op, l, r))
                    }
                    _ => Expression::compare(op, left, right),
                }
            }
            Expression::AndOr { op, left, right } => {
                let left = left.optimize();
                let right = right.optimize();
                match (left, right) {
                    (Expression::Literal(l), Expression::Literal(r)) => {
                        Expression::Literal(super::eval::and_or(op, l, r))
                    }
                    (Expression::Literal(c), other) | (other, Expression::Literal(c)) => {
                        match (op, c) {
                            (AndOrOp::And, Value::Bool(true)) | (AndOrOp::Or, Value::Bool(false)) => other,
                            (AndOrOp::And, Value::Bool(false)) => Expression::Literal(Value::Bool(false)),
                            (AndOrOp::Or, Value::Bool(true)) => Expression::Literal(Value::Bool(true)),
                            (op, c) => Expression::AndOr {
                                op,
                                left: Box::new(other),
                                right: Box::new(Expression::Literal(c)),
                            },
                        }
                    }
                    (left, right) => Expression::AndOr {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                }
            }
            Expression::InList { left, values } => Expression::InList {
                left: Box::new(left.optimize()),
                values: values.into_iter().map(Expression::optimize).collect(),
            },
            Expression::Alias { expr, alias } => Expression::Alias {
                expr: Box::new(expr.optimize()),
                alias,
            },
            other => other,
        }
    }

    /// Gives every aggregate and every column outside an aggregate an
    /// accumulator slot.
    pub fn assign_slots(&mut self, slots: &mut Vec<SlotKind>) {
        match self {
            Expression::Aggregate(agg) => {
                if agg.slot.is_none() {
                    agg.slot = Some(slots.len());
                    slots.push(SlotKind::Aggregate {
                        kind: agg.kind,
                        distinct: agg.distinct,
                    });
                }
            }
            Expression::Column(c) => {
                if c.slot.is_none() {
                    c.slot = Some(slots.len());
                    slots.push(SlotKind::Column);
                }
            }
            other => {
                for child in other.children_mut() {
                    child.assign_slots(slots);
                }
            }
        }
    }

    /// Whether the value is answerable from table and index metadata alone.
    pub fn is_quick_evaluatable(&self, filters: &[TableFilter]) -> bool {
        match self {
            Expression::Aggregate(agg) => agg.quick_index(filters).is_some() || agg.quick_row_count(filters),
            Expression::Column(_) | Expression::Wildcard { .. } => false,
            Expression::Literal(_) | Expression::Parameter(_) => true,
            other => other
                .children()
                .into_iter()
                .all(|c| c.is_quick_evaluatable(filters)),
        }
    }

    pub fn sql(&self) -> String {
        match self {
            Expression::Column(c) => match (&c.binding, &c.qualifier) {
                (Some(b), _) => format!("{}.{}", b.alias, b.column.name()),
                (None, Some(q)) => format!("{}.{}", q, c.name),
                (None, None) => c.name.clone(),
            },
            Expression::Literal(v) => v.sql(),
            Expression::Parameter(i) => format!("?{}", i + 1),
            Expression::Comparison { op, left, right } => {
                if *op == CompareOp::EqNullSafe && matches!(right.as_ref(), Expression::Literal(Value::Null)) {
                    format!("({} IS NULL)", left.sql())
                } else {
                    format!("({} {} {})", left.sql(), op.sql(), right.sql())
                }
            }
            Expression::InList { left, values } => {
                let list: Vec<String> = values.iter().map(Expression::sql).collect();
                format!("({} IN({}))", left.sql(), list.join(", "))
            }
            Expression::AndOr { op, left, right } => {
                format!("({} {} {})", left.sql(), op.sql(), right.sql())
            }
            Expression::Aggregate(agg) => match &agg.arg {
                None => "COUNT(*)".to_string(),
                Some(arg) => format!(
                    "{}({}{})",
                    agg.kind.name(),
                    if agg.distinct { "DISTINCT " } else { "" },
                    unenclose(&arg.sql())
                ),
            },
            Expression::Wildcard { table: None } => "*".to_string(),
            Expression::Wildcard { table: Some(t) } => format!("{}.*", t),
            Expression::Alias { expr, alias } => format!("{} AS {}", expr.sql(), alias),
        }
    }
}

impl Aggregate {
    /// Index answering MIN/MAX of a plain column from its first or last entry.
    pub fn quick_index(&self, filters: &[TableFilter]) -> Option<Arc<dyn crate::index::Index>> {
        if !matches!(self.kind, AggregateKind::Min | AggregateKind::Max) {
            return None;
        }
        let column = self.arg.as_ref()?.as_column()?;
        let binding = column.binding.as_ref()?;
        filters
            .get(binding.filter)?
            .table()
            .index_for_column(binding.column.column_id(), true, false)
    }

    /// COUNT(*) and COUNT of a NOT NULL column equal the row count.
    pub fn quick_row_count(&self, filters: &[TableFilter]) -> bool {
        let Some(filter) = filters.first() else {
            return false;
        };
        match self.kind {
            AggregateKind::CountAll => filter.table().can_get_row_count(),
            AggregateKind::Count if !self.distinct => {
                self.arg
                    .as_ref()
                    .and_then(|a| a.as_column())
                    .and_then(ColumnRef::column)
                    .map_or(false, |c| !c.is_nullable())
                    && filter.table().can_get_row_count()
            }
            _ => false,
        }
    }
}

/// Strips one pair of enclosing parentheses.
pub fn unenclose(sql: &str) -> &str {
    if sql.len() >= 2 && sql.starts_with('(') && sql.ends_with(')') {
        &sql[1..sql.len() - 1]
    } else {
        sql
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql())
    }
}
