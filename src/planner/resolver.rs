//! Column resolution
//!
//! Binds column references to the statement's table filters. A qualifier
//! must name a filter alias. An unqualified name found in several filters
//! is ambiguous unless all but one of them merged the column into an
//! earlier filter through a natural join.

use super::errors::{PlannerError, PlannerResult};
use crate::expression::{ColumnBinding, ColumnRef, Expression};
use crate::table::TableFilter;

fn bind_column(column: &mut ColumnRef, filters: &[TableFilter]) -> PlannerResult<()> {
    if column.is_bound() {
        return Ok(());
    }
    let binding = match &column.qualifier {
        Some(qualifier) => {
            let qualified = || format!("{}.{}", qualifier, column.name);
            let (f, filter) = filters
                .iter()
                .enumerate()
                .find(|(_, f)| f.alias().eq_ignore_ascii_case(qualifier))
                .ok_or_else(|| PlannerError::column_not_found(&qualified()))?;
            let table_column = filter
                .table()
                .find_column(&column.name)
                .ok_or_else(|| PlannerError::column_not_found(&qualified()))?;
            ColumnBinding {
                filter: f,
                alias: filter.alias().to_string(),
                column: table_column.clone(),
            }
        }
        None => {
            let candidates: Vec<(usize, &TableFilter)> = filters
                .iter()
                .enumerate()
                .filter(|(_, f)| f.table().find_column(&column.name).is_some())
                .collect();
            let chosen = match candidates.as_slice() {
                [] => return Err(PlannerError::column_not_found(&column.name)),
                [only] => *only,
                many => {
                    let owners: Vec<&(usize, &TableFilter)> = many
                        .iter()
                        .filter(|(_, f)| {
                            f.table()
                                .find_column(&column.name)
                                .map_or(false, |c| !f.is_natural_join_column(c.column_id()))
                        })
                        .collect();
                    match owners.as_slice() {
                        [only] => **only,
                        _ => return Err(PlannerError::ambiguous_column(&column.name)),
                    }
                }
            };
            let (f, filter) = chosen;
            let table_column = filter
                .table()
                .find_column(&column.name)
                .ok_or_else(|| PlannerError::column_not_found(&column.name))?;
            ColumnBinding {
                filter: f,
                alias: filter.alias().to_string(),
                column: table_column.clone(),
            }
        }
    };
    column.binding = Some(binding);
    Ok(())
}

/// Binds every column reference in `expr`, aggregate arguments included.
pub fn bind_columns(expr: &mut Expression, filters: &[TableFilter]) -> PlannerResult<()> {
    expr.try_for_each_column_mut(&mut |c| bind_column(c, filters))
}

/// Lets HAVING refer to select-list aliases: `HAVING C > 1` for `COUNT(*) AS C`.
pub fn resolve_select_aliases(having: &mut Expression, expressions: &[Expression], visible: usize) {
    having.replace_columns(&mut |c| {
        if c.qualifier.is_some() || c.is_bound() {
            return None;
        }
        expressions.iter().take(visible).find_map(|e| match e {
            Expression::Alias { expr, alias } if alias.eq_ignore_ascii_case(&c.name) => {
                Some(expr.as_ref().clone())
            }
            _ => None,
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::AggregateKind;

    #[test]
    fn test_having_alias_is_replaced() {
        let exprs = vec![Expression::column("ID"), Expression::count_all().alias("N")];
        let mut having = Expression::compare(
            crate::expression::CompareOp::Gt,
            Expression::column("n"),
            Expression::literal(1),
        );
        resolve_select_aliases(&mut having, &exprs, 2);
        assert_eq!(having.sql(), "(COUNT(*) > 1)");
    }

    #[test]
    fn test_having_without_alias_is_kept() {
        let exprs = vec![Expression::aggregate(AggregateKind::Sum, Expression::column("V")).alias("S")];
        let mut having = Expression::eq(Expression::column("ID"), Expression::literal(1));
        resolve_select_aliases(&mut having, &exprs, 1);
        assert_eq!(having.sql(), "(ID = 1)");
    }
}
