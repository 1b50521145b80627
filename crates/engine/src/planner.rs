//! SQL planner
//!
//! Parses one statement with `sqlparser` (PostgreSQL dialect) and turns it
//! into either a utility command or a [`PlannedStmt`].
//!
//! # Supported SQL
//!
//! - `CREATE TABLE [IF NOT EXISTS] t (col type, ...)`
//! - `INSERT INTO t [(cols)] VALUES (...), ...` with `$n` parameters
//! - `SELECT items [FROM item, ...] [WHERE expr]` where an item is a table
//!   or a set-returning function call
//! - `DELETE FROM t [WHERE expr]`
//! - `EXPLAIN <query>`, `BEGIN`, `COMMIT`, `ROLLBACK`
//!
//! Unquoted identifiers are folded to lower case.
//!
//! # Tuple layout
//!
//! A query's FROM items are joined left-deep with nested loops, so the
//! tuple a WHERE clause or target list sees is the concatenation of the
//! items' columns in FROM order.

use sqlparser::ast::{
    self, BinaryOperator, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
    ObjectName, ObjectNamePart, SelectItem, SetExpr, Statement, TableFactor, TableObject,
    UnaryOperator, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use tempora_core::{
    BinaryOp, CmdType, Column, DataType, Datum, Error, Expr, FunctionBody, Plan, PlanKind,
    PlannedStmt, RangeTblEntry, Result, ResultColumns, TableDef, TargetEntry, UnaryOp,
};
use tempora_storage::HeapStore;

use crate::catalog::FunctionCatalog;

/// Statements executed directly, without the executor
#[derive(Debug, Clone, PartialEq)]
pub enum Utility {
    /// `CREATE TABLE`
    CreateTable {
        /// Table to create
        def: TableDef,
        /// `IF NOT EXISTS` was given
        if_not_exists: bool,
    },
    /// `BEGIN` / `START TRANSACTION`
    Begin,
    /// `COMMIT`
    Commit,
    /// `ROLLBACK`
    Rollback,
}

/// Result of planning one statement
#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    /// A utility command
    Utility(Utility),
    /// A query for the executor
    Query {
        /// The plan
        stmt: PlannedStmt,
        /// `EXPLAIN` was requested: describe, do not run
        explain: bool,
    },
}

/// Normalized name of an identifier
fn ident_name(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

/// Resolve `table` or `public.table` to the table name
pub fn relation_name(parts: &[String]) -> Result<String> {
    match parts {
        [table] => Ok(table.clone()),
        [schema, table] if schema == "public" => Ok(table.clone()),
        _ => Err(Error::UndefinedTable(parts.join("."))),
    }
}

fn object_name(name: &ObjectName) -> Result<Vec<String>> {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => Ok(ident_name(ident)),
            _ => Err(Error::unsupported(format!("name {}", name))),
        })
        .collect()
}

// ============================================================================
// Scope
// ============================================================================

/// Columns visible to expressions of one query level
#[derive(Debug, Default)]
struct Scope {
    items: Vec<ScopeItem>,
}

#[derive(Debug)]
struct ScopeItem {
    alias: String,
    columns: Vec<Column>,
    offset: usize,
}

impl Scope {
    fn width(&self) -> usize {
        self.items.iter().map(|i| i.columns.len()).sum()
    }

    fn push(&mut self, alias: String, columns: Vec<Column>) -> Result<()> {
        if self.items.iter().any(|i| i.alias == alias) {
            return Err(Error::invalid_input(format!(
                "table name \"{}\" specified more than once",
                alias
            )));
        }
        let offset = self.width();
        self.items.push(ScopeItem {
            alias,
            columns,
            offset,
        });
        Ok(())
    }

    fn resolve(&self, qualifier: Option<&str>, name: &str) -> Result<(usize, DataType)> {
        let mut found = None;
        for item in &self.items {
            if qualifier.is_some_and(|q| q != item.alias) {
                continue;
            }
            if let Some(pos) = item.columns.iter().position(|c| c.name == name) {
                if found.is_some() {
                    return Err(Error::invalid_input(format!(
                        "column reference \"{}\" is ambiguous",
                        name
                    )));
                }
                found = Some((item.offset + pos, item.columns[pos].data_type));
            }
        }
        if qualifier.is_some_and(|q| !self.items.iter().any(|i| i.alias == q)) {
            return Err(Error::invalid_input(format!(
                "missing FROM-clause entry for table \"{}\"",
                qualifier.unwrap_or_default()
            )));
        }
        found.ok_or_else(|| Error::UndefinedColumn(name.to_string()))
    }

    fn column_type(&self, index: usize) -> Option<DataType> {
        self.items.iter().find_map(|item| {
            index
                .checked_sub(item.offset)
                .and_then(|i| item.columns.get(i))
                .map(|c| c.data_type)
        })
    }

    fn all_columns(&self) -> Vec<(usize, String)> {
        self.items
            .iter()
            .flat_map(|item| {
                item.columns
                    .iter()
                    .enumerate()
                    .map(move |(i, c)| (item.offset + i, c.name.clone()))
            })
            .collect()
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Plans statements against one database's catalogs
pub struct Planner<'a> {
    store: &'a HeapStore,
    functions: &'a FunctionCatalog,
    param_types: &'a [DataType],
}

impl<'a> Planner<'a> {
    /// Planner resolving names in `store` and `functions`
    ///
    /// `param_types` gives the types of `$1..$n`; statements referring to
    /// other parameters are rejected.
    pub fn new(
        store: &'a HeapStore,
        functions: &'a FunctionCatalog,
        param_types: &'a [DataType],
    ) -> Self {
        Planner {
            store,
            functions,
            param_types,
        }
    }

    /// Parse and plan exactly one statement
    pub fn plan(&self, sql: &str) -> Result<Planned> {
        let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| Error::syntax(e.to_string()))?;
        if statements.len() != 1 {
            return Err(Error::syntax(format!(
                "expected exactly one statement, found {}",
                statements.len()
            )));
        }
        let statement = statements.remove(0);
        self.plan_statement(&statement)
    }

    fn plan_statement(&self, statement: &Statement) -> Result<Planned> {
        match statement {
            Statement::StartTransaction { .. } => Ok(Planned::Utility(Utility::Begin)),
            Statement::Commit { .. } => Ok(Planned::Utility(Utility::Commit)),
            Statement::Rollback { .. } => Ok(Planned::Utility(Utility::Rollback)),
            Statement::CreateTable(create) => {
                if create.query.is_some() {
                    return Err(Error::unsupported("CREATE TABLE AS"));
                }
                let name = relation_name(&object_name(&create.name)?)?;
                let columns = create
                    .columns
                    .iter()
                    .map(|c| Ok(Column::new(ident_name(&c.name), column_type(&c.data_type)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Planned::Utility(Utility::CreateTable {
                    def: TableDef { name, columns },
                    if_not_exists: create.if_not_exists,
                }))
            }
            Statement::Explain {
                statement, analyze, ..
            } => {
                if *analyze {
                    return Err(Error::unsupported("EXPLAIN ANALYZE"));
                }
                match self.plan_statement(statement)? {
                    Planned::Query { stmt, .. } => Ok(Planned::Query {
                        stmt,
                        explain: true,
                    }),
                    Planned::Utility(_) => Err(Error::unsupported("EXPLAIN of a utility statement")),
                }
            }
            Statement::Query(query) => Ok(Planned::Query {
                stmt: self.plan_select(query)?,
                explain: false,
            }),
            Statement::Insert(insert) => Ok(Planned::Query {
                stmt: self.plan_insert(insert)?,
                explain: false,
            }),
            Statement::Delete(delete) => Ok(Planned::Query {
                stmt: self.plan_delete(delete)?,
                explain: false,
            }),
            other => Err(Error::unsupported(format!("statement: {}", other))),
        }
    }

    // ------------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------------

    fn plan_select(&self, query: &ast::Query) -> Result<PlannedStmt> {
        if query.with.is_some() {
            return Err(Error::unsupported("WITH"));
        }
        if query.order_by.is_some() {
            return Err(Error::unsupported("ORDER BY"));
        }
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => return Err(Error::unsupported(format!("query: {}", query))),
        };
        if select.distinct.is_some() {
            return Err(Error::unsupported("DISTINCT"));
        }
        if select.having.is_some() {
            return Err(Error::unsupported("HAVING"));
        }
        if let ast::GroupByExpr::Expressions(exprs, _) = &select.group_by {
            if !exprs.is_empty() {
                return Err(Error::unsupported("GROUP BY"));
            }
        }

        let mut range_table = Vec::new();
        let mut scope = Scope::default();
        let mut root: Option<Plan> = None;
        for item in &select.from {
            if !item.joins.is_empty() {
                return Err(Error::unsupported("JOIN; list tables in FROM instead"));
            }
            let rti = range_table.len();
            let (rte, columns, scan) = self.plan_from_item(&item.relation, rti)?;
            scope.push(rte.alias.clone(), columns)?;
            range_table.push(rte);
            root = Some(match root {
                None => scan,
                Some(outer) => Plan::with_children(PlanKind::NestLoop, vec![outer, scan]),
            });
        }
        let mut root = root.unwrap_or_else(|| Plan::leaf(PlanKind::Result));

        root.qual = select
            .selection
            .as_ref()
            .map(|e| self.plan_expr(e, &scope))
            .transpose()?;

        let mut target_list = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(e) => {
                    let expr = self.plan_expr(e, &scope)?;
                    let name = output_name(&expr);
                    target_list.push(TargetEntry::new(expr, name));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    target_list.push(TargetEntry::new(
                        self.plan_expr(expr, &scope)?,
                        ident_name(alias),
                    ));
                }
                SelectItem::Wildcard(_) => {
                    if scope.items.is_empty() {
                        return Err(Error::invalid_input("SELECT * with no tables specified"));
                    }
                    for (index, name) in scope.all_columns() {
                        target_list.push(TargetEntry::new(
                            Expr::Column {
                                index,
                                name: name.clone(),
                            },
                            name,
                        ));
                    }
                }
                other => return Err(Error::unsupported(format!("select item {}", other))),
            }
        }
        let output_columns = target_list.iter().map(|t| t.name.clone()).collect();
        root.target_list = target_list;

        Ok(PlannedStmt {
            command: CmdType::Select,
            plan: root,
            range_table,
            param_types: self.param_types.to_vec(),
            output_columns,
        })
    }

    fn plan_from_item(
        &self,
        factor: &TableFactor,
        rti: usize,
    ) -> Result<(RangeTblEntry, Vec<Column>, Plan)> {
        let (name, alias, args) = match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => (name, alias, args),
            other => return Err(Error::unsupported(format!("FROM item {}", other))),
        };
        let alias = alias.as_ref().map(|a| ident_name(&a.name));
        let parts = object_name(name)?;

        let Some(fargs) = args else {
            let table_name = relation_name(&parts)?;
            let table = self
                .store
                .get_by_name(&table_name)
                .ok_or_else(|| Error::UndefinedTable(table_name.clone()))?;
            let rte = RangeTblEntry::relation(table.id(), table_name, alias);
            let scan = Plan::leaf(PlanKind::SeqScan {
                table: table.id(),
                rti,
            });
            return Ok((rte, table.columns().to_vec(), scan));
        };

        let func_name = match parts.as_slice() {
            [single] => single.clone(),
            _ => return Err(Error::unsupported(format!("function name {}", name))),
        };
        let empty = Scope::default();
        let args = fargs
            .args
            .iter()
            .map(|arg| self.plan_function_arg(arg, &empty))
            .collect::<Result<Vec<_>>>()?;
        if args
            .iter()
            .any(|a| !matches!(a, Expr::Const(_) | Expr::Param(_)))
        {
            return Err(Error::unsupported(
                "table function arguments must be constants or parameters",
            ));
        }
        let func = self
            .functions
            .lookup(&func_name, args.len())
            .ok_or_else(|| Error::UndefinedFunction {
                name: func_name.clone(),
                arity: args.len(),
            })?;
        let def = self.functions.get(func)?;
        self.check_arg_types(&func_name, &def.arg_types, &args, &empty)?;
        let columns = match &def.body {
            FunctionBody::SetReturning { columns, .. } => match columns {
                ResultColumns::Fixed(cols) => cols.clone(),
                ResultColumns::LikeTableArg(pos) => match args.get(*pos) {
                    Some(Expr::Const(Datum::Text(qualified))) => {
                        let parts: Vec<String> =
                            qualified.split('.').map(|p| p.to_lowercase()).collect();
                        let table_name = relation_name(&parts)?;
                        let table = self
                            .store
                            .get_by_name(&table_name)
                            .ok_or(Error::UndefinedTable(table_name))?;
                        table.columns().to_vec()
                    }
                    _ => {
                        return Err(Error::invalid_input(format!(
                            "argument {} of {} must be a table name literal",
                            pos + 1,
                            func_name
                        )))
                    }
                },
            },
            FunctionBody::Scalar { .. } => {
                return Err(Error::unsupported(format!(
                    "scalar function {} in FROM",
                    func_name
                )))
            }
        };
        let rte = RangeTblEntry::function(func, func_name, alias);
        let scan = Plan::leaf(PlanKind::FunctionScan { func, args, rti });
        Ok((rte, columns, scan))
    }

    // ------------------------------------------------------------------------
    // INSERT / DELETE
    // ------------------------------------------------------------------------

    fn plan_insert(&self, insert: &ast::Insert) -> Result<PlannedStmt> {
        let name = match &insert.table {
            TableObject::TableName(name) => name,
            _ => return Err(Error::unsupported("INSERT into a table function")),
        };
        if insert.returning.is_some() {
            return Err(Error::unsupported("RETURNING"));
        }
        let table_name = relation_name(&object_name(name)?)?;
        let table = self
            .store
            .get_by_name(&table_name)
            .ok_or_else(|| Error::UndefinedTable(table_name.clone()))?;
        let columns = table.columns();

        let targets: Vec<usize> = if insert.columns.is_empty() {
            (0..columns.len()).collect()
        } else {
            insert
                .columns
                .iter()
                .map(|ident| {
                    let col = ident_name(ident);
                    columns
                        .iter()
                        .position(|c| c.name == col)
                        .ok_or(Error::UndefinedColumn(col))
                })
                .collect::<Result<_>>()?
        };

        let source = insert
            .source
            .as_ref()
            .ok_or_else(|| Error::unsupported("INSERT without VALUES"))?;
        let values = match source.body.as_ref() {
            SetExpr::Values(values) => values,
            _ => return Err(Error::unsupported("INSERT ... SELECT")),
        };

        let empty = Scope::default();
        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            if row.len() != targets.len() {
                return Err(Error::invalid_input(format!(
                    "INSERT has {} target columns but {} expressions",
                    targets.len(),
                    row.len()
                )));
            }
            let mut exprs = vec![Expr::Const(Datum::Null); columns.len()];
            for (value, &target) in row.iter().zip(&targets) {
                let expr = self.plan_expr(value, &empty)?;
                if let Some(ty) = self.static_type(&expr, &empty) {
                    if ty != columns[target].data_type {
                        return Err(Error::type_mismatch(
                            columns[target].data_type.to_string(),
                            ty.to_string(),
                        ));
                    }
                }
                exprs[target] = expr;
            }
            rows.push(exprs);
        }

        Ok(PlannedStmt {
            command: CmdType::Insert,
            plan: Plan::leaf(PlanKind::Insert {
                table: table.id(),
                rows,
            }),
            range_table: vec![RangeTblEntry::relation(table.id(), table_name, None)],
            param_types: self.param_types.to_vec(),
            output_columns: Vec::new(),
        })
    }

    fn plan_delete(&self, delete: &ast::Delete) -> Result<PlannedStmt> {
        if delete.using.is_some() {
            return Err(Error::unsupported("DELETE ... USING"));
        }
        let tables = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        let [target] = tables.as_slice() else {
            return Err(Error::unsupported("DELETE from more than one table"));
        };
        if !target.joins.is_empty() {
            return Err(Error::unsupported("DELETE with JOIN"));
        }
        let (rte, columns, mut scan) = self.plan_from_item(&target.relation, 0)?;
        let table = rte
            .table()
            .ok_or_else(|| Error::unsupported("DELETE from a table function"))?;

        let mut scope = Scope::default();
        scope.push(rte.alias.clone(), columns)?;
        scan.qual = delete
            .selection
            .as_ref()
            .map(|e| self.plan_expr(e, &scope))
            .transpose()?;

        Ok(PlannedStmt {
            command: CmdType::Delete,
            plan: Plan::with_children(PlanKind::Delete { table }, vec![scan]),
            range_table: vec![rte],
            param_types: self.param_types.to_vec(),
            output_columns: Vec::new(),
        })
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn plan_expr(&self, expr: &ast::Expr, scope: &Scope) -> Result<Expr> {
        match expr {
            ast::Expr::Identifier(ident) => {
                let name = ident_name(ident);
                let (index, _) = scope.resolve(None, &name)?;
                Ok(Expr::Column { index, name })
            }
            ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [qualifier, column] => {
                    let name = ident_name(column);
                    let (index, _) = scope.resolve(Some(&ident_name(qualifier)), &name)?;
                    Ok(Expr::Column { index, name })
                }
                _ => Err(Error::unsupported(format!("column reference {}", expr))),
            },
            ast::Expr::Value(v) => self.plan_value(&v.value),
            ast::Expr::Nested(inner) => self.plan_expr(inner, scope),
            ast::Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Plus => BinaryOp::Add,
                    BinaryOperator::Minus => BinaryOp::Sub,
                    BinaryOperator::Multiply => BinaryOp::Mul,
                    BinaryOperator::Eq => BinaryOp::Eq,
                    BinaryOperator::NotEq => BinaryOp::NotEq,
                    BinaryOperator::Lt => BinaryOp::Lt,
                    BinaryOperator::LtEq => BinaryOp::LtEq,
                    BinaryOperator::Gt => BinaryOp::Gt,
                    BinaryOperator::GtEq => BinaryOp::GtEq,
                    BinaryOperator::And => BinaryOp::And,
                    BinaryOperator::Or => BinaryOp::Or,
                    other => return Err(Error::unsupported(format!("operator {}", other))),
                };
                Ok(Expr::binary(
                    op,
                    self.plan_expr(left, scope)?,
                    self.plan_expr(right, scope)?,
                ))
            }
            ast::Expr::UnaryOp { op, expr: inner } => {
                let operand = self.plan_expr(inner, scope)?;
                match op {
                    UnaryOperator::Plus => Ok(operand),
                    UnaryOperator::Minus => match operand {
                        Expr::Const(Datum::Int(v)) => Ok(Expr::int(-v)),
                        operand => Ok(Expr::Unary {
                            op: UnaryOp::Neg,
                            operand: Box::new(operand),
                        }),
                    },
                    UnaryOperator::Not => Ok(Expr::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    }),
                    other => Err(Error::unsupported(format!("operator {}", other))),
                }
            }
            ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
                operand: Box::new(self.plan_expr(inner, scope)?),
                negated: false,
            }),
            ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
                operand: Box::new(self.plan_expr(inner, scope)?),
                negated: true,
            }),
            ast::Expr::Function(function) => self.plan_call(function, scope),
            other => Err(Error::unsupported(format!("expression {}", other))),
        }
    }

    fn plan_value(&self, value: &Value) -> Result<Expr> {
        match value {
            Value::Number(digits, _) => digits
                .parse::<i64>()
                .map(Expr::int)
                .map_err(|_| Error::unsupported(format!("numeric literal {}", digits))),
            Value::SingleQuotedString(s) => Ok(Expr::text(s.clone())),
            Value::Boolean(b) => Ok(Expr::Const(Datum::Bool(*b))),
            Value::Null => Ok(Expr::Const(Datum::Null)),
            Value::Placeholder(p) => {
                let n = p
                    .strip_prefix('$')
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| Error::syntax(format!("bad parameter {}", p)))?;
                if n > self.param_types.len() {
                    return Err(Error::invalid_input(format!(
                        "could not determine data type of parameter ${}",
                        n
                    )));
                }
                Ok(Expr::Param(n - 1))
            }
            other => Err(Error::unsupported(format!("literal {}", other))),
        }
    }

    fn plan_function_arg(&self, arg: &FunctionArg, scope: &Scope) -> Result<Expr> {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => self.plan_expr(e, scope),
            other => Err(Error::unsupported(format!("function argument {}", other))),
        }
    }

    fn plan_call(&self, function: &ast::Function, scope: &Scope) -> Result<Expr> {
        let parts = object_name(&function.name)?;
        let name = match parts.as_slice() {
            [single] => single.clone(),
            _ => return Err(Error::unsupported(format!("function name {}", function.name))),
        };
        let args = match &function.args {
            FunctionArguments::None => Vec::new(),
            FunctionArguments::List(list) => list
                .args
                .iter()
                .map(|arg| self.plan_function_arg(arg, scope))
                .collect::<Result<Vec<_>>>()?,
            FunctionArguments::Subquery(_) => {
                return Err(Error::unsupported("subquery as function argument"))
            }
        };
        let func = self
            .functions
            .lookup(&name, args.len())
            .ok_or_else(|| Error::UndefinedFunction {
                name: name.clone(),
                arity: args.len(),
            })?;
        let def = self.functions.get(func)?;
        if def.is_set_returning() {
            return Err(Error::unsupported(format!(
                "set-returning function {} is only allowed in FROM",
                name
            )));
        }
        self.check_arg_types(&name, &def.arg_types, &args, scope)?;
        Ok(Expr::call(func, name, args))
    }

    fn check_arg_types(
        &self,
        name: &str,
        expected: &[DataType],
        args: &[Expr],
        scope: &Scope,
    ) -> Result<()> {
        for (arg, want) in args.iter().zip(expected) {
            if let Some(actual) = self.static_type(arg, scope) {
                if actual != *want {
                    return Err(Error::type_mismatch(
                        format!("{} for argument of {}", want, name),
                        actual.to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Type of `expr` when it is known without evaluation
    fn static_type(&self, expr: &Expr, scope: &Scope) -> Option<DataType> {
        match expr {
            Expr::Const(d) => d.data_type(),
            Expr::Param(i) => self.param_types.get(*i).copied(),
            Expr::Column { index, .. } => scope.column_type(*index),
            Expr::FuncCall { func, .. } => match self.functions.get(*func).ok()?.body {
                FunctionBody::Scalar { returns, .. } => Some(returns),
                FunctionBody::SetReturning { .. } => None,
            },
            _ => None,
        }
    }
}

fn column_type(ty: &ast::DataType) -> Result<DataType> {
    match ty {
        ast::DataType::Int(_)
        | ast::DataType::Integer(_)
        | ast::DataType::BigInt(_)
        | ast::DataType::SmallInt(_)
        | ast::DataType::Int2(_)
        | ast::DataType::Int4(_)
        | ast::DataType::Int8(_) => Ok(DataType::Integer),
        ast::DataType::Text | ast::DataType::Varchar(_) | ast::DataType::CharacterVarying(_) => {
            Ok(DataType::Text)
        }
        ast::DataType::Boolean | ast::DataType::Bool => Ok(DataType::Boolean),
        other => Err(Error::unsupported(format!("column type {}", other))),
    }
}

/// Column name PostgreSQL would give an unaliased select item
fn output_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { name, .. } => name.clone(),
        Expr::FuncCall { name, .. } => name.clone(),
        _ => "?column?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempora_core::{FunctionDef, ScalarFn, SetReturningFn};

    fn fixture() -> (HeapStore, FunctionCatalog) {
        let store = HeapStore::new();
        store
            .create_table(
                TableDef {
                    name: "orders".into(),
                    columns: vec![
                        Column::new("id", DataType::Integer),
                        Column::new("item", DataType::Text),
                    ],
                },
                false,
            )
            .unwrap();
        store
            .create_table(
                TableDef {
                    name: "customers".into(),
                    columns: vec![
                        Column::new("id", DataType::Integer),
                        Column::new("name", DataType::Text),
                    ],
                },
                false,
            )
            .unwrap();
        let functions = FunctionCatalog::new();
        let identity: ScalarFn = Arc::new(|args: &[Datum]| -> Result<Datum> { Ok(args[0].clone()) });
        functions.define(FunctionDef::scalar(
            "snapshot",
            vec![DataType::Integer],
            DataType::Integer,
            identity,
        ));
        let rows: SetReturningFn = Arc::new(
            |_: &dyn tempora_core::Host, _: &[Datum]| -> Result<Vec<tempora_core::Row>> {
                Ok(Vec::new())
            },
        );
        functions.define(FunctionDef::set_returning(
            "snapshot",
            vec![DataType::Text, DataType::Integer],
            ResultColumns::LikeTableArg(0),
            rows,
        ));
        (store, functions)
    }

    fn plan(sql: &str) -> Result<Planned> {
        let (store, functions) = fixture();
        Planner::new(&store, &functions, &[]).plan(sql)
    }

    fn plan_query(sql: &str) -> PlannedStmt {
        match plan(sql).unwrap() {
            Planned::Query { stmt, .. } => stmt,
            other => panic!("expected a query, got {:?}", other),
        }
    }

    #[test]
    fn test_select_with_marker() {
        let stmt = plan_query("SELECT id, snapshot(105) FROM orders");
        assert_eq!(stmt.command, CmdType::Select);
        assert_eq!(stmt.output_columns, vec!["id", "snapshot"]);
        assert!(matches!(stmt.plan.kind, PlanKind::SeqScan { rti: 0, .. }));
        match &stmt.target_list()[1].expr {
            Expr::FuncCall { name, args, .. } => {
                assert_eq!(name, "snapshot");
                assert_eq!(args, &vec![Expr::int(105)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_without_from() {
        let stmt = plan_query("SELECT 1 + 2 AS three");
        assert!(matches!(stmt.plan.kind, PlanKind::Result));
        assert_eq!(stmt.output_columns, vec!["three"]);
        assert!(stmt.primary_relation().is_none());
    }

    #[test]
    fn test_from_list_builds_left_deep_join() {
        let stmt = plan_query("SELECT o.id, c.name FROM orders o, customers c WHERE o.id = c.id");
        assert_eq!(stmt.scan_count(), 2);
        assert!(matches!(stmt.plan.kind, PlanKind::NestLoop));
        assert!(stmt.plan.qual.is_some());
        assert_eq!(stmt.primary_relation().unwrap().name, "orders");
        assert_eq!(stmt.primary_relation().unwrap().alias, "o");
        match &stmt.target_list()[1].expr {
            Expr::Column { index, .. } => assert_eq!(*index, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_column() {
        let err = plan("SELECT id FROM orders, customers").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_wildcard_expands_all_columns() {
        let stmt = plan_query("SELECT * FROM orders");
        assert_eq!(stmt.output_columns, vec!["id", "item"]);
    }

    #[test]
    fn test_table_function_in_from() {
        let stmt = plan_query("SELECT * FROM snapshot('orders', 105)");
        assert!(matches!(stmt.plan.kind, PlanKind::FunctionScan { .. }));
        assert_eq!(stmt.output_columns, vec!["id", "item"]);
        assert_eq!(stmt.scan_count(), 0);
        assert!(stmt.primary_relation().unwrap().table().is_none());
    }

    #[test]
    fn test_table_function_needs_literal_table() {
        let err = plan("SELECT * FROM snapshot('nope', 105)").unwrap_err();
        assert_eq!(err, Error::UndefinedTable("nope".into()));
    }

    #[test]
    fn test_negative_literal_folds() {
        let stmt = plan_query("SELECT snapshot(-5)");
        match &stmt.target_list()[0].expr {
            Expr::FuncCall { args, .. } => assert_eq!(args[0], Expr::int(-5)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_marker_argument_type_checked() {
        let err = plan("SELECT snapshot('x')").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_insert_with_params() {
        let (store, functions) = fixture();
        let types = [DataType::Integer, DataType::Text];
        let planned = Planner::new(&store, &functions, &types)
            .plan("INSERT INTO orders VALUES ($1, $2)")
            .unwrap();
        let Planned::Query { stmt, .. } = planned else {
            panic!("expected a query");
        };
        assert_eq!(stmt.command, CmdType::Insert);
        assert_eq!(stmt.param_types, types.to_vec());
        match &stmt.plan.kind {
            PlanKind::Insert { rows, .. } => {
                assert_eq!(rows, &vec![vec![Expr::Param(0), Expr::Param(1)]]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_insert_column_list_fills_nulls() {
        let stmt = plan_query("INSERT INTO orders (item) VALUES ('pen')");
        match &stmt.plan.kind {
            PlanKind::Insert { rows, .. } => {
                assert_eq!(rows[0], vec![Expr::Const(Datum::Null), Expr::text("pen")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_insert_type_mismatch() {
        let err = plan("INSERT INTO orders VALUES ('x', 'y')").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_parameter() {
        let err = plan("INSERT INTO orders VALUES ($1, 'a')").unwrap_err();
        assert!(err.to_string().contains("parameter $1"));
    }

    #[test]
    fn test_delete_plans_filtered_scan() {
        let stmt = plan_query("DELETE FROM orders WHERE id = 1");
        assert_eq!(stmt.command, CmdType::Delete);
        assert_eq!(stmt.plan.children.len(), 1);
        assert!(stmt.plan.children[0].qual.is_some());
    }

    #[test]
    fn test_create_table_and_transaction_control() {
        match plan("CREATE TABLE IF NOT EXISTS audit_log (lower integer, upper integer, query text)")
            .unwrap()
        {
            Planned::Utility(Utility::CreateTable { def, if_not_exists }) => {
                assert!(if_not_exists);
                assert_eq!(def.name, "audit_log");
                assert_eq!(def.columns[2], Column::new("query", DataType::Text));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(plan("BEGIN").unwrap(), Planned::Utility(Utility::Begin));
        assert_eq!(plan("COMMIT").unwrap(), Planned::Utility(Utility::Commit));
        assert_eq!(plan("ROLLBACK").unwrap(), Planned::Utility(Utility::Rollback));
    }

    #[test]
    fn test_explain_flag() {
        match plan("EXPLAIN SELECT * FROM orders").unwrap() {
            Planned::Query { explain, .. } => assert!(explain),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(plan("SELEC 1").unwrap_err(), Error::Syntax(_)));
        assert!(matches!(plan("SELECT 1; SELECT 2").unwrap_err(), Error::Syntax(_)));
        assert_eq!(
            plan("SELECT * FROM missing").unwrap_err(),
            Error::UndefinedTable("missing".into())
        );
        assert_eq!(
            plan("SELECT nope(1)").unwrap_err(),
            Error::UndefinedFunction {
                name: "nope".into(),
                arity: 1
            }
        );
        assert!(matches!(
            plan("SELECT * FROM orders ORDER BY id").unwrap_err(),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn test_identifiers_fold_to_lower_case() {
        let stmt = plan_query("SELECT ID FROM Public.ORDERS");
        assert_eq!(stmt.output_columns, vec!["id"]);
        assert_eq!(stmt.primary_relation().unwrap().name, "orders");
    }

    #[test]
    fn test_where_on_column_type_checked_call() {
        let err = plan("SELECT upper(id) FROM orders").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        plan_query("SELECT upper(item) FROM orders WHERE id > 1");
    }
}
