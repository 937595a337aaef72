//! Migration generator
//!
//! This module turns a [`SchemaDiff`] into a [`MigrationScript`]: Postgres DDL to move
//! the target toward the source, the statements that undo it, and a duration and risk
//! estimate for each.

use std::collections::HashSet;

use chrono::Utc;

use crate::config::MigrationGeneratorOptions;
use crate::error::{Error, Result};
use crate::schema::comparator::{columns_equal, constraints_equal};
use crate::schema::cost::{CostInput, CostModel, DefaultCostModel};
use crate::schema::diff::{DiffAction, DifferenceDetails, ObjectChange, SchemaDiff, SchemaDifference};
use crate::schema::script::{MigrationOperation, MigrationScript, OperationKind, RiskLevel};
use crate::schema::types::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, ExtensionDefinition,
    FunctionDefinition, IndexDefinition, PolicyDefinition, SortOrder, TableDefinition,
    TriggerDefinition,
};
use crate::utils::ids::{IdGenerator, UuidGenerator};
use crate::utils::sql::{check_statement, normalize_sql, normalize_type, quote_ident, quote_literal, quote_qualified};

/// Generate a migration script for a diff with the default id source and cost model
pub fn generate_migration_script(
    diff: &SchemaDiff,
    options: &MigrationGeneratorOptions,
) -> Result<MigrationScript> {
    MigrationGenerator::new(options).generate(diff)
}

/// Migration SQL generator
pub struct MigrationGenerator<'a> {
    options: &'a MigrationGeneratorOptions,
    ids: Box<dyn IdGenerator + 'a>,
    cost: Box<dyn CostModel + 'a>,
}

impl<'a> MigrationGenerator<'a> {
    /// Create a new migration generator
    pub fn new(options: &'a MigrationGeneratorOptions) -> Self {
        Self {
            options,
            ids: Box::new(UuidGenerator),
            cost: Box::new(DefaultCostModel),
        }
    }

    /// Use a different source of script ids
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'a) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Use a different duration estimator
    pub fn with_cost_model(mut self, cost: impl CostModel + 'a) -> Self {
        self.cost = Box::new(cost);
        self
    }

    /// Generate the forward and rollback operations for a diff.
    ///
    /// Any difference that cannot be expressed fails the whole script.
    pub fn generate(&self, diff: &SchemaDiff) -> Result<MigrationScript> {
        let mut ordered: Vec<&SchemaDifference> = diff.differences.iter().collect();
        ordered.sort_by_key(|d| d.priority);

        let mut operations = Vec::new();
        for difference in &ordered {
            for planned in forward(difference, self.options)? {
                operations.push(self.finish(planned, difference, diff)?);
            }
        }

        let mut rollback_operations = Vec::new();
        if self.options.include_rollback {
            for difference in ordered.iter().rev() {
                for planned in rollback(difference, self.options)? {
                    rollback_operations.push(self.finish(planned, difference, diff)?);
                }
            }
        }

        let mut seen = HashSet::new();
        let dependencies = operations
            .iter()
            .flat_map(|op| op.dependencies.iter())
            .filter(|dep| seen.insert(dep.as_str()))
            .cloned()
            .collect();

        let script = MigrationScript {
            id: self.ids.next_id(),
            source_label: diff.source_label.clone(),
            target_label: diff.target_label.clone(),
            estimated_duration: operations.iter().map(|op| op.estimated_duration).sum(),
            risk_level: operations
                .iter()
                .map(|op| op.risk_level)
                .max()
                .unwrap_or(RiskLevel::Low),
            operations,
            rollback_operations,
            dependencies,
            created_at: Utc::now(),
        };

        tracing::info!(
            script_id = script.id.as_str(),
            operations = script.operations.len(),
            rollback_operations = script.rollback_operations.len(),
            estimated_duration_ms = script.estimated_duration,
            risk = %script.risk_level,
            "Migration script generated"
        );

        Ok(script)
    }

    /// Attach comments, validation, cost and dependencies to a planned statement
    fn finish(
        &self,
        planned: Planned,
        difference: &SchemaDifference,
        diff: &SchemaDiff,
    ) -> Result<MigrationOperation> {
        let object_name = difference.qualified_name();

        let sql = if self.options.add_comments {
            format!("-- {}\n{}", planned.description, planned.sql)
        } else {
            planned.sql
        };

        if self.options.validate_syntax {
            if let Some(reason) = check_statement(&sql) {
                return Err(Error::SyntaxError {
                    object: object_name,
                    reason,
                });
            }
        }

        let estimated_duration = self.cost.estimate(&CostInput {
            object_type: difference.object_type(),
            action: planned.action,
            object_name: &object_name,
            row_count: planned
                .table
                .as_ref()
                .and_then(|t| diff.table_row_counts.get(t))
                .copied(),
            batch_size: self.options.batch_size,
        });

        let mut risk_level = planned.risk;
        if let Some(timeout) = self.options.timeout_per_operation {
            if estimated_duration > timeout {
                risk_level = risk_level.raised();
                tracing::warn!(
                    object = object_name.as_str(),
                    estimated_duration_ms = estimated_duration,
                    timeout_ms = timeout,
                    "Operation estimate exceeds the per-operation timeout"
                );
            }
        }

        tracing::debug!(
            object = object_name.as_str(),
            risk = %risk_level,
            sql = sql.as_str(),
            "{}",
            planned.description
        );

        Ok(MigrationOperation {
            description: planned.description,
            kind: OperationKind::Ddl,
            sql,
            dependencies: difference.dependencies.clone(),
            estimated_duration,
            risk_level,
            object_type: difference.object_type(),
            object_name,
        })
    }
}

/// A statement before costing and validation
struct Planned {
    description: String,
    sql: String,
    risk: RiskLevel,
    action: DiffAction,
    /// Qualified table whose rows the statement touches
    table: Option<String>,
}

impl Planned {
    fn new(action: DiffAction, risk: RiskLevel, description: String, sql: String) -> Self {
        Self {
            description,
            sql,
            risk,
            action,
            table: None,
        }
    }

    fn on_table(mut self, table: String) -> Self {
        self.table = Some(table);
        self
    }
}

fn forward(difference: &SchemaDifference, options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
    match &difference.details {
        DifferenceDetails::Table(change) => apply(difference, change, options),
        DifferenceDetails::Function(change) => apply(difference, change, options),
        DifferenceDetails::Trigger(change) => apply(difference, change, options),
        DifferenceDetails::Index(change) => apply(difference, change, options),
        DifferenceDetails::Policy(change) => apply(difference, change, options),
        DifferenceDetails::Extension(change) => apply(difference, change, options),
    }
}

fn rollback(difference: &SchemaDifference, options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
    match &difference.details {
        DifferenceDetails::Table(change) => undo(difference, change, options),
        DifferenceDetails::Function(change) => undo(difference, change, options),
        DifferenceDetails::Trigger(change) => undo(difference, change, options),
        DifferenceDetails::Index(change) => undo(difference, change, options),
        DifferenceDetails::Policy(change) => undo(difference, change, options),
        DifferenceDetails::Extension(change) => undo(difference, change, options),
    }
}

fn require<'c, T>(
    definition: Option<&'c T>,
    difference: &SchemaDifference,
    field: &str,
) -> Result<&'c T> {
    definition.ok_or_else(|| {
        Error::invalid_operation(
            difference.qualified_name(),
            format!("{} difference has no '{}' definition", difference.action, field),
        )
    })
}

fn apply<T: Translate>(
    difference: &SchemaDifference,
    change: &ObjectChange<T>,
    options: &MigrationGeneratorOptions,
) -> Result<Vec<Planned>> {
    let before = change.before.as_ref();
    let after = change.after.as_ref();

    match difference.action {
        DiffAction::Create => Ok(vec![require(after, difference, "after")?.create_sql(options)?]),
        DiffAction::Drop => Ok(vec![require(before, difference, "before")?.drop_sql(options)?]),
        DiffAction::Alter => {
            let after = require(after, difference, "after")?;
            let before = require(before, difference, "before")?;
            T::alter_sql(before, after, options)
        }
    }
}

/// Statements that undo [`apply`] for the same difference
fn undo<T: Translate>(
    difference: &SchemaDifference,
    change: &ObjectChange<T>,
    options: &MigrationGeneratorOptions,
) -> Result<Vec<Planned>> {
    let before = change.before.as_ref();
    let after = change.after.as_ref();

    match difference.action {
        DiffAction::Create => Ok(vec![require(after, difference, "after")?.drop_sql(options)?]),
        DiffAction::Drop => Ok(vec![require(before, difference, "before")?.create_sql(options)?]),
        DiffAction::Alter => {
            let after = require(after, difference, "after")?;
            let before = require(before, difference, "before")?;
            T::alter_sql(after, before, options)
        }
    }
}

/// DDL for one object category
trait Translate: Sized {
    fn create_sql(&self, options: &MigrationGeneratorOptions) -> Result<Planned>;

    fn drop_sql(&self, options: &MigrationGeneratorOptions) -> Result<Planned>;

    /// Statements that turn `from` into `to`; replaces the object by default
    fn alter_sql(from: &Self, to: &Self, options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
        Ok(vec![from.drop_sql(options)?, to.create_sql(options)?])
    }
}

fn column_sql(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.full_type());
    if column.is_identity {
        sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn ident_list<'s>(names: impl IntoIterator<Item = &'s String>) -> String {
    names
        .into_iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn constraint_sql(table: &TableDefinition, constraint: &ConstraintDefinition) -> Result<String> {
    let name = quote_ident(&constraint.name);
    let missing_expression = || {
        Error::invalid_operation(
            table.qualified_name(),
            format!("constraint {} has no expression", constraint.name),
        )
    };

    let body = match constraint.kind {
        ConstraintKind::PrimaryKey | ConstraintKind::Unique => {
            format!("{} ({})", constraint.kind, ident_list(&constraint.columns))
        }
        ConstraintKind::ForeignKey => {
            let reference = constraint.references.as_ref().ok_or_else(|| {
                Error::invalid_operation(
                    table.qualified_name(),
                    format!("foreign key {} has no referenced table", constraint.name),
                )
            })?;
            let mut sql = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                ident_list(&constraint.columns),
                quote_qualified(&reference.schema, &reference.table),
                ident_list(&reference.columns)
            );
            if let Some(action) = &reference.on_delete {
                sql.push_str(&format!(" ON DELETE {}", action.to_uppercase()));
            }
            if let Some(action) = &reference.on_update {
                sql.push_str(&format!(" ON UPDATE {}", action.to_uppercase()));
            }
            sql
        }
        ConstraintKind::Check => {
            let expression = constraint.expression.as_ref().ok_or_else(missing_expression)?;
            format!("CHECK ({})", expression)
        }
        ConstraintKind::Exclusion => {
            let expression = constraint.expression.as_ref().ok_or_else(missing_expression)?;
            format!("EXCLUDE {}", expression)
        }
    };

    Ok(format!("CONSTRAINT {} {}", name, body))
}

/// Column clauses for `ALTER TABLE` turning `from` into `to`
fn column_alter_clauses(from: &ColumnDefinition, to: &ColumnDefinition, clauses: &mut Vec<String>) {
    let name = quote_ident(&to.name);

    let target_type = to.full_type();
    if normalize_type(&from.full_type()) != normalize_type(&target_type) {
        clauses.push(format!(
            "ALTER COLUMN {} TYPE {} USING {}::{}",
            name, target_type, name, target_type
        ));
    }
    if from.nullable != to.nullable {
        let verb = if to.nullable { "DROP" } else { "SET" };
        clauses.push(format!("ALTER COLUMN {} {} NOT NULL", name, verb));
    }
    let from_default = from.default.as_deref().map(|d| normalize_sql(d, false));
    if from_default != to.default.as_deref().map(|d| normalize_sql(d, false)) {
        match &to.default {
            Some(default) => clauses.push(format!("ALTER COLUMN {} SET DEFAULT {}", name, default)),
            None => clauses.push(format!("ALTER COLUMN {} DROP DEFAULT", name)),
        }
    }
    if from.is_identity != to.is_identity {
        if to.is_identity {
            clauses.push(format!("ALTER COLUMN {} ADD GENERATED BY DEFAULT AS IDENTITY", name));
        } else {
            clauses.push(format!("ALTER COLUMN {} DROP IDENTITY IF EXISTS", name));
        }
    }
}

impl Translate for TableDefinition {
    fn create_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        let mut lines: Vec<String> = self.columns.iter().map(column_sql).collect();
        for constraint in &self.constraints {
            lines.push(constraint_sql(self, constraint)?);
        }

        let sql = format!(
            "CREATE TABLE {} (\n    {}\n);",
            quote_qualified(&self.schema, &self.name),
            lines.join(",\n    ")
        );

        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create table {}", self.qualified_name()),
            sql,
        )
        .on_table(self.qualified_name()))
    }

    fn drop_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::High,
            format!("Drop table {}", self.qualified_name()),
            format!("DROP TABLE IF EXISTS {};", quote_qualified(&self.schema, &self.name)),
        )
        .on_table(self.qualified_name()))
    }

    fn alter_sql(from: &Self, to: &Self, _options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
        let mut clauses = Vec::new();

        let changed_constraints: Vec<&ConstraintDefinition> = to
            .constraints
            .iter()
            .filter(|c| match from.constraints.iter().find(|o| o.name == c.name) {
                Some(old) => !constraints_equal(old, c, false),
                None => true,
            })
            .collect();

        for old in &from.constraints {
            let kept = to.constraints.iter().any(|c| c.name == old.name);
            if !kept || changed_constraints.iter().any(|c| c.name == old.name) {
                clauses.push(format!("DROP CONSTRAINT IF EXISTS {}", quote_ident(&old.name)));
            }
        }

        for old in &from.columns {
            if to.column(&old.name).is_none() {
                clauses.push(format!("DROP COLUMN IF EXISTS {}", quote_ident(&old.name)));
            }
        }

        for column in &to.columns {
            match from.column(&column.name) {
                None => clauses.push(format!("ADD COLUMN {}", column_sql(column))),
                Some(old) if !columns_equal(old, column, false) => {
                    column_alter_clauses(old, column, &mut clauses)
                }
                Some(_) => {}
            }
        }

        for constraint in changed_constraints {
            clauses.push(format!("ADD {}", constraint_sql(to, constraint)?));
        }

        if clauses.is_empty() {
            return Err(Error::unsupported(
                to.qualified_name(),
                "table definitions differ but no ALTER TABLE clause expresses the change",
            ));
        }

        let sql = format!(
            "ALTER TABLE {}\n    {};",
            quote_qualified(&to.schema, &to.name),
            clauses.join(",\n    ")
        );

        Ok(vec![Planned::new(
            DiffAction::Alter,
            RiskLevel::Medium,
            format!("Alter table {}", to.qualified_name()),
            sql,
        )
        .on_table(to.qualified_name())])
    }
}

impl FunctionDefinition {
    fn signature(&self, with_names: bool) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| match (&p.name, with_names) {
                (Some(name), true) => format!("{} {}", quote_ident(name), p.data_type),
                _ => p.data_type.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", quote_qualified(&self.schema, &self.name), params)
    }

    fn same_signature(&self, other: &Self) -> bool {
        normalize_type(&self.return_type) == normalize_type(&other.return_type)
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| normalize_type(&a.data_type) == normalize_type(&b.data_type))
    }

    fn definition_sql(&self) -> Result<String> {
        let tag = ["$$", "$function$", "$body$"]
            .into_iter()
            .find(|tag| !self.body.contains(tag))
            .ok_or_else(|| {
                Error::unsupported(self.qualified_name(), "function body contains every dollar-quote tag")
            })?;

        let security = if self.security_definer { " SECURITY DEFINER" } else { "" };
        Ok(format!(
            "CREATE OR REPLACE FUNCTION {}\nRETURNS {}\nLANGUAGE {}\n{}{}\nAS {}\n{}\n{};",
            self.signature(true),
            self.return_type,
            self.language,
            self.volatility,
            security,
            tag,
            self.body.trim(),
            tag
        ))
    }
}

impl Translate for FunctionDefinition {
    fn create_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create function {}", self.qualified_name()),
            self.definition_sql()?,
        ))
    }

    fn drop_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::High,
            format!("Drop function {}", self.qualified_name()),
            format!("DROP FUNCTION IF EXISTS {} CASCADE;", self.signature(false)),
        ))
    }

    /// `CREATE OR REPLACE` cannot change the signature or return type
    fn alter_sql(from: &Self, to: &Self, options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
        if !from.same_signature(to) {
            let mut drop = from.drop_sql(options)?;
            drop.description = format!(
                "Drop function {} for a signature change (CASCADE also drops dependent triggers and views, recreate any that are not in this migration)",
                from.qualified_name()
            );
            tracing::warn!(
                function = from.qualified_name().as_str(),
                "Signature change drops the function with CASCADE; unchanged dependents are not recreated"
            );
            return Ok(vec![drop, to.create_sql(options)?]);
        }

        Ok(vec![Planned::new(
            DiffAction::Alter,
            RiskLevel::Medium,
            format!("Replace function {}", to.qualified_name()),
            to.definition_sql()?,
        )])
    }
}

impl Translate for TriggerDefinition {
    fn create_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        if self.events.is_empty() {
            return Err(Error::unsupported(self.qualified_name(), "trigger has no events"));
        }

        let mut events: Vec<String> = Vec::new();
        for event in &self.events {
            let event = event.to_string();
            if !events.contains(&event) {
                events.push(event);
            }
        }

        let sql = format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH {} EXECUTE FUNCTION {}();",
            quote_ident(&self.name),
            self.timing,
            events.join(" OR "),
            quote_qualified(&self.schema, &self.table),
            self.orientation,
            quote_qualified(&self.function_schema, &self.function_name)
        );

        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create trigger {} on {}", self.name, self.table_qualified_name()),
            sql,
        ))
    }

    fn drop_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::Medium,
            format!("Drop trigger {} on {}", self.name, self.table_qualified_name()),
            format!(
                "DROP TRIGGER IF EXISTS {} ON {};",
                quote_ident(&self.name),
                quote_qualified(&self.schema, &self.table)
            ),
        ))
    }
}

impl Translate for IndexDefinition {
    fn create_sql(&self, options: &MigrationGeneratorOptions) -> Result<Planned> {
        let columns = self
            .columns
            .iter()
            .map(|c| match c.order {
                SortOrder::Asc => quote_ident(&c.name),
                SortOrder::Desc => format!("{} DESC", quote_ident(&c.name)),
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "CREATE {}INDEX {}{} ON {} USING {} ({});",
            if self.is_unique { "UNIQUE " } else { "" },
            if options.safe_mode { "CONCURRENTLY " } else { "" },
            quote_ident(&self.name),
            quote_qualified(&self.schema, &self.table),
            self.method.to_lowercase(),
            columns
        );

        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create index {}", self.qualified_name()),
            sql,
        )
        .on_table(self.table_qualified_name()))
    }

    fn drop_sql(&self, options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::Medium,
            format!("Drop index {}", self.qualified_name()),
            format!(
                "DROP INDEX {}IF EXISTS {};",
                if options.safe_mode { "CONCURRENTLY " } else { "" },
                quote_qualified(&self.schema, &self.name)
            ),
        )
        .on_table(self.table_qualified_name()))
    }
}

impl Translate for PolicyDefinition {
    fn create_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        let roles = if self.roles.is_empty() {
            "public".to_string()
        } else {
            ident_list(&self.roles)
        };

        let mut sql = format!(
            "CREATE POLICY {} ON {} AS {} FOR {} TO {}",
            quote_ident(&self.name),
            quote_qualified(&self.schema, &self.table),
            if self.permissive { "PERMISSIVE" } else { "RESTRICTIVE" },
            self.command,
            roles
        );
        if let Some(using) = &self.using {
            sql.push_str(&format!(" USING ({})", using));
        }
        if let Some(check) = &self.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", check));
        }
        sql.push(';');

        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create policy {} on {}", self.name, self.table_qualified_name()),
            sql,
        ))
    }

    fn drop_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::Medium,
            format!("Drop policy {} on {}", self.name, self.table_qualified_name()),
            format!(
                "DROP POLICY IF EXISTS {} ON {};",
                quote_ident(&self.name),
                quote_qualified(&self.schema, &self.table)
            ),
        ))
    }
}

impl Translate for ExtensionDefinition {
    fn create_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Create,
            RiskLevel::Low,
            format!("Create extension {}", self.name),
            format!(
                "CREATE EXTENSION IF NOT EXISTS {} WITH VERSION {};",
                quote_ident(&self.name),
                quote_literal(&self.version)
            ),
        ))
    }

    fn drop_sql(&self, _options: &MigrationGeneratorOptions) -> Result<Planned> {
        Ok(Planned::new(
            DiffAction::Drop,
            RiskLevel::High,
            format!("Drop extension {}", self.name),
            format!("DROP EXTENSION IF EXISTS {};", quote_ident(&self.name)),
        ))
    }

    fn alter_sql(from: &Self, to: &Self, _options: &MigrationGeneratorOptions) -> Result<Vec<Planned>> {
        if from.version == to.version {
            return Err(Error::unsupported(&to.name, "extension versions are identical"));
        }

        Ok(vec![Planned::new(
            DiffAction::Alter,
            RiskLevel::Medium,
            format!("Update extension {} to {}", to.name, to.version),
            format!(
                "ALTER EXTENSION {} UPDATE TO {};",
                quote_ident(&to.name),
                quote_literal(&to.version)
            ),
        )])
    }
}
