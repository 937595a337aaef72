//! Schema comparator
//!
//! This module compares a source snapshot against a target snapshot and calculates
//! the differences needed to evolve the target toward the source.

use glob::Pattern;
use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::config::ComparisonOptions;
use crate::error::{Error, Result};
use crate::schema::diff::{
    DiffAction, DifferenceDetails, ObjectChange, SchemaDiff, SchemaDifference,
};
use crate::schema::ordering::assign_priorities;
use crate::schema::types::{
    ColumnDefinition, ConstraintDefinition, ExtensionDefinition, FunctionDefinition,
    IndexDefinition, PolicyDefinition, SchemaDefinition, TableDefinition, TriggerDefinition,
};
use crate::utils::sql::{normalize_sql, normalize_type};

const CREATE_REASON: &str = "exists in source but not in target";
const DROP_REASON: &str = "exists in target but not in source";

/// Compare two snapshots with the given options
pub fn compare_schemas(
    source: &SchemaDefinition,
    target: &SchemaDefinition,
    options: &ComparisonOptions,
) -> Result<SchemaDiff> {
    Ok(SchemaComparator::new(options)?.compare(source, target))
}

/// Computes [`SchemaDiff`]s between snapshots
#[derive(Debug, Clone)]
pub struct SchemaComparator {
    options: ComparisonOptions,
    ignore_patterns: Vec<Pattern>,
}

impl SchemaComparator {
    /// Create a comparator, compiling the custom ignore patterns
    pub fn new(options: &ComparisonOptions) -> Result<Self> {
        let ignore_patterns = options
            .custom_ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            options: options.clone(),
            ignore_patterns,
        })
    }

    /// Compute the differences needed to evolve `target` toward `source`
    pub fn compare(&self, source: &SchemaDefinition, target: &SchemaDefinition) -> SchemaDiff {
        let mut differences = Vec::new();
        let snapshots = Snapshots { source, target };

        self.diff_objects(&source.tables, &target.tables, &snapshots, &mut differences);
        self.diff_objects(&source.functions, &target.functions, &snapshots, &mut differences);
        if !self.options.ignore_indexes {
            self.diff_objects(&source.indexes, &target.indexes, &snapshots, &mut differences);
        }
        self.diff_objects(&source.triggers, &target.triggers, &snapshots, &mut differences);
        if !self.options.ignore_policies {
            self.diff_objects(&source.policies, &target.policies, &snapshots, &mut differences);
        }
        if !self.options.ignore_extensions {
            self.diff_objects(&source.extensions, &target.extensions, &snapshots, &mut differences);
        }

        let differences = if self.options.dependency_analysis {
            assign_priorities(differences)
        } else {
            differences
        };

        for difference in &differences {
            tracing::debug!(
                object_type = %difference.object_type(),
                action = %difference.action,
                name = difference.qualified_name().as_str(),
                priority = difference.priority,
                "Schema difference"
            );
        }

        let diff = SchemaDiff::new(
            &self.options.source_label,
            &self.options.target_label,
            differences,
            row_counts(source, target),
        );

        tracing::info!(
            source = diff.source_label.as_str(),
            target = diff.target_label.as_str(),
            differences = diff.summary.total_differences,
            creates = diff.summary.creates,
            alters = diff.summary.alters,
            drops = diff.summary.drops,
            "Schema comparison complete"
        );

        diff
    }

    fn is_ignored<T: SchemaObject>(&self, object: &T) -> bool {
        let key = object.key();
        self.ignore_patterns
            .iter()
            .any(|p| p.matches(object.name()) || p.matches(&key))
    }

    fn diff_objects<T: SchemaObject>(
        &self,
        source: &[T],
        target: &[T],
        snapshots: &Snapshots<'_>,
        out: &mut Vec<SchemaDifference>,
    ) {
        let source_map: IndexMap<String, &T> = source
            .iter()
            .filter(|o| !self.is_ignored(*o))
            .map(|o| (o.key(), o))
            .collect();
        let target_map: IndexMap<String, &T> = target
            .iter()
            .filter(|o| !self.is_ignored(*o))
            .map(|o| (o.key(), o))
            .collect();

        for (key, &src) in &source_map {
            match target_map.get(key) {
                None => {
                    let reason = with_problems(CREATE_REASON.to_string(), src.problems(snapshots.source));
                    out.push(self.difference(
                        DiffAction::Create,
                        src,
                        T::wrap(ObjectChange::created(src.clone(), reason)),
                    ));
                }
                Some(&tgt) => {
                    let changes = src.changes(tgt, self.options.ignore_comments);
                    if !changes.is_empty() {
                        let reason = with_problems(changes.join("; "), src.problems(snapshots.source));
                        out.push(self.difference(
                            DiffAction::Alter,
                            src,
                            T::wrap(ObjectChange::altered(tgt.clone(), src.clone(), reason)),
                        ));
                    }
                }
            }
        }

        for (key, &tgt) in &target_map {
            if !source_map.contains_key(key) {
                let reason = with_problems(DROP_REASON.to_string(), tgt.problems(snapshots.target));
                out.push(self.difference(
                    DiffAction::Drop,
                    tgt,
                    T::wrap(ObjectChange::dropped(tgt.clone(), reason)),
                ));
            }
        }
    }

    fn difference<T: SchemaObject>(
        &self,
        action: DiffAction,
        object: &T,
        details: DifferenceDetails,
    ) -> SchemaDifference {
        let dependencies = if self.options.dependency_analysis {
            object.dependencies()
        } else {
            Vec::new()
        };

        SchemaDifference {
            action,
            name: object.name().to_string(),
            schema: object.schema().to_string(),
            details,
            dependencies,
            priority: 0,
        }
    }
}

struct Snapshots<'a> {
    source: &'a SchemaDefinition,
    target: &'a SchemaDefinition,
}

fn with_problems(reason: String, problems: Vec<String>) -> String {
    if problems.is_empty() {
        reason
    } else {
        format!("{} (warning: {})", reason, problems.join("; "))
    }
}

/// Row counts keyed by qualified table name; target counts win over source counts
fn row_counts(source: &SchemaDefinition, target: &SchemaDefinition) -> IndexMap<String, u64> {
    let mut counts = IndexMap::new();
    for table in &target.tables {
        if let Some(rows) = table.estimated_row_count {
            counts.insert(table.qualified_name(), rows);
        }
    }
    for table in &source.tables {
        if let Some(rows) = table.estimated_row_count {
            counts.entry(table.qualified_name()).or_insert(rows);
        }
    }
    counts
}

/// Behaviour shared by every comparable object category
trait SchemaObject: Clone {
    fn key(&self) -> String;
    fn name(&self) -> &str;
    fn schema(&self) -> &str;
    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails;

    /// Names of objects this one requires to exist first
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Human readable list of structural differences; empty when equal
    fn changes(&self, other: &Self, ignore_comments: bool) -> Vec<String>;

    /// Internal inconsistencies of this object within its own snapshot
    fn problems(&self, _snapshot: &SchemaDefinition) -> Vec<String> {
        Vec::new()
    }
}

fn sql_eq(a: &str, b: &str, ignore_comments: bool) -> bool {
    normalize_sql(a, ignore_comments) == normalize_sql(b, ignore_comments)
}

fn opt_sql_eq(a: &Option<String>, b: &Option<String>, ignore_comments: bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => sql_eq(a, b, ignore_comments),
        (None, None) => true,
        _ => false,
    }
}

pub(crate) fn columns_equal(a: &ColumnDefinition, b: &ColumnDefinition, ignore_comments: bool) -> bool {
    normalize_type(&a.full_type()) == normalize_type(&b.full_type())
        && a.nullable == b.nullable
        && a.is_identity == b.is_identity
        && opt_sql_eq(&a.default, &b.default, ignore_comments)
}

pub(crate) fn constraints_equal(
    a: &ConstraintDefinition,
    b: &ConstraintDefinition,
    ignore_comments: bool,
) -> bool {
    let references_equal = match (&a.references, &b.references) {
        (Some(x), Some(y)) => {
            x.schema == y.schema
                && x.table == y.table
                && x.columns == y.columns
                && action_eq(&x.on_delete, &y.on_delete)
                && action_eq(&x.on_update, &y.on_update)
        }
        (None, None) => true,
        _ => false,
    };

    a.kind == b.kind
        && a.columns == b.columns
        && references_equal
        && opt_sql_eq(&a.expression, &b.expression, ignore_comments)
}

/// Referential actions compare case-insensitively with NO ACTION as the default
fn action_eq(a: &Option<String>, b: &Option<String>) -> bool {
    let norm = |v: &Option<String>| {
        v.as_deref()
            .map(|s| normalize_type(s))
            .unwrap_or_else(|| "no action".to_string())
    };
    norm(a) == norm(b)
}

/// Name-keyed member diff: (added, dropped, changed) names
fn diff_members<'a, T>(
    source: &'a [T],
    target: &'a [T],
    name: impl Fn(&T) -> &str,
    equal: impl Fn(&T, &T) -> bool,
) -> (Vec<&'a str>, Vec<&'a str>, Vec<&'a str>) {
    let target_by_name: IndexMap<&str, &T> = target.iter().map(|m| (name(m), m)).collect();
    let source_by_name: IndexMap<&str, &T> = source.iter().map(|m| (name(m), m)).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (member_name, member) in &source_by_name {
        match target_by_name.get(member_name) {
            None => added.push(*member_name),
            Some(other) if !equal(*member, *other) => changed.push(*member_name),
            Some(_) => {}
        }
    }
    let dropped = target_by_name
        .keys()
        .filter(|n| !source_by_name.contains_key(*n))
        .copied()
        .collect();

    (added, dropped, changed)
}

fn push_names(changes: &mut Vec<String>, label: &str, names: &[&str]) {
    if !names.is_empty() {
        changes.push(format!("{}: {}", label, names.join(", ")));
    }
}

impl SchemaObject for TableDefinition {
    fn key(&self) -> String {
        self.qualified_name()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Table(change)
    }

    fn dependencies(&self) -> Vec<String> {
        self.referenced_tables()
    }

    fn changes(&self, other: &Self, ignore_comments: bool) -> Vec<String> {
        let mut changes = Vec::new();

        let (added, dropped, changed) = diff_members(
            &self.columns,
            &other.columns,
            |c| c.name.as_str(),
            |a, b| columns_equal(a, b, ignore_comments),
        );
        push_names(&mut changes, "columns added", &added);
        push_names(&mut changes, "columns dropped", &dropped);
        push_names(&mut changes, "columns changed", &changed);

        let (added, dropped, changed) = diff_members(
            &self.constraints,
            &other.constraints,
            |c| c.name.as_str(),
            |a, b| constraints_equal(a, b, ignore_comments),
        );
        push_names(&mut changes, "constraints added", &added);
        push_names(&mut changes, "constraints dropped", &dropped);
        push_names(&mut changes, "constraints changed", &changed);

        changes
    }

    fn problems(&self, _snapshot: &SchemaDefinition) -> Vec<String> {
        let mut problems = Vec::new();
        for constraint in &self.constraints {
            for column in &constraint.columns {
                if self.column(column).is_none() {
                    problems.push(format!(
                        "constraint {} references unknown column {}",
                        constraint.name, column
                    ));
                }
            }
        }
        problems
    }
}

impl SchemaObject for FunctionDefinition {
    fn key(&self) -> String {
        self.qualified_name()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Function(change)
    }

    fn changes(&self, other: &Self, ignore_comments: bool) -> Vec<String> {
        let mut changes = Vec::new();

        if normalize_type(&self.return_type) != normalize_type(&other.return_type) {
            changes.push("return type changed".to_string());
        }
        let params_equal = self.parameters.len() == other.parameters.len()
            && self.parameters.iter().zip(&other.parameters).all(|(a, b)| {
                a.name == b.name && normalize_type(&a.data_type) == normalize_type(&b.data_type)
            });
        if !params_equal {
            changes.push("parameters changed".to_string());
        }
        if !self.language.eq_ignore_ascii_case(&other.language) {
            changes.push("language changed".to_string());
        }
        if !sql_eq(&self.body, &other.body, ignore_comments) {
            changes.push("body changed".to_string());
        }
        if self.security_definer != other.security_definer {
            changes.push("security definer changed".to_string());
        }
        if self.volatility != other.volatility {
            changes.push("volatility changed".to_string());
        }

        changes
    }
}

impl SchemaObject for TriggerDefinition {
    fn key(&self) -> String {
        self.qualified_name()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Trigger(change)
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.table_qualified_name(), self.function_qualified_name()]
    }

    fn changes(&self, other: &Self, _ignore_comments: bool) -> Vec<String> {
        let mut changes = Vec::new();

        if self.timing != other.timing {
            changes.push("timing changed".to_string());
        }
        let own: BTreeSet<_> = self.events.iter().collect();
        let theirs: BTreeSet<_> = other.events.iter().collect();
        if own != theirs {
            changes.push("events changed".to_string());
        }
        if self.orientation != other.orientation {
            changes.push("orientation changed".to_string());
        }
        if self.function_qualified_name() != other.function_qualified_name() {
            changes.push("function changed".to_string());
        }

        changes
    }

    fn problems(&self, snapshot: &SchemaDefinition) -> Vec<String> {
        let mut problems = Vec::new();
        if snapshot.table(&self.schema, &self.table).is_none() {
            problems.push(format!("table {} not found in snapshot", self.table_qualified_name()));
        }
        let function = self.function_qualified_name();
        if !snapshot.functions.iter().any(|f| f.qualified_name() == function) {
            problems.push(format!("function {} not found in snapshot", function));
        }
        problems
    }
}

impl SchemaObject for IndexDefinition {
    fn key(&self) -> String {
        self.qualified_name()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Index(change)
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.table_qualified_name()]
    }

    fn changes(&self, other: &Self, _ignore_comments: bool) -> Vec<String> {
        let mut changes = Vec::new();

        if self.table != other.table {
            changes.push("table changed".to_string());
        }
        if !self.method.eq_ignore_ascii_case(&other.method) {
            changes.push("method changed".to_string());
        }
        if self.columns != other.columns {
            changes.push("columns changed".to_string());
        }
        if self.is_unique != other.is_unique || self.is_primary != other.is_primary {
            changes.push("uniqueness changed".to_string());
        }

        changes
    }

    fn problems(&self, snapshot: &SchemaDefinition) -> Vec<String> {
        match snapshot.table(&self.schema, &self.table) {
            None => vec![format!("table {} not found in snapshot", self.table_qualified_name())],
            Some(table) => self
                .columns
                .iter()
                .filter(|c| table.column(&c.name).is_none())
                .map(|c| format!("index column {} not found on table", c.name))
                .collect(),
        }
    }
}

impl SchemaObject for PolicyDefinition {
    fn key(&self) -> String {
        self.qualified_name()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Policy(change)
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.table_qualified_name()]
    }

    fn changes(&self, other: &Self, ignore_comments: bool) -> Vec<String> {
        let mut changes = Vec::new();

        if self.command != other.command {
            changes.push("command changed".to_string());
        }
        let own: BTreeSet<_> = self.roles.iter().collect();
        let theirs: BTreeSet<_> = other.roles.iter().collect();
        if own != theirs {
            changes.push("roles changed".to_string());
        }
        if !opt_sql_eq(&self.using, &other.using, ignore_comments) {
            changes.push("using expression changed".to_string());
        }
        if !opt_sql_eq(&self.with_check, &other.with_check, ignore_comments) {
            changes.push("with check expression changed".to_string());
        }
        if self.permissive != other.permissive {
            changes.push("permissive flag changed".to_string());
        }

        changes
    }

    fn problems(&self, snapshot: &SchemaDefinition) -> Vec<String> {
        if snapshot.table(&self.schema, &self.table).is_none() {
            vec![format!("table {} not found in snapshot", self.table_qualified_name())]
        } else {
            Vec::new()
        }
    }
}

impl SchemaObject for ExtensionDefinition {
    fn key(&self) -> String {
        self.name.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(change: ObjectChange<Self>) -> DifferenceDetails {
        DifferenceDetails::Extension(change)
    }

    fn changes(&self, other: &Self, _ignore_comments: bool) -> Vec<String> {
        if self.version == other.version {
            Vec::new()
        } else {
            vec![format!("version changed from {} to {}", other.version, self.version)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ColumnDefinition, TriggerEvent, TriggerTiming};
    use pretty_assertions::assert_eq;

    fn users() -> TableDefinition {
        TableDefinition::new("public", "users")
            .with_column(ColumnDefinition::new("id", "uuid").nullable(false))
            .with_column(ColumnDefinition::new("email", "varchar").max_length(255).nullable(false))
            .with_constraint(ConstraintDefinition::primary_key("users_pkey", &["id"]))
    }

    #[test]
    fn whitespace_only_body_change_is_not_an_alter() {
        let mut source = SchemaDefinition::new();
        source.add_function(FunctionDefinition::new(
            "public",
            "touch",
            "trigger",
            "plpgsql",
            "BEGIN\n  NEW.updated_at = now();\n  RETURN NEW;\nEND;",
        ));
        let mut target = SchemaDefinition::new();
        target.add_function(FunctionDefinition::new(
            "public",
            "touch",
            "trigger",
            "plpgsql",
            "BEGIN NEW.updated_at = now(); RETURN NEW; END;",
        ));

        let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn comment_changes_respect_ignore_comments() {
        let body = |comment: &str| format!("BEGIN -- {}\n RETURN NEW; END;", comment);
        let mut source = SchemaDefinition::new();
        source.add_function(FunctionDefinition::new("public", "f", "trigger", "plpgsql", &body("new")));
        let mut target = SchemaDefinition::new();
        target.add_function(FunctionDefinition::new("public", "f", "trigger", "plpgsql", &body("old")));

        let ignoring = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert!(ignoring.is_empty());

        let options = ComparisonOptions {
            ignore_comments: false,
            ..Default::default()
        };
        let strict = compare_schemas(&source, &target, &options).unwrap();
        assert_eq!(strict.differences.len(), 1);
        assert_eq!(strict.differences[0].action, DiffAction::Alter);
        assert_eq!(strict.differences[0].reason(), "body changed");
    }

    #[test]
    fn changes_inside_string_literals_are_detected() {
        for (source_default, target_default) in [("'A--north'", "'A--south'"), ("'a  b'", "'a b'")] {
            let mut source = SchemaDefinition::new();
            source.add_table(users().with_column(ColumnDefinition::new("region", "text").default(source_default)));
            let mut target = SchemaDefinition::new();
            target.add_table(users().with_column(ColumnDefinition::new("region", "text").default(target_default)));

            let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
            assert_eq!(diff.differences.len(), 1, "{} vs {}", source_default, target_default);
            assert_eq!(diff.differences[0].action, DiffAction::Alter);
        }
    }

    #[test]
    fn column_changes_are_listed_in_reason() {
        let mut source = SchemaDefinition::new();
        source.add_table(users().with_column(ColumnDefinition::new("phone", "text")));
        let mut target = SchemaDefinition::new();
        let mut old = users();
        old.columns[1].data_type = "text".to_string();
        old.columns[1].max_length = None;
        target.add_table(old);

        let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert_eq!(diff.differences.len(), 1);
        assert_eq!(
            diff.differences[0].reason(),
            "columns added: phone; columns changed: email"
        );
    }

    #[test]
    fn type_case_and_column_order_are_not_significant() {
        let mut source = SchemaDefinition::new();
        source.add_table(users());
        let mut reordered = users();
        reordered.columns.reverse();
        reordered.columns[0].data_type = "VARCHAR".to_string();
        let mut target = SchemaDefinition::new();
        target.add_table(reordered);

        let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn malformed_constraint_is_reported_in_reason() {
        let mut source = SchemaDefinition::new();
        source.add_table(
            users().with_constraint(ConstraintDefinition::unique("users_handle_key", &["handle"])),
        );

        let diff = compare_schemas(&source, &SchemaDefinition::new(), &ComparisonOptions::default())
            .unwrap();
        assert!(diff.differences[0]
            .reason()
            .contains("constraint users_handle_key references unknown column handle"));
    }

    #[test]
    fn ignore_patterns_match_name_or_qualified_name() {
        let mut source = SchemaDefinition::new();
        source.add_table(users());
        source.add_table(TableDefinition::new("audit", "events"));
        source.add_table(TableDefinition::new("public", "tmp_import"));

        let options = ComparisonOptions {
            custom_ignore_patterns: vec!["tmp_*".to_string(), "audit.*".to_string()],
            ..Default::default()
        };
        let diff = compare_schemas(&source, &SchemaDefinition::new(), &options).unwrap();

        assert_eq!(diff.differences.len(), 1);
        assert_eq!(diff.differences[0].name, "users");
    }

    #[test]
    fn invalid_ignore_pattern_is_rejected() {
        let options = ComparisonOptions {
            custom_ignore_patterns: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            SchemaComparator::new(&options),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn dependency_analysis_off_leaves_dependencies_empty() {
        let mut source = SchemaDefinition::new();
        source.add_table(users());
        source.add_trigger(TriggerDefinition::new(
            "public",
            "users",
            "t",
            TriggerTiming::Before,
            &[TriggerEvent::Update],
            "touch",
        ));
        let options = ComparisonOptions {
            dependency_analysis: false,
            ..Default::default()
        };

        let diff = compare_schemas(&source, &SchemaDefinition::new(), &options).unwrap();
        assert_eq!(diff.differences.len(), 2);
        assert!(diff.differences.iter().all(|d| d.dependencies.is_empty() && d.priority == 0));
    }

    #[test]
    fn trigger_event_order_is_not_significant() {
        let trigger = |events: &[TriggerEvent]| {
            TriggerDefinition::new("public", "users", "t", TriggerTiming::After, events, "audit")
        };
        let mut source = SchemaDefinition::new();
        source.add_trigger(trigger(&[TriggerEvent::Insert, TriggerEvent::Update]));
        let mut target = SchemaDefinition::new();
        target.add_trigger(trigger(&[TriggerEvent::Update, TriggerEvent::Insert]));

        let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn row_counts_prefer_target() {
        let mut source = SchemaDefinition::new();
        source.add_table(users().with_row_count(10));
        source.add_table(TableDefinition::new("public", "lofts").with_row_count(5));
        let mut target = SchemaDefinition::new();
        target.add_table(users().with_row_count(99));

        let diff = compare_schemas(&source, &target, &ComparisonOptions::default()).unwrap();
        assert_eq!(diff.table_row_counts.get("public.users"), Some(&99));
        assert_eq!(diff.table_row_counts.get("public.lofts"), Some(&5));
    }
}
