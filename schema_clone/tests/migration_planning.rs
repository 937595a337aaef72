//! End-to-end checks of comparison and migration generation

use pretty_assertions::assert_eq;
use regex::Regex;
use rstest::*;

use schema_clone::config::{ComparisonOptions, MigrationGeneratorOptions};
use schema_clone::schema::diff::{DiffAction, DifferenceDetails, ObjectChange, ObjectType};
use schema_clone::schema::script::{MigrationOperation, RiskLevel};
use schema_clone::schema::types::{
    ColumnDefinition, ConstraintDefinition, ExtensionDefinition, FunctionDefinition,
    IndexDefinition, PolicyCommand, PolicyDefinition, SchemaDefinition, TableDefinition,
    TriggerDefinition, TriggerEvent, TriggerTiming,
};
use schema_clone::{compare_schemas, generate_migration_script, Error, SchemaDiff};

fn users_table() -> TableDefinition {
    TableDefinition::new("public", "users")
        .with_column(ColumnDefinition::new("id", "uuid").nullable(false))
        .with_column(
            ColumnDefinition::new("email", "varchar")
                .max_length(255)
                .nullable(false),
        )
        .with_constraint(ConstraintDefinition::primary_key("users_pkey", &["id"]))
        .with_constraint(ConstraintDefinition::unique("users_email_key", &["email"]))
}

fn audit_function() -> FunctionDefinition {
    FunctionDefinition::new(
        "public",
        "audit_function",
        "trigger",
        "plpgsql",
        "BEGIN\n  INSERT INTO audit_log(row_id) VALUES (NEW.id);\n  RETURN NEW;\nEND;",
    )
}

fn audit_trigger() -> TriggerDefinition {
    TriggerDefinition::new(
        "public",
        "users",
        "audit_trigger",
        TriggerTiming::After,
        &[TriggerEvent::Insert, TriggerEvent::Update],
        "audit_function",
    )
}

#[fixture]
fn production() -> SchemaDefinition {
    let mut schema = SchemaDefinition::new();
    schema.add_table(
        users_table()
            .with_column(ColumnDefinition::new("phone", "text"))
            .with_row_count(40_000),
    );
    schema.add_table(
        TableDefinition::new("public", "bookings")
            .with_column(ColumnDefinition::new("id", "uuid").nullable(false))
            .with_column(ColumnDefinition::new("guest_id", "uuid").nullable(false))
            .with_column(ColumnDefinition::new("check_in", "date").nullable(false))
            .with_constraint(ConstraintDefinition::primary_key("bookings_pkey", &["id"]))
            .with_constraint(ConstraintDefinition::foreign_key(
                "bookings_guest_fk",
                &["guest_id"],
                "public",
                "users",
                &["id"],
            ))
            .with_row_count(250_000),
    );
    schema.add_function(audit_function());
    schema.add_trigger(audit_trigger());
    schema.add_index(IndexDefinition::new(
        "public",
        "bookings",
        "bookings_check_in_idx",
        &["check_in"],
    ));
    schema.add_policy(
        PolicyDefinition::new("public", "bookings", "guest_reads_own", PolicyCommand::Select)
            .with_roles(&["authenticated"])
            .using("guest_id = auth.uid()"),
    );
    schema.add_extension(ExtensionDefinition::new("pgcrypto", "1.3"));
    schema
}

#[fixture]
fn staging() -> SchemaDefinition {
    let mut schema = SchemaDefinition::new();
    schema.add_table(users_table().with_row_count(300));
    schema.add_table(
        TableDefinition::new("public", "legacy_imports")
            .with_column(ColumnDefinition::new("id", "bigint").identity())
            .with_column(ColumnDefinition::new("user_id", "uuid"))
            .with_constraint(ConstraintDefinition::foreign_key(
                "legacy_imports_user_fk",
                &["user_id"],
                "public",
                "users",
                &["id"],
            )),
    );
    schema.add_index(IndexDefinition::new(
        "public",
        "legacy_imports",
        "legacy_imports_user_idx",
        &["user_id"],
    ));
    schema.add_extension(ExtensionDefinition::new("pgcrypto", "1.2"));
    schema
}

fn diff_of(source: &SchemaDefinition, target: &SchemaDefinition) -> SchemaDiff {
    compare_schemas(source, target, &ComparisonOptions::default()).unwrap()
}

#[rstest]
fn test_comparing_a_schema_with_itself_is_empty(production: SchemaDefinition) {
    let diff = diff_of(&production, &production);
    assert!(diff.is_empty());
    assert_eq!(diff.summary.total_differences, 0);
}

#[rstest]
fn test_every_missing_object_is_created(production: SchemaDefinition) {
    let diff = diff_of(&production, &SchemaDefinition::new());

    assert_eq!(diff.differences.len(), production.object_count());
    assert!(diff.differences.iter().all(|d| d.action == DiffAction::Create));
}

#[rstest]
fn test_every_extra_object_is_dropped(staging: SchemaDefinition) {
    let diff = diff_of(&SchemaDefinition::new(), &staging);

    assert_eq!(diff.differences.len(), staging.object_count());
    assert!(diff.differences.iter().all(|d| d.action == DiffAction::Drop));
}

#[rstest]
fn test_mixed_changes(production: SchemaDefinition, staging: SchemaDefinition) {
    let diff = diff_of(&production, &staging);

    let users = diff.find(ObjectType::Table, "users").unwrap();
    assert_eq!(users.action, DiffAction::Alter);
    assert_eq!(users.reason(), "columns added: phone");

    assert_eq!(diff.find(ObjectType::Table, "bookings").unwrap().action, DiffAction::Create);
    assert_eq!(diff.find(ObjectType::Table, "legacy_imports").unwrap().action, DiffAction::Drop);
    assert_eq!(
        diff.find(ObjectType::Extension, "pgcrypto").unwrap().reason(),
        "version changed from 1.2 to 1.3"
    );
    assert_eq!(diff.summary.alters, 2);
}

#[rstest]
fn test_dependency_order_follows_action(production: SchemaDefinition, staging: SchemaDefinition) {
    for (source, target) in [
        (&production, &SchemaDefinition::new()),
        (&production, &staging),
    ] {
        let diff = diff_of(source, target);
        for difference in &diff.differences {
            for dependency in &difference.dependencies {
                let provider = diff.differences.iter().find(|other| {
                    matches!(other.object_type(), ObjectType::Table | ObjectType::Function)
                        && &other.qualified_name() == dependency
                });
                if let Some(provider) = provider {
                    if difference.action == DiffAction::Drop {
                        assert!(
                            difference.priority < provider.priority,
                            "{} must be dropped before {}",
                            difference.qualified_name(),
                            dependency
                        );
                    } else {
                        assert!(
                            provider.priority < difference.priority,
                            "{} must come before {}",
                            dependency,
                            difference.qualified_name()
                        );
                    }
                }
            }
        }
    }
}

#[rstest]
fn test_summary_matches_differences(production: SchemaDefinition, staging: SchemaDefinition) {
    let diff = diff_of(&production, &staging);
    let summary = &diff.summary;

    assert_eq!(summary.total_differences, diff.differences.len());
    let per_type: usize = ObjectType::ALL.iter().map(|t| summary.count_for(*t)).sum();
    assert_eq!(per_type, summary.total_differences);
    assert_eq!(
        summary.creates + summary.alters + summary.drops,
        summary.total_differences
    );
    for object_type in ObjectType::ALL {
        assert_eq!(summary.count_for(object_type), diff.of_type(object_type).count());
    }
}

#[rstest]
fn test_script_invariants(production: SchemaDefinition, staging: SchemaDefinition) {
    let shape = Regex::new(r"(?i)^(CREATE|ALTER|DROP|INSERT|UPDATE|DELETE)").unwrap();
    let options = MigrationGeneratorOptions {
        add_comments: true,
        ..Default::default()
    };

    for (source, target) in [
        (&production, &SchemaDefinition::new()),
        (&production, &staging),
        (&SchemaDefinition::new(), &staging),
    ] {
        let diff = diff_of(source, target);
        let script = generate_migration_script(&diff, &options).unwrap();

        let total: u64 = script.operations.iter().map(|op| op.estimated_duration).sum();
        assert_eq!(script.estimated_duration, total);

        let worst = script.operations.iter().map(|op| op.risk_level).max().unwrap();
        assert_eq!(script.risk_level, worst);

        for operation in script.operations.iter().chain(&script.rollback_operations) {
            if operation.description.contains("Drop") {
                assert!(operation.risk_level >= RiskLevel::Medium, "{}", operation.description);
            }
            if operation.description.contains("Create") {
                assert!(operation.risk_level <= RiskLevel::Medium, "{}", operation.description);
            }

            let body: Vec<&str> = operation
                .sql
                .lines()
                .skip_while(|line| line.trim_start().starts_with("--"))
                .collect();
            let body = body.join("\n");
            assert!(shape.is_match(&body), "{}", operation.sql);
            assert!(body.trim_end().ends_with(';'), "{}", operation.sql);
        }

        assert!(!script.rollback_operations.is_empty());
        for operation in &script.operations {
            if let Some(table) = operation.description.strip_prefix("Create table ") {
                let expected = format!("Drop table {}", table);
                assert!(
                    script.rollback_operations.iter().any(|r| r.description == expected),
                    "missing rollback for {}",
                    table
                );
            }
        }

        script.validate().unwrap();
    }
}

#[test]
fn test_dropped_dependents_go_first_and_come_back_last() {
    let mut target = SchemaDefinition::new();
    target.add_table(users_table());
    target.add_table(
        TableDefinition::new("public", "orders")
            .with_column(ColumnDefinition::new("id", "uuid").nullable(false))
            .with_column(ColumnDefinition::new("user_id", "uuid").nullable(false))
            .with_constraint(ConstraintDefinition::foreign_key(
                "orders_user_fk",
                &["user_id"],
                "public",
                "users",
                &["id"],
            )),
    );
    target.add_index(IndexDefinition::new(
        "public",
        "orders",
        "orders_user_idx",
        &["user_id"],
    ));

    let diff = diff_of(&SchemaDefinition::new(), &target);
    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();

    let position = |operations: &[MigrationOperation], needle: &str| {
        operations
            .iter()
            .position(|op| op.sql.contains(needle))
            .unwrap()
    };

    let forward = &script.operations;
    let drop_index = position(forward, "DROP INDEX");
    let drop_orders = position(forward, "DROP TABLE IF EXISTS public.orders;");
    let drop_users = position(forward, "DROP TABLE IF EXISTS public.users;");
    assert!(drop_index < drop_orders);
    assert!(drop_orders < drop_users);

    let rollback = &script.rollback_operations;
    let create_users = position(rollback, "CREATE TABLE public.users");
    let create_orders = position(rollback, "CREATE TABLE public.orders");
    let create_index = position(rollback, "CREATE INDEX");
    assert!(create_users < create_orders);
    assert!(create_orders < create_index);
}

#[rstest]
fn test_staging_rollback_recreates_tables_before_indexes(staging: SchemaDefinition) {
    let diff = diff_of(&SchemaDefinition::new(), &staging);
    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();

    let names: Vec<&str> = script
        .rollback_operations
        .iter()
        .map(|op| op.object_name.as_str())
        .collect();
    let at = |name: &str| names.iter().position(|n| *n == name).unwrap();

    assert!(at("public.users") < at("public.legacy_imports"));
    assert!(at("public.legacy_imports") < at("public.legacy_imports_user_idx"));
}

#[rstest]
fn test_rollback_mirrors_forward_order(production: SchemaDefinition) {
    let diff = diff_of(&production, &SchemaDefinition::new());
    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();

    let forward: Vec<&str> = script.operations.iter().map(|o| o.object_name.as_str()).collect();
    let mut rollback: Vec<&str> = script
        .rollback_operations
        .iter()
        .map(|o| o.object_name.as_str())
        .collect();
    rollback.reverse();
    assert_eq!(forward, rollback);
}

#[test]
fn test_create_without_after_is_rejected() {
    let mut source = SchemaDefinition::new();
    source.add_table(users_table());
    let mut diff = diff_of(&source, &SchemaDefinition::new());

    diff.differences[0].details = DifferenceDetails::Table(ObjectChange {
        before: None,
        after: None,
        reason: "broken".to_string(),
    });

    let result = generate_migration_script(&diff, &MigrationGeneratorOptions::default());
    assert!(matches!(result, Err(Error::InvalidOperation { .. })));
}

#[test]
fn test_simple_create_scenario() {
    let mut source = SchemaDefinition::new();
    source.add_table(users_table());

    let diff = diff_of(&source, &SchemaDefinition::new());
    assert_eq!(diff.differences.len(), 1);
    assert_eq!(diff.differences[0].object_type(), ObjectType::Table);
    assert_eq!(diff.differences[0].action, DiffAction::Create);
    assert_eq!(diff.differences[0].name, "users");

    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();
    let sql = &script.operations[0].sql;
    assert!(sql.contains("CREATE TABLE"));
    assert!(sql.contains("users"));
    assert!(sql.contains("id uuid"));
    assert!(sql.contains("NOT NULL"));
    assert_eq!(script.risk_level, RiskLevel::Low);
}

#[test]
fn test_trigger_dependency_scenario() {
    let mut source = SchemaDefinition::new();
    source.add_table(users_table());
    source.add_function(audit_function());
    source.add_trigger(audit_trigger());

    let diff = diff_of(&source, &SchemaDefinition::new());
    assert_eq!(diff.summary.creates, 3);

    let trigger = diff.find(ObjectType::Trigger, "audit_trigger").unwrap();
    assert_eq!(
        trigger.dependencies,
        vec!["public.users".to_string(), "public.audit_function".to_string()]
    );

    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();
    let position = |needle: &str| {
        script
            .operations
            .iter()
            .position(|op| op.sql.contains(needle))
            .unwrap()
    };
    let table = position("CREATE TABLE public.users");
    let function = position("CREATE OR REPLACE FUNCTION public.audit_function");
    let trigger = position("CREATE TRIGGER audit_trigger");
    assert!(table < trigger);
    assert!(function < trigger);
    assert!(script.operations[trigger]
        .sql
        .contains("AFTER INSERT OR UPDATE ON public.users FOR EACH ROW EXECUTE FUNCTION public.audit_function();"));
}

#[rstest]
fn test_identical_schemas_produce_an_empty_script(production: SchemaDefinition) {
    let diff = diff_of(&production, &production.clone());
    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();

    assert!(script.is_empty());
    assert!(script.rollback_operations.is_empty());
    assert_eq!(script.estimated_duration, 0);
    assert_eq!(script.risk_level, RiskLevel::Low);
}

#[rstest]
fn test_large_tables_cost_more(production: SchemaDefinition, staging: SchemaDefinition) {
    let diff = diff_of(&production, &staging);
    let script = generate_migration_script(&diff, &MigrationGeneratorOptions::default()).unwrap();

    let index = script
        .operations
        .iter()
        .find(|op| op.object_name == "public.bookings_check_in_idx")
        .unwrap();
    // 250 batches of 1000 rows on top of the base build cost
    assert_eq!(index.estimated_duration, 100 + 250 * 100);
    assert!(index.sql.contains("CONCURRENTLY"));
}

#[rstest]
fn test_timeout_escalates_risk(production: SchemaDefinition, staging: SchemaDefinition) {
    let diff = diff_of(&production, &staging);
    let options = MigrationGeneratorOptions {
        timeout_per_operation: Some(1_000),
        ..Default::default()
    };
    let script = generate_migration_script(&diff, &options).unwrap();

    let index = script
        .operations
        .iter()
        .find(|op| op.object_name == "public.bookings_check_in_idx")
        .unwrap();
    assert_eq!(index.risk_level, RiskLevel::Medium);
}

#[rstest]
fn test_ignore_flags_skip_categories(production: SchemaDefinition) {
    let options = ComparisonOptions {
        ignore_indexes: true,
        ignore_policies: true,
        ignore_extensions: true,
        ..Default::default()
    };
    let diff = compare_schemas(&production, &SchemaDefinition::new(), &options).unwrap();

    assert_eq!(diff.summary.indexes, 0);
    assert_eq!(diff.summary.policies, 0);
    assert_eq!(diff.summary.extensions, 0);
    assert_eq!(diff.summary.tables, 2);
}
