//! Duration estimates for migration operations
//!
//! The generator asks a [`CostModel`] for every operation it emits. The default model
//! uses flat per-kind costs and scales work that touches table rows by the number of
//! batches needed to cover the table.

use crate::schema::diff::{DiffAction, ObjectType};

/// What is being estimated
#[derive(Debug, Clone, Copy)]
pub struct CostInput<'a> {
    pub object_type: ObjectType,
    pub action: DiffAction,
    pub object_name: &'a str,
    /// Approximate rows in the affected table, when known
    pub row_count: Option<u64>,
    pub batch_size: u64,
}

impl CostInput<'_> {
    /// Batches needed to cover the affected rows; zero when unknown
    pub fn batches(&self) -> u64 {
        match self.row_count {
            Some(rows) => rows.div_ceil(self.batch_size.max(1)),
            None => 0,
        }
    }
}

/// Estimates operation durations in milliseconds
pub trait CostModel: Send + Sync {
    fn estimate(&self, input: &CostInput<'_>) -> u64;
}

/// Per-kind base costs plus per-batch costs for row-touching work
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCostModel;

impl DefaultCostModel {
    const TABLE_BATCH_MS: u64 = 50;
    const INDEX_BATCH_MS: u64 = 100;

    fn base(object_type: ObjectType, action: DiffAction) -> u64 {
        use DiffAction::*;
        use ObjectType::*;

        match (object_type, action) {
            (Table, Create) => 50,
            (Table, Alter) => 200,
            (Table, Drop) => 100,
            (Function, Drop) => 20,
            (Function, _) => 30,
            (Index, Create) => 100,
            (Index, Alter) => 150,
            (Index, Drop) => 50,
            (Trigger, _) => 20,
            (Policy, _) => 15,
            (Extension, Create) => 500,
            (Extension, Alter) => 300,
            (Extension, Drop) => 200,
        }
    }
}

impl CostModel for DefaultCostModel {
    fn estimate(&self, input: &CostInput<'_>) -> u64 {
        let base = Self::base(input.object_type, input.action);
        let per_batch = match (input.object_type, input.action) {
            (ObjectType::Table, DiffAction::Alter | DiffAction::Drop) => Self::TABLE_BATCH_MS,
            (ObjectType::Index, DiffAction::Create | DiffAction::Alter) => Self::INDEX_BATCH_MS,
            _ => 0,
        };
        base + per_batch * input.batches()
    }
}

/// Same cost for every operation
#[derive(Debug, Clone, Copy)]
pub struct FlatCostModel(pub u64);

impl CostModel for FlatCostModel {
    fn estimate(&self, _input: &CostInput<'_>) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn input(object_type: ObjectType, action: DiffAction, rows: Option<u64>) -> CostInput<'static> {
        CostInput {
            object_type,
            action,
            object_name: "public.bookings",
            row_count: rows,
            batch_size: 1000,
        }
    }

    #[rstest]
    #[case(None, 0)]
    #[case(Some(0), 0)]
    #[case(Some(1), 1)]
    #[case(Some(1000), 1)]
    #[case(Some(1001), 2)]
    fn batches_round_up(#[case] rows: Option<u64>, #[case] expected: u64) {
        assert_eq!(input(ObjectType::Table, DiffAction::Alter, rows).batches(), expected);
    }

    #[test]
    fn index_builds_scale_with_rows() {
        let model = DefaultCostModel;
        let small = model.estimate(&input(ObjectType::Index, DiffAction::Create, Some(10)));
        let large = model.estimate(&input(ObjectType::Index, DiffAction::Create, Some(50_000)));
        assert_eq!(small, 200);
        assert_eq!(large, 100 + 50 * 100);
    }

    #[test]
    fn table_creates_ignore_rows() {
        let model = DefaultCostModel;
        assert_eq!(model.estimate(&input(ObjectType::Table, DiffAction::Create, Some(1_000_000))), 50);
    }
}
