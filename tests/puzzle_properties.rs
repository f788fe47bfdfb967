//! Property tests for the puzzle engine and submission guard

use proptest::prelude::*;
use schulte_mining_client::{
    puzzle::{ClickOutcome, PuzzleEngine},
    submission::{SubmissionController, SubmitRefusal},
    BlockId, Position, PuzzleTask,
};
use std::collections::HashSet;

fn task_strategy() -> impl Strategy<Value = PuzzleTask> {
    (1usize..=5).prop_flat_map(|size| {
        let values: Vec<u32> = (1..=(size * size) as u32).collect();
        Just(values).prop_shuffle().prop_map(move |values| {
            let grid = values.chunks(size).map(<[u32]>::to_vec).collect();
            PuzzleTask::new(grid).unwrap()
        })
    })
}

fn loaded(task: &PuzzleTask) -> PuzzleEngine {
    let mut engine = PuzzleEngine::new();
    engine.load(BlockId::new(1), task);
    engine
}

proptest! {
    #[test]
    fn load_yields_unique_interactive_cells(task in task_strategy()) {
        let engine = loaded(&task);
        let total = task.size * task.size;

        prop_assert_eq!(engine.cells().len(), total);
        prop_assert!(engine.cells().iter().all(|cell| cell.is_interactive()));

        let values: HashSet<u32> = engine.cells().iter().map(|cell| cell.value).collect();
        prop_assert_eq!(values, (1..=total as u32).collect::<HashSet<u32>>());
        prop_assert_eq!(engine.next(), 1);
    }

    #[test]
    fn click_accepted_iff_value_is_next(
        task in task_strategy(),
        clicks in prop::collection::vec((0usize..5, 0usize..5), 0..60),
    ) {
        let mut engine = loaded(&task);

        for (row, col) in clicks {
            let position = Position::new(row, col);
            let picks_before = engine.picks().len();
            let next_before = engine.next();
            let value = task.value_at(position);
            let already_cleared = engine.picks().contains(&position);

            let outcome = engine.attempt_click(position);

            match value {
                Some(value) if !already_cleared && value == picks_before as u32 + 1 => {
                    prop_assert!(matches!(
                        outcome,
                        ClickOutcome::Accepted { .. } | ClickOutcome::Completed
                    ), "unexpected outcome: {:?}", outcome);
                    prop_assert_eq!(engine.picks().len(), picks_before + 1);
                }
                _ => {
                    prop_assert!(matches!(
                        outcome,
                        ClickOutcome::Rejected { .. } | ClickOutcome::Ignored
                    ), "unexpected outcome: {:?}", outcome);
                    prop_assert_eq!(engine.picks().len(), picks_before);
                    prop_assert_eq!(engine.next(), next_before);
                }
            }
            prop_assert_eq!(engine.next() as usize, engine.picks().len() + 1);
        }
    }

    #[test]
    fn completion_only_after_full_order(task in task_strategy()) {
        let mut engine = loaded(&task);
        let total = task.total() as u32;
        let controller = SubmissionController::new();

        for value in 1..=total {
            prop_assert!(!engine.is_complete());
            prop_assert_eq!(
                controller.check(&engine, false),
                Err(SubmitRefusal::Incomplete { remaining: (total - value + 1) as usize })
            );
            let position = engine.position_of(value).unwrap();
            engine.attempt_click(position);
        }

        prop_assert!(engine.is_complete());
        prop_assert!(controller.check(&engine, false).is_ok());
        let order: Vec<u32> = engine
            .picks()
            .iter()
            .map(|position| task.value_at(*position).unwrap())
            .collect();
        prop_assert_eq!(order, (1..=total).collect::<Vec<u32>>());
    }
}
