use std::future::Future;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::executor::TaskResult;
use crate::plan::PlanTask;

/// Runs one parallel stage.
///
/// # Arguments
///
/// * `tasks` - Stage tasks in plan order
/// * `max_parallel` - Tasks allowed in flight at once, 0 for no limit
/// * `cancel` - Checked before each task takes a slot
/// * `run_one` - Executes a single task
///
/// # Returns
///
/// Results of the tasks that ran, in plan order. Tasks that never got a slot
/// because the run was cancelled have no result.
pub async fn execute_stage_parallel<'a, F, Fut>(
    tasks: &[&'a PlanTask],
    max_parallel: usize,
    cancel: &CancellationToken,
    run_one: F,
) -> Vec<TaskResult>
where
    F: Fn(&'a PlanTask) -> Fut,
    Fut: Future<Output = TaskResult>,
{
    let limit = if max_parallel == 0 {
        tasks.len()
    } else {
        max_parallel
    };
    let sem = Semaphore::new(limit.max(1));
    let run_one = &run_one;
    let sem = &sem;
    let mut futs = FuturesUnordered::new();

    for (idx, task) in tasks.iter().copied().enumerate() {
        futs.push(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (idx, None),
                permit = sem.acquire() => permit,
            };
            let Ok(_permit) = permit else {
                return (idx, None);
            };
            if cancel.is_cancelled() {
                return (idx, None);
            }
            (idx, Some(run_one(task).await))
        });
    }

    let mut slots: Vec<Option<TaskResult>> = (0..tasks.len()).map(|_| None).collect();
    while let Some((idx, result)) = futs.next().await {
        slots[idx] = result;
    }
    slots.into_iter().flatten().collect()
}
