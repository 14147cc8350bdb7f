use sqlx::PgExecutor;

/// Returns the next globally unique clinic id.
///
/// The increment is a single upsert statement, so the missing-row default (0)
/// and the read-modify-write are one atomic operation: concurrent callers
/// serialize on the counter row and can never observe or assign the same
/// value. When called on a transaction handle, an aborted transaction rolls
/// the increment back, so committed ids stay consecutive with no gaps.
pub async fn next_clinic_id<'e, E>(executor: E) -> anyhow::Result<i64>
where
    E: PgExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO public.clinic_id_counter AS c (id, last_clinic_id)
         VALUES (1, 1)
         ON CONFLICT (id) DO UPDATE SET last_clinic_id = c.last_clinic_id + 1
         RETURNING last_clinic_id",
    )
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Current counter value without incrementing (0 if the row is absent).
pub async fn current_clinic_id<'e, E>(executor: E) -> anyhow::Result<i64>
where
    E: PgExecutor<'e>,
{
    let id: Option<i64> = sqlx::query_scalar(
        "SELECT last_clinic_id FROM public.clinic_id_counter WHERE id = 1",
    )
    .fetch_optional(executor)
    .await?;
    Ok(id.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    /// In-memory model of the upsert: a missing row behaves as 0, every draw
    /// stores and returns last + 1, and an aborted transaction restores the
    /// pre-draw value.
    struct CounterModel {
        row: Option<i64>,
    }

    impl CounterModel {
        fn new() -> Self {
            Self { row: None }
        }

        fn draw(&mut self) -> i64 {
            let next = self.row.unwrap_or(0) + 1;
            self.row = Some(next);
            next
        }

        fn draw_then_abort(&mut self) {
            let before = self.row;
            let _ = self.draw();
            self.row = before;
        }
    }

    #[test]
    fn sequential_draws_are_distinct_and_consecutive() {
        let mut counter = CounterModel::new();
        let ids: Vec<i64> = (0..100).map(|_| counter.draw()).collect();

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, i as i64 + 1);
        }
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }

    #[test]
    fn first_draw_on_missing_row_is_one() {
        let mut counter = CounterModel::new();
        assert_eq!(counter.draw(), 1);
    }

    #[test]
    fn aborted_draws_leave_no_gaps() {
        let mut counter = CounterModel::new();
        assert_eq!(counter.draw(), 1);
        counter.draw_then_abort();
        counter.draw_then_abort();
        assert_eq!(counter.draw(), 2);
    }
}
