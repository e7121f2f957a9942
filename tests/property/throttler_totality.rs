//! Invariant 4: throttler totality. Every enqueued job resolves to exactly
//! one terminal [`Outcome`], whether it succeeds, fails, times out, is
//! dropped, is cancelled, or panics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use admission_throttler::{DropPolicy, Outcome, Priority, Throttler, ThrottlerConfig};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig { max_shrink_iters: 0,..ProptestConfig::with_cases(20) })]

    #[test]
    fn every_accepted_job_resolves_to_exactly_one_outcome(
        job_count in 1usize..30,
        worker_count in 1usize..4,
        fail_every in 1usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = ThrottlerConfig::builder()
                .worker_count(worker_count)
                .queue_capacity(job_count + 1)
                .drop_policy(DropPolicy::DropNewest)
                .default_timeout(Duration::from_secs(5))
                .build();

            let attempts = Arc::new(AtomicUsize::new(0));
            let attempts_clone = Arc::clone(&attempts);
            let throttler = Throttler::<usize, usize, String>::builder(config).build(move |payload: usize| {
                let n = attempts_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n % fail_every == 0 {
                        Err(format!("induced failure for job {payload}"))
                    } else {
                        Ok(payload)
                    }
                }
            });

            let mut receivers = Vec::new();
            for i in 0..job_count {
                let (rx, _cancel) = throttler.enqueue(i, Priority::Normal, None).expect("queue has room");
                receivers.push(rx);
            }

            let mut terminal_count = 0;
            for rx in receivers {
                match rx.await {
                    Ok(Outcome::Success(_))
                    | Ok(Outcome::Failed(_))
                    | Ok(Outcome::Dropped)
                    | Ok(Outcome::TimedOut)
                    | Ok(Outcome::Cancelled)
                    | Ok(Outcome::Panicked) => terminal_count += 1,
                    Err(_) => panic!("a job's result channel closed without a terminal outcome"),
                }
            }

            prop_assert_eq!(terminal_count, job_count, "every enqueued job must resolve exactly once");

            throttler.shutdown().await;
            Ok(())
        })?;
    }
}
