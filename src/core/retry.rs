use crate::config::RunConfig;
use crate::core::batcher;
use crate::core::dispatch::Dispatcher;
use crate::domain::model::{Batch, BatchOutcome, RawResult, RetrievalStats};
use crate::domain::ports::LookupClient;
use std::collections::{HashMap, HashSet};

/// Everything the batch rounds produced.
#[derive(Debug, Default)]
pub struct BatchRounds {
    pub results: Vec<RawResult>,
    pub failed: Vec<Batch>,
    pub rounds_run: usize,
}

#[derive(Debug)]
pub struct Retrieval {
    /// One record per input number, in input order.
    pub results: Vec<RawResult>,
    pub stats: RetrievalStats,
}

/// Drives batch rounds, then one individual pass for records without enrichment.
pub struct RetryOrchestrator {
    dispatcher: Dispatcher,
    batch_size: usize,
    retries: usize,
}

impl RetryOrchestrator {
    pub fn new(dispatcher: Dispatcher, batch_size: usize, retries: usize) -> Self {
        Self {
            dispatcher,
            batch_size,
            retries,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            Dispatcher::from_config(config),
            config.batch_size,
            config.retries,
        )
    }

    /// `numbers` must already be deduplicated.
    pub async fn retrieve<C>(&self, client: &C, numbers: &[String]) -> Retrieval
    where
        C: LookupClient + ?Sized,
    {
        let batches = batcher::into_batches(numbers, self.batch_size);
        let mut stats = RetrievalStats {
            unique_numbers: numbers.len(),
            batches: batches.len(),
            ..RetrievalStats::default()
        };

        let rounds = self.run_batch_rounds(client, batches).await;
        stats.rounds_run = rounds.rounds_run;
        stats.dropped_batches = rounds.failed.len();
        if !rounds.failed.is_empty() {
            tracing::warn!(
                "⚠️ {} batches still failing after {} rounds, moving their numbers to individual retry",
                rounds.failed.len(),
                rounds.rounds_run
            );
        }

        let mut results = rounds.results;
        let missing: Vec<RawResult> = {
            let answered: HashSet<&str> = results
                .iter()
                .filter_map(|r| r.original.as_deref())
                .collect();
            numbers
                .iter()
                .filter(|n| !answered.contains(n.as_str()))
                .map(RawResult::unanswered)
                .collect()
        };
        results.extend(missing);

        let (results, retried) = self.retry_incomplete(client, results).await;
        let results = reconcile(numbers, results);

        let retried: HashSet<&str> = retried.iter().map(String::as_str).collect();
        stats.tier2_attempted = retried.len();
        stats.tier2_recovered = results
            .iter()
            .filter(|r| r.is_complete())
            .filter(|r| r.original.as_deref().is_some_and(|n| retried.contains(n)))
            .count();
        if !retried.is_empty() {
            tracing::info!(
                "Individual retry recovered {} of {} records",
                stats.tier2_recovered,
                stats.tier2_attempted
            );
        }

        Retrieval { results, stats }
    }

    /// Rounds `1..=retries`. Stops early once a round has no failed batch.
    pub async fn run_batch_rounds<C>(&self, client: &C, batches: Vec<Batch>) -> BatchRounds
    where
        C: LookupClient + ?Sized,
    {
        let mut rounds = BatchRounds {
            failed: batches,
            ..BatchRounds::default()
        };

        for attempt in 1..=self.retries {
            if rounds.failed.is_empty() {
                break;
            }
            rounds.rounds_run = attempt;

            let working = std::mem::take(&mut rounds.failed);
            tracing::info!("🔁 Attempt {} for {} batches", attempt, working.len());
            let outcomes = self.dispatcher.run_round(client, &working).await;

            // outcomes are merged only after the whole round finished
            for (batch, outcome) in working.into_iter().zip(outcomes) {
                match outcome {
                    BatchOutcome::Answered(results) => rounds.results.extend(results),
                    BatchOutcome::Empty | BatchOutcome::Failed(_) => rounds.failed.push(batch),
                }
            }

            if rounds.failed.is_empty() {
                tracing::info!("✅ All batches succeeded.");
            } else if attempt < self.retries {
                tracing::warn!("⚠️ {} batches failed, retrying...", rounds.failed.len());
            } else {
                tracing::warn!("⚠️ {} batches failed on the last attempt", rounds.failed.len());
            }
        }

        rounds
    }

    /// Re-submits each incomplete number on its own, one request at a time.
    /// Returns the merged records and the numbers that were looked up again.
    ///
    /// A one-element request can only be answering the number it carried, so
    /// every answer is attributed to that number whatever its `original` says.
    pub async fn retry_incomplete<C>(
        &self,
        client: &C,
        results: Vec<RawResult>,
    ) -> (Vec<RawResult>, Vec<String>)
    where
        C: LookupClient + ?Sized,
    {
        let (complete, incomplete): (Vec<_>, Vec<_>) =
            results.into_iter().partition(RawResult::is_complete);

        if incomplete.is_empty() {
            tracing::info!("✅ No incomplete results found.");
            return (complete, Vec::new());
        }

        let retry_batches: Vec<Batch> = {
            let mut queued = HashSet::new();
            incomplete
                .iter()
                .filter_map(|r| r.original.as_deref())
                .filter(|number| queued.insert(*number))
                .map(Batch::single)
                .collect()
        };
        tracing::info!(
            "🔍 Retrying {} incomplete records individually...",
            retry_batches.len()
        );

        let serial = self.dispatcher.serialized();
        let outcomes = serial.run_round(client, &retry_batches).await;

        let mut retried = Vec::with_capacity(retry_batches.len());
        let mut fresh: HashMap<String, Vec<RawResult>> = HashMap::new();
        for (batch, outcome) in retry_batches.into_iter().zip(outcomes) {
            let Some(number) = batch.into_numbers().into_iter().next() else {
                continue;
            };
            if let BatchOutcome::Answered(answers) = outcome {
                let answers = answers
                    .into_iter()
                    .map(|answer| RawResult {
                        original: Some(number.clone()),
                        ..answer
                    })
                    .collect();
                fresh.insert(number.clone(), answers);
            }
            retried.push(number);
        }

        let mut merged = complete;
        for record in incomplete {
            let answers = record.original.as_ref().and_then(|n| fresh.remove(n));
            match answers {
                Some(answers) => merged.extend(answers),
                None => merged.push(record),
            }
        }

        (merged, retried)
    }
}

/// Keeps exactly one record per input number, in input order. A complete
/// record wins over an incomplete one for the same number.
fn reconcile(numbers: &[String], results: Vec<RawResult>) -> Vec<RawResult> {
    let position: HashMap<&str, usize> = numbers
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut slots: Vec<Option<RawResult>> = vec![None; numbers.len()];

    for result in results {
        let Some(&index) = result.original.as_deref().and_then(|n| position.get(n)) else {
            tracing::warn!(
                "Discarding result for unknown number {:?}",
                result.original
            );
            continue;
        };
        let slot = &mut slots[index];
        let replace = match slot {
            None => true,
            Some(existing) => !existing.is_complete() && result.is_complete(),
        };
        if replace {
            *slot = Some(result);
        }
    }

    slots
        .into_iter()
        .zip(numbers)
        .map(|(slot, number)| slot.unwrap_or_else(|| RawResult::unanswered(number.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CallerName, Enrichment, LookupEnvelope};
    use crate::utils::error::{Result, ValidatorError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Script = Box<dyn Fn(&[String], usize) -> Result<Vec<RawResult>> + Send + Sync>;

    /// Answers through a closure given the batch and how often that exact
    /// batch was seen before.
    struct ScriptedClient {
        script: Script,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedClient {
        fn new(
            script: impl Fn(&[String], usize) -> Result<Vec<RawResult>> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_for(&self, numbers: &[&str]) -> usize {
            self.calls()
                .iter()
                .filter(|call| call.iter().map(String::as_str).eq(numbers.iter().copied()))
                .count()
        }
    }

    #[async_trait]
    impl LookupClient for ScriptedClient {
        async fn lookup(&self, batch: &Batch) -> Result<Vec<RawResult>> {
            let seen = {
                let mut calls = self.calls.lock().unwrap();
                let seen = calls.iter().filter(|c| c.as_slice() == batch.numbers()).count();
                calls.push(batch.numbers().to_vec());
                seen
            };
            (self.script)(batch.numbers(), seen)
        }
    }

    fn complete(number: &str) -> RawResult {
        RawResult {
            original: Some(number.to_string()),
            formatted_number: Some(format!("+1 {}", number)),
            lookup_data: Some(LookupEnvelope {
                data: Some(Enrichment {
                    caller_name: Some(CallerName {
                        caller_name: Some("Jane Doe".to_string()),
                    }),
                    ..Enrichment::default()
                }),
            }),
            ..RawResult::default()
        }
    }

    fn resolved_without_enrichment(number: &str) -> RawResult {
        RawResult {
            original: Some(number.to_string()),
            formatted_number: Some(format!("+1 {}", number)),
            ..RawResult::default()
        }
    }

    fn orchestrator(batch_size: usize, retries: usize) -> RetryOrchestrator {
        let no_throttle = (Duration::ZERO, Duration::ZERO);
        let dispatcher = Dispatcher::new(2, Duration::from_secs(5), no_throttle);
        RetryOrchestrator::new(dispatcher, batch_size, retries)
    }

    fn numbers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reliable_service_finishes_after_one_round() {
        let client = ScriptedClient::new(|batch, _| Ok(batch.iter().map(|n| complete(n)).collect()));
        let input = numbers(&["1", "2", "3", "4", "5"]);

        let rounds = orchestrator(2, 3)
            .run_batch_rounds(&client, batcher::into_batches(&input, 2))
            .await;

        assert_eq!(rounds.rounds_run, 1);
        assert!(rounds.failed.is_empty());
        assert_eq!(rounds.results.len(), 5);
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_service_runs_exactly_retries_rounds() {
        let client = ScriptedClient::new(|_, _| Err(ValidatorError::HttpStatusError { status: 503 }));
        let input = numbers(&["1", "2", "3", "4"]);
        let orchestrator = orchestrator(2, 3);

        let rounds = orchestrator
            .run_batch_rounds(&client, batcher::into_batches(&input, 2))
            .await;
        assert_eq!(rounds.rounds_run, 3);
        assert_eq!(rounds.failed.len(), 2);
        assert!(rounds.results.is_empty());
        assert_eq!(client.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_failing_service_sends_every_number_to_individual_retry() {
        let client = ScriptedClient::new(|_, _| Err(ValidatorError::HttpStatusError { status: 503 }));
        let input = numbers(&["1", "2", "3", "4"]);

        let retrieval = orchestrator(2, 3).retrieve(&client, &input).await;

        assert_eq!(retrieval.stats.rounds_run, 3);
        assert_eq!(retrieval.stats.dropped_batches, 2);
        assert_eq!(retrieval.stats.tier2_attempted, 4);
        assert_eq!(retrieval.stats.tier2_recovered, 0);
        for number in ["1", "2", "3", "4"] {
            assert_eq!(client.calls_for(&[number]), 1);
        }
        let originals: Vec<_> = retrieval.results.iter().map(|r| r.original.clone().unwrap()).collect();
        assert_eq!(originals, input);
        assert!(retrieval.results.iter().all(|r| !r.is_complete()));
    }

    #[tokio::test]
    async fn test_empty_answer_is_retried_like_a_failure() {
        let client = ScriptedClient::new(|batch, seen| {
            if seen == 0 {
                Ok(vec![])
            } else {
                Ok(batch.iter().map(|n| complete(n)).collect())
            }
        });
        let input = numbers(&["1", "2"]);

        let retrieval = orchestrator(2, 3).retrieve(&client, &input).await;

        assert_eq!(retrieval.stats.rounds_run, 2);
        assert_eq!(retrieval.stats.dropped_batches, 0);
        assert_eq!(retrieval.stats.tier2_attempted, 0);
        assert_eq!(client.calls_for(&["1", "2"]), 2);
        assert!(retrieval.results.iter().all(RawResult::is_complete));
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_touch_other_batches() {
        let client = ScriptedClient::new(|batch, _| {
            if batch[0] == "3" {
                Err(ValidatorError::TimeoutError { seconds: 30 })
            } else {
                Ok(batch.iter().map(|n| complete(n)).collect())
            }
        });
        let input = numbers(&["1", "2", "3", "4"]);

        let rounds = orchestrator(2, 2)
            .run_batch_rounds(&client, batcher::into_batches(&input, 2))
            .await;

        assert_eq!(rounds.rounds_run, 2);
        assert_eq!(rounds.failed, batcher::into_batches(&numbers(&["3", "4"]), 2));
        assert_eq!(rounds.results.len(), 2);
        assert_eq!(client.calls_for(&["1", "2"]), 1);
        assert_eq!(client.calls_for(&["3", "4"]), 2);
    }

    #[tokio::test]
    async fn test_incomplete_record_is_resubmitted_once_and_kept() {
        let client = ScriptedClient::new(|batch, _| match batch {
            [a, b] => Ok(vec![complete(a), resolved_without_enrichment(b)]),
            _ => Ok(vec![]),
        });
        let input = numbers(&["555-0100", "555-0101"]);

        let retrieval = orchestrator(2, 1).retrieve(&client, &input).await;

        assert_eq!(client.calls_for(&["555-0101"]), 1);
        assert_eq!(client.calls_for(&["555-0100"]), 0);
        assert_eq!(retrieval.results.len(), 2);
        assert!(retrieval.results[0].is_complete());
        assert_eq!(retrieval.results[1], resolved_without_enrichment("555-0101"));
        assert_eq!(retrieval.stats.tier2_attempted, 1);
        assert_eq!(retrieval.stats.tier2_recovered, 0);
    }

    #[tokio::test]
    async fn test_individual_retry_can_recover_enrichment() {
        let client = ScriptedClient::new(|batch, _| match batch {
            [a, b] => Ok(vec![complete(a), resolved_without_enrichment(b)]),
            [single] => Ok(vec![complete(single)]),
            _ => Ok(vec![]),
        });
        let input = numbers(&["555-0100", "555-0101"]);

        let retrieval = orchestrator(2, 1).retrieve(&client, &input).await;

        assert_eq!(retrieval.stats.tier2_recovered, 1);
        assert!(retrieval.results.iter().all(RawResult::is_complete));
    }

    #[tokio::test]
    async fn test_individual_answer_is_attributed_to_the_number_sent() {
        let client = ScriptedClient::new(|batch, _| match batch {
            [single] if single == "555-0102" => Ok(vec![RawResult {
                original: None,
                ..complete(single)
            }]),
            [single] => Ok(vec![RawResult {
                original: Some(format!("+1{}", single.replace('-', ""))),
                ..complete(single)
            }]),
            many => Ok(many.iter().map(|n| resolved_without_enrichment(n)).collect()),
        });
        let input = numbers(&["555-0100", "555-0101", "555-0102"]);

        let retrieval = orchestrator(10, 1).retrieve(&client, &input).await;

        let originals: Vec<_> = retrieval.results.iter().map(|r| r.original.clone().unwrap()).collect();
        assert_eq!(originals, input);
        assert!(retrieval.results.iter().all(RawResult::is_complete));
        assert_eq!(
            retrieval.results[0].formatted_number.as_deref(),
            Some("+1 555-0100")
        );
        assert_eq!(retrieval.stats.tier2_attempted, 3);
        assert_eq!(retrieval.stats.tier2_recovered, 3);
    }

    #[tokio::test]
    async fn test_incomplete_individual_answer_is_not_counted_as_recovered() {
        let client = ScriptedClient::new(|batch, _| match batch {
            [single] => Ok(vec![RawResult {
                original: Some(format!("+1{}", single)),
                ..resolved_without_enrichment(single)
            }]),
            many => Ok(many.iter().map(|n| resolved_without_enrichment(n)).collect()),
        });
        let input = numbers(&["555-0100", "555-0101"]);

        let retrieval = orchestrator(10, 1).retrieve(&client, &input).await;

        assert_eq!(
            retrieval.results,
            vec![
                resolved_without_enrichment("555-0100"),
                resolved_without_enrichment("555-0101")
            ]
        );
        assert_eq!(retrieval.stats.tier2_attempted, 2);
        assert_eq!(retrieval.stats.tier2_recovered, 0);
    }

    /// Tracks in-flight calls separately for batch and single-number requests.
    #[derive(Default)]
    struct TrackingClient {
        in_flight: AtomicUsize,
        max_batch_in_flight: AtomicUsize,
        max_single_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl LookupClient for TrackingClient {
        async fn lookup(&self, batch: &Batch) -> Result<Vec<RawResult>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let max = if batch.len() == 1 {
                &self.max_single_in_flight
            } else {
                &self.max_batch_in_flight
            };
            max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if batch.len() == 1 {
                Ok(batch.numbers().iter().map(|n| complete(n)).collect())
            } else {
                Ok(batch.numbers().iter().map(|n| resolved_without_enrichment(n)).collect())
            }
        }
    }

    #[tokio::test]
    async fn test_individual_retry_runs_one_call_at_a_time() {
        let client = TrackingClient::default();
        let no_throttle = (Duration::ZERO, Duration::ZERO);
        let dispatcher = Dispatcher::new(4, Duration::from_secs(5), no_throttle);
        let input = numbers(&["1", "2", "3", "4", "5", "6", "7", "8"]);

        let retrieval = RetryOrchestrator::new(dispatcher, 2, 1)
            .retrieve(&client, &input)
            .await;

        assert_eq!(client.max_batch_in_flight.load(Ordering::SeqCst), 4);
        assert_eq!(client.max_single_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(retrieval.stats.tier2_attempted, 8);
        assert_eq!(retrieval.stats.tier2_recovered, 8);
    }

    #[tokio::test]
    async fn test_number_missing_from_answer_still_gets_a_row() {
        let client = ScriptedClient::new(|batch, _| match batch {
            [a, _] => Ok(vec![complete(a), complete("not-asked-for")]),
            _ => Ok(vec![]),
        });
        let input = numbers(&["555-0100", "555-0101"]);

        let retrieval = orchestrator(2, 1).retrieve(&client, &input).await;

        assert_eq!(retrieval.results.len(), 2);
        assert_eq!(retrieval.results[1], RawResult::unanswered("555-0101"));
        assert_eq!(client.calls_for(&["555-0101"]), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_skips_batch_rounds() {
        let client = ScriptedClient::new(|batch, _| Ok(batch.iter().map(|n| complete(n)).collect()));
        let input = numbers(&["1", "2", "3"]);

        let retrieval = orchestrator(2, 0).retrieve(&client, &input).await;

        assert_eq!(retrieval.stats.rounds_run, 0);
        assert_eq!(retrieval.stats.tier2_attempted, 3);
        assert!(client.calls().iter().all(|call| call.len() == 1));
        assert!(retrieval.results.iter().all(RawResult::is_complete));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let client = ScriptedClient::new(|_, _| Ok(vec![]));

        let retrieval = orchestrator(2, 3).retrieve(&client, &[]).await;

        assert!(retrieval.results.is_empty());
        assert_eq!(retrieval.stats.rounds_run, 0);
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_reconcile_prefers_complete_duplicates() {
        let input = numbers(&["1", "2"]);
        let results = vec![
            resolved_without_enrichment("2"),
            complete("1"),
            complete("2"),
            resolved_without_enrichment("1"),
        ];

        let reconciled = reconcile(&input, results);

        assert_eq!(reconciled, vec![complete("1"), complete("2")]);
    }
}
