use crate::executor::{QueryExecutor, QueryTarget};
use futures::future::try_join_all;
use sparqlgate_core::{Result, ResultSet, SparqlError, SparqlQuery};
use std::sync::Arc;
use tracing::debug;

/// Run every job concurrently and return their result sets in input order.
///
/// Fails with the first error observed. Jobs still running at that point are
/// detached, not aborted: each keeps its own deadline and its outcome is
/// discarded.
pub async fn fan_out(
    executor: Arc<dyn QueryExecutor>,
    jobs: Vec<(SparqlQuery, QueryTarget)>,
) -> Result<Vec<ResultSet>> {
    debug!(jobs = jobs.len(), "Fanning out SPARQL queries");

    let handles = jobs.into_iter().map(|(query, target)| {
        let executor = Arc::clone(&executor);
        let handle = tokio::spawn(async move { executor.execute(&query, &target).await });
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(SparqlError::Internal(format!("sub-query task failed: {}", e))),
            }
        }
    });

    try_join_all(handles).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sparqlgate_core::{Binding, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers by query text: "fail" errors, "slow" sleeps first, anything else
    /// yields a one-row set echoing the text.
    struct EchoExecutor {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QueryExecutor for EchoExecutor {
        async fn execute(&self, query: &SparqlQuery, _target: &QueryTarget) -> Result<ResultSet> {
            match query.as_str() {
                "fail" => Err(SparqlError::Http {
                    status: 500,
                    message: "boom".to_string(),
                }),
                text => {
                    if text == "slow" {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    let mut row = Row::new();
                    row.insert("q".to_string(), Binding::literal(text));
                    ResultSet::new(vec!["q".to_string()], vec![row])
                }
            }
        }
    }

    fn job(text: &str) -> (SparqlQuery, QueryTarget) {
        (
            SparqlQuery::caller_supplied(text),
            QueryTarget::new("http://localhost/sparql", false, Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let executor = Arc::new(EchoExecutor {
            completed: Arc::new(AtomicUsize::new(0)),
        });
        let results = fan_out(executor, vec![job("slow"), job("a"), job("b")])
            .await
            .unwrap();
        let echoed: Vec<_> = results.iter().map(|r| r.value(0, "q").unwrap()).collect();
        assert_eq!(echoed, ["slow", "a", "b"]);
    }

    #[tokio::test]
    async fn one_failure_fails_the_whole_fan_out() {
        let executor = Arc::new(EchoExecutor {
            completed: Arc::new(AtomicUsize::new(0)),
        });
        let err = fan_out(executor, vec![job("a"), job("fail"), job("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, SparqlError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn siblings_of_a_failure_run_to_completion() {
        let completed = Arc::new(AtomicUsize::new(0));
        let executor = Arc::new(EchoExecutor {
            completed: Arc::clone(&completed),
        });
        assert!(fan_out(executor, vec![job("fail"), job("slow")]).await.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_job_list_is_empty_output() {
        let executor = Arc::new(EchoExecutor {
            completed: Arc::new(AtomicUsize::new(0)),
        });
        assert!(fan_out(executor, Vec::new()).await.unwrap().is_empty());
    }
}
