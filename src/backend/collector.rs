//! # Response Collector
//!
//! Per-statement rendezvous between the orchestrator and the backend I/O paths.
//! Each dispatched unit gets a [`ResultSender`] that can deliver exactly one
//! response; the orchestrator waits in [`ResponseCollector::collect`] until all
//! expected responses arrived or the deadline passed. Dropping the collector
//! closes the channel, so replies arriving afterwards are discarded.

use crate::backend::packet::{BackendResponse, PendingResult};
use crate::backend::pool::duration_millis;
use crate::error::{ProxyError, ProxyResult};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ResponseCollector {
    expected: usize,
    receiver: mpsc::Receiver<PendingResult>,
    sender: mpsc::Sender<PendingResult>,
    issued: Vec<bool>,
}

impl ResponseCollector {
    /// Create a collector that completes after `expected` responses
    pub fn new(expected: usize) -> Self {
        // capacity == expected, so a sender never waits for room
        let (sender, receiver) = mpsc::channel(expected.max(1));
        Self {
            expected,
            receiver,
            sender,
            issued: vec![false; expected],
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Hand out the single sender for the unit at `unit_index`
    pub fn sender(&mut self, unit_index: usize, target: &str) -> ProxyResult<ResultSender> {
        match self.issued.get_mut(unit_index) {
            Some(issued) if !*issued => {
                *issued = true;
                Ok(ResultSender {
                    unit_index,
                    target: target.to_string(),
                    channel: self.sender.clone(),
                })
            }
            Some(_) => Err(ProxyError::Usage(format!(
                "result sender for unit {unit_index} already issued"
            ))),
            None => Err(ProxyError::Usage(format!(
                "unit index {unit_index} out of range for {} expected results",
                self.expected
            ))),
        }
    }

    /// Wait until every expected response arrived, in arrival order
    ///
    /// Fails with [`ProxyError::ExecutionTimeout`] when the deadline passes
    /// first, or when every sender was dropped without delivering.
    pub async fn collect(self, timeout: Duration) -> ProxyResult<Vec<PendingResult>> {
        let Self {
            expected,
            mut receiver,
            sender,
            ..
        } = self;
        drop(sender);

        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(expected);

        while results.len() < expected {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Some(result)) => {
                    debug!(
                        unit_index = result.unit_index,
                        backend = %result.target,
                        received = results.len() + 1,
                        expected = expected,
                        "Backend response collected"
                    );
                    results.push(result);
                }
                Ok(None) => {
                    warn!(
                        received = results.len(),
                        expected = expected,
                        "All result senders dropped before every response arrived"
                    );
                    return Err(ProxyError::ExecutionTimeout {
                        expected,
                        received: results.len(),
                    });
                }
                Err(_) => {
                    warn!(
                        received = results.len(),
                        expected = expected,
                        timeout_ms = duration_millis(timeout),
                        "⏰ Response collector deadline elapsed"
                    );
                    return Err(ProxyError::ExecutionTimeout {
                        expected,
                        received: results.len(),
                    });
                }
            }
        }

        Ok(results)
    }
}

/// Delivers one target's response into its statement's collector
#[derive(Debug)]
pub struct ResultSender {
    unit_index: usize,
    target: String,
    channel: mpsc::Sender<PendingResult>,
}

impl ResultSender {
    pub fn unit_index(&self) -> usize {
        self.unit_index
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Push the response; returns false when nobody is waiting any more
    pub fn deliver(self, response: BackendResponse) -> bool {
        let result = PendingResult {
            unit_index: self.unit_index,
            target: self.target,
            response,
        };
        match self.channel.try_send(result) {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    unit_index = self.unit_index,
                    error = %e,
                    "Discarding backend response with no waiting collector"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::packet::OkAck;

    fn ack(rows: u64) -> BackendResponse {
        BackendResponse::Ack(OkAck::new(1, rows, 0))
    }

    #[tokio::test]
    async fn test_collects_in_arrival_order_with_unit_tags() {
        let mut collector = ResponseCollector::new(3);
        let s0 = collector.sender(0, "ds_0").unwrap();
        let s1 = collector.sender(1, "ds_1").unwrap();
        let s2 = collector.sender(2, "ds_2").unwrap();

        assert!(s2.deliver(ack(2)));
        assert!(s0.deliver(ack(0)));
        assert!(s1.deliver(ack(1)));

        let results = collector.collect(Duration::from_secs(1)).await.unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.unit_index).collect();
        assert_eq!(order, vec![2, 0, 1]);
        assert_eq!(results[0].target, "ds_2");
    }

    #[tokio::test]
    async fn test_waits_for_asynchronous_delivery() {
        let mut collector = ResponseCollector::new(2);
        let s0 = collector.sender(0, "ds_0").unwrap();
        let s1 = collector.sender(1, "ds_1").unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s1.deliver(ack(5));
        });
        tokio::spawn(async move {
            s0.deliver(ack(2));
        });

        let results = collector.collect(Duration::from_secs(2)).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_received_count() {
        let mut collector = ResponseCollector::new(2);
        let s0 = collector.sender(0, "ds_0").unwrap();
        let _silent = collector.sender(1, "ds_1").unwrap();
        s0.deliver(ack(1));

        let err = collector
            .collect(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProxyError::ExecutionTimeout {
                expected: 2,
                received: 1
            }
        );
    }

    #[tokio::test]
    async fn test_late_delivery_is_discarded() {
        let mut collector = ResponseCollector::new(1);
        let sender = collector.sender(0, "ds_0").unwrap();
        drop(collector);
        assert!(!sender.deliver(ack(1)));
    }

    #[test]
    fn test_sender_issued_once_and_in_range() {
        let mut collector = ResponseCollector::new(1);
        assert!(collector.sender(0, "ds_0").is_ok());
        assert!(matches!(
            collector.sender(0, "ds_0"),
            Err(ProxyError::Usage(_))
        ));
        assert!(matches!(
            collector.sender(1, "ds_1"),
            Err(ProxyError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_expected_completes_immediately() {
        let collector = ResponseCollector::new(0);
        let results = collector.collect(Duration::from_millis(1)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_senders_fail_fast() {
        let mut collector = ResponseCollector::new(2);
        let s0 = collector.sender(0, "ds_0").unwrap();
        let s1 = collector.sender(1, "ds_1").unwrap();
        s0.deliver(ack(1));
        drop(s1);

        let err = collector.collect(Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::ExecutionTimeout {
                expected: 2,
                received: 1
            }
        ));
    }
}
