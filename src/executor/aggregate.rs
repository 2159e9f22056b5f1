//! Aggregation of match streams into the final count.
//!
//! Each probe stream has one partial counter. A counter drains its stream
//! until the stream closes and then publishes its tally on the shared results
//! channel exactly once, even when the tally is zero. The reducer stops after
//! exactly `expected` results. It never waits for the results channel to
//! close, since no single counter knows it is the last one.

use crate::concurrency::CancellationToken;
use crate::error::{JoinError, JoinResult};
use crate::executor::probe::MatchSignal;
use crossbeam_channel::{select, Receiver, Sender};

/// Count the signals of one match stream and publish the total.
pub fn count_matches(stream: Receiver<MatchSignal>, results: Sender<u64>) -> JoinResult<u64> {
    let count = stream.iter().count() as u64;
    results
        .send(count)
        .map_err(|_| JoinError::ChannelClosed { stage: "aggregate" })?;
    Ok(count)
}

/// Sum exactly `expected` partial counts.
pub fn reduce(
    results: &Receiver<u64>,
    expected: usize,
    token: &CancellationToken,
) -> JoinResult<u64> {
    let mut total = 0u64;
    for received in 0..expected {
        select! {
            recv(results) -> msg => match msg {
                Ok(count) => total += count,
                Err(_) => return Err(JoinError::Aggregation { received, expected }),
            },
            recv(token.signal()) -> _ => return Err(JoinError::Cancelled),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    #[test]
    fn test_counter_publishes_zero() {
        let (match_tx, match_rx) = bounded::<MatchSignal>(1);
        let (results_tx, results_rx) = bounded(1);
        drop(match_tx);

        assert_eq!(count_matches(match_rx, results_tx).unwrap(), 0);
        assert_eq!(results_rx.recv().unwrap(), 0);
    }

    #[test]
    fn test_pipeline_fan_in() {
        let token = CancellationToken::new();
        let streams = 4;
        let (results_tx, results_rx) = bounded(streams);

        let total = thread::scope(|s| {
            for i in 0..streams {
                let (match_tx, match_rx) = bounded(3);
                let results_tx = results_tx.clone();
                s.spawn(move || count_matches(match_rx, results_tx));
                s.spawn(move || {
                    for _ in 0..(i * 10) {
                        match_tx.send(MatchSignal).unwrap();
                    }
                });
            }
            drop(results_tx);
            reduce(&results_rx, streams, &token)
        })
        .unwrap();

        assert_eq!(total, 10 + 20 + 30);
    }

    #[test]
    fn test_reduce_missing_result() {
        let token = CancellationToken::new();
        let (results_tx, results_rx) = bounded(4);
        results_tx.send(5).unwrap();
        results_tx.send(6).unwrap();
        drop(results_tx);

        match reduce(&results_rx, 3, &token) {
            Err(JoinError::Aggregation { received, expected }) => {
                assert_eq!(received, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("expected aggregation error, got {:?}", other),
        }
    }

    #[test]
    fn test_reduce_cancelled() {
        let token = CancellationToken::new();
        let (_results_tx, results_rx) = bounded::<u64>(1);
        token.cancel();
        assert!(matches!(
            reduce(&results_rx, 1, &token),
            Err(JoinError::Cancelled)
        ));
    }

    #[test]
    fn test_reduce_zero_streams() {
        let token = CancellationToken::new();
        let (_results_tx, results_rx) = bounded::<u64>(1);
        assert_eq!(reduce(&results_rx, 0, &token).unwrap(), 0);
    }
}
