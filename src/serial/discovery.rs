//! # Port Discovery
//!
//! Finds the first openable device among an ordered list of candidates.
//! Each candidate is opened briefly and closed again; nothing is kept.

use log::{error, info, warn};
use tokio::time::{Duration, timeout};

use super::port::PortOpener;
use crate::error::{ConnectError, DiscoveryError};

/// Probes `candidates` in order and returns the first path that opens.
///
/// Every probe is bounded by `probe_timeout`. A candidate that fails or times
/// out is logged and skipped.
pub async fn discover(
    opener: &dyn PortOpener,
    candidates: &[String],
    probe_timeout: Duration,
) -> Result<String, DiscoveryError> {
    info!("Searching for an available modem port ({} candidates)", candidates.len());

    for path in candidates {
        info!("Trying port {path}");
        match timeout(probe_timeout, opener.open(path)).await {
            Ok(Ok(link)) => {
                drop(link);
                info!("Found available port {path}");
                return Ok(path.clone());
            }
            Ok(Err(err)) => warn!("{}", ConnectError::from_io(path.as_str(), &err)),
            Err(_) => warn!(
                "{}",
                ConnectError::Timeout {
                    port: path.clone()
                }
            ),
        }
    }

    error!("No available modem port found, check the connection and drivers");
    Err(DiscoveryError::NotFound {
        attempted: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use mockall::Sequence;

    use super::*;
    use crate::serial::port::{MockPortOpener, ModemLink};

    const PROBE: Duration = Duration::from_millis(200);

    fn candidates() -> Vec<String> {
        ["COM4", "COM3", "COM5", "COM6"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn link() -> ModemLink {
        Box::new(tokio::io::duplex(64).0)
    }

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "No such device")
    }

    /// Only `open_path` can be opened.
    fn opener_with_one_open(open_path: &'static str) -> MockPortOpener {
        let mut opener = MockPortOpener::new();
        opener
            .expect_open()
            .returning(move |path| if path == open_path { Ok(link()) } else { Err(not_found()) });
        opener
    }

    #[tokio::test]
    async fn test_single_openable_found_at_any_position() {
        for open_path in ["COM4", "COM3", "COM5", "COM6"] {
            let opener = opener_with_one_open(open_path);
            let found = discover(&opener, &candidates(), PROBE).await.unwrap();
            assert_eq!(found, open_path);
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let mut opener = MockPortOpener::new();
        let mut seq = Sequence::new();
        opener
            .expect_open()
            .withf(|path| path == "COM4")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(not_found()));
        opener
            .expect_open()
            .withf(|path| path == "COM3")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(link()));
        opener
            .expect_open()
            .withf(|path| path == "COM5" || path == "COM6")
            .never();

        let found = discover(&opener, &candidates(), PROBE).await.unwrap();
        assert_eq!(found, "COM3");
    }

    #[tokio::test]
    async fn test_none_openable_tries_each_once() {
        let mut opener = MockPortOpener::new();
        let mut seq = Sequence::new();
        for candidate in candidates() {
            opener
                .expect_open()
                .withf(move |path| path == candidate)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Err(not_found()));
        }

        let err = discover(&opener, &candidates(), PROBE).await.unwrap_err();
        let DiscoveryError::NotFound { attempted } = err;
        assert_eq!(attempted, candidates());
    }

    #[tokio::test]
    async fn test_empty_candidates_not_found() {
        let opener = MockPortOpener::new();
        assert!(discover(&opener, &[], PROBE).await.is_err());
    }

    /// Never finishes opening the first port.
    struct StallingOpener;

    #[async_trait]
    impl PortOpener for StallingOpener {
        async fn open(&self, path: &str) -> io::Result<ModemLink> {
            if path == "COM4" {
                std::future::pending::<()>().await;
            }
            Ok(link())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_candidate_times_out() {
        let started = tokio::time::Instant::now();
        let found = discover(&StallingOpener, &candidates(), PROBE).await.unwrap();
        assert_eq!(found, "COM3");
        assert_eq!(started.elapsed(), PROBE);
    }
}
