//! Property-based tests for byte integrity.
//!
//! Whatever the chunking and threshold, the sink must receive every written
//! byte exactly once and in order.

use alopex_coalesce::{BlockingCoalescer, DeferredCoalescer, Sink};
use proptest::prelude::*;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct CaptureSink {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CaptureSink {
    fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

impl Sink for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }
}

fn chunks_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 1..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Deferred writes reach the sink in order with no loss or duplication.
    #[test]
    fn test_deferred_preserves_bytes(chunks in chunks_strategy(), max_size in 1usize..96) {
        let sink = CaptureSink::default();
        let coalescer =
            DeferredCoalescer::with_params(sink.clone(), Duration::from_millis(1), max_size)
                .unwrap();

        for chunk in &chunks {
            prop_assert_eq!(coalescer.write(chunk).unwrap(), chunk.len());
        }
        coalescer.close().unwrap();

        let writes = sink.writes();
        prop_assert!(writes.iter().all(|w| !w.is_empty()), "Empty flush reached the sink");
        prop_assert_eq!(writes.concat(), chunks.concat());
        prop_assert_eq!(coalescer.pending_bytes(), 0);
    }

    /// Sequential blocking writes are flushed one by one, in order.
    #[test]
    fn test_blocking_preserves_bytes(chunks in chunks_strategy(), max_size in 1usize..96) {
        let sink = CaptureSink::default();
        let coalescer =
            BlockingCoalescer::with_params(sink.clone(), Duration::from_millis(1), max_size)
                .unwrap();

        for chunk in &chunks {
            prop_assert_eq!(coalescer.write(chunk).unwrap(), chunk.len());
            prop_assert_eq!(coalescer.pending_bytes(), 0);
        }
        coalescer.close().unwrap();

        let non_empty = chunks.iter().filter(|c| !c.is_empty()).count();
        prop_assert_eq!(sink.writes().len(), non_empty);
        prop_assert_eq!(sink.writes().concat(), chunks.concat());
    }
}
