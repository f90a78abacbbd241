//! The `IShareWriter` seam, exercised with an in-memory writer the way the
//! ingestion layer sees it: behind `Arc<dyn IShareWriter>`.

use std::sync::{Arc, Mutex};
use std::thread;

use chimera_core::{BatchInsertStats, IShareWriter, Share, StoreError};

#[derive(Default)]
struct RecordingWriter {
    pending: Mutex<Vec<Share>>,
    written: Mutex<Vec<Share>>,
}

impl IShareWriter for RecordingWriter {
    fn insert(&self, share: Share) {
        self.pending.lock().unwrap().push(share);
    }

    fn insert_batch(&self, shares: &[Share]) -> Result<(), StoreError> {
        if shares.iter().any(|s| s.nonce.is_empty()) {
            return Err(StoreError::BatchInsert {
                rows: shares.len(),
                source: Box::new(StoreError::InvalidIdentifier("nonce".into())),
            });
        }
        self.written.lock().unwrap().extend_from_slice(shares);
        Ok(())
    }

    fn flush(&self) {
        let drained: Vec<Share> = std::mem::take(&mut *self.pending.lock().unwrap());
        self.written.lock().unwrap().extend(drained);
    }

    fn stats(&self) -> BatchInsertStats {
        BatchInsertStats {
            total_inserted: self.written.lock().unwrap().len() as i64,
            pending_shares: self.pending.lock().unwrap().len() as i64,
            ..BatchInsertStats::default()
        }
    }
}

#[test]
fn seam_01_trait_object_shared_across_threads() {
    let writer: Arc<dyn IShareWriter> = Arc::new(RecordingWriter::default());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for i in 0..10 {
                    writer.insert(Share::new(t, i, 1.0, true, format!("{t}-{i}"), "h"));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(writer.stats().pending_shares, 40);
    writer.flush();
    let stats = writer.stats();
    assert_eq!(stats.pending_shares, 0);
    assert_eq!(stats.total_inserted, 40);
}

#[test]
fn seam_02_batch_errors_surface_to_caller() {
    let writer = Arc::new(RecordingWriter::default());
    let err = writer
        .insert_batch(&[Share::new(1, 1, 1.0, true, "", "h")])
        .unwrap_err();
    assert!(err.to_string().contains("1 rows"));
    assert_eq!(writer.stats().total_inserted, 0);
}
