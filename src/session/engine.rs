//! Engine-facing traits and the processing loop

use super::{ExtractSession, SessionProgress};
use crate::callback::ExtractCallback;
use crate::error::Result;
use crate::types::{AskMode, OperationResult, PropId, PropValue};
use chrono::{DateTime, Utc};
use std::io::Write;
use tracing::{debug, info};

/// Read-only view of an opened archive
pub trait ArchiveReader {
    /// Property `prop` of item `index`
    fn property(&self, index: u32, prop: PropId) -> Result<PropValue>;

    /// Modification time of the archive itself, used when an item has none
    fn archive_mtime(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Progress, ratio and password channel the engine calls while decoding
pub trait ProgressSink {
    /// Decoded bytes completed so far in this archive
    fn completed(&mut self, unpacked: u64) -> Result<()>;

    /// Compression ratio information
    fn ratio(&mut self, in_size: Option<u64>, out_size: Option<u64>);

    /// Password for encrypted items
    fn password(&mut self) -> Result<Option<String>>;
}

/// An archive decoder the session can drive item by item
pub trait ArchiveEngine: ArchiveReader {
    /// Number of items in the archive
    fn item_count(&self) -> u32;

    /// Total decoded size, if known up front
    fn total_unpacked(&self) -> Option<u64> {
        None
    }

    /// Packed size of this archive (one volume of a multi-volume set)
    fn packed_size(&self) -> u64 {
        0
    }

    /// Decode item `index`
    ///
    /// Bytes go to `out` when the session supplied a stream; with `None` the
    /// engine decodes (test) or skips without writing.
    fn extract(
        &mut self,
        index: u32,
        mode: AskMode,
        out: Option<&mut dyn Write>,
        progress: &mut dyn ProgressSink,
    ) -> Result<OperationResult>;
}

impl<C: ExtractCallback> ExtractSession<C> {
    /// Drive every item of `engine` through the session
    ///
    /// Stops at the first fatal error; the in-flight stream is released and
    /// whatever was written so far stays on disk.
    pub fn run<E: ArchiveEngine>(&mut self, engine: &mut E) -> Result<()> {
        let count = engine.item_count();
        info!(
            items = count,
            destination = ?self.resolver.root(),
            overwrite_mode = ?self.policy.mode(),
            "extraction started"
        );

        if let Some(total) = engine.total_unpacked() {
            self.set_total(total);
        }

        for index in 0..count {
            if let Err(e) = self.run_item(engine, index) {
                self.active = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drive a multi-volume set, one engine per volume
    ///
    /// Each volume's progress is offset by the packed bytes of the volumes
    /// before it.
    pub fn run_volumes<E: ArchiveEngine>(&mut self, volumes: &mut [E]) -> Result<()> {
        let mut prior_packed = 0u64;
        for (volume, engine) in volumes.iter_mut().enumerate() {
            debug!(volume, prior_packed, "starting volume");
            self.progress.begin_volume(prior_packed, engine.packed_size());
            self.run(engine)?;
            prior_packed += engine.packed_size();
        }
        Ok(())
    }

    fn run_item<E: ArchiveEngine>(&mut self, engine: &mut E, index: u32) -> Result<()> {
        self.get_stream(&*engine, index, AskMode::Extract)?;

        let requested = if self.active.as_ref().is_some_and(|a| a.skipped) {
            AskMode::Skip
        } else {
            AskMode::Extract
        };
        let mode = self.prepare_operation(requested)?;

        let result = {
            let Self {
                active,
                progress,
                callback,
                password,
                ..
            } = self;
            let out = active
                .as_mut()
                .and_then(|a| a.stream.as_mut())
                .map(|s| s as &mut dyn Write);
            let mut sink = SessionProgress {
                progress,
                callback,
                password,
            };
            engine.extract(index, mode, out, &mut sink)?
        };

        self.set_operation_result(&*engine, result.code())
    }
}
