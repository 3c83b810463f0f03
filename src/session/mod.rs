//! Extraction session: the per-item state machine between engine and disk
//!
//! An [`ExtractSession`] is created once per run. The engine (or
//! [`ExtractSession::run`], which drives an [`ArchiveEngine`]) walks each item
//! through the protocol:
//!
//! 1. [`get_stream`] reads and type-checks the item's properties, resolves
//!    its destination, settles any conflict and picks the output stream
//! 2. [`prepare_operation`] announces what the engine is about to do
//! 3. the engine writes into [`writer`]
//! 4. [`set_operation_result`] closes the stream, stamps times and
//!    attributes, and updates the [`Summary`]
//!
//! [`finish`] drains the sidecar queue once all items are done. Dropping a
//! session without finishing removes the sidecar staging directory.
//!
//! [`get_stream`]: ExtractSession::get_stream
//! [`prepare_operation`]: ExtractSession::prepare_operation
//! [`writer`]: ExtractSession::writer
//! [`set_operation_result`]: ExtractSession::set_operation_result
//! [`finish`]: ExtractSession::finish

mod engine;
mod item;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use engine::{ArchiveEngine, ArchiveReader, ProgressSink};
pub use item::ItemState;

use crate::callback::{AcceptAll, ExtractCallback, PathFilter};
use crate::config::ExtractionConfig;
use crate::error::{Error, ItemError, Result};
use crate::fs::{FileSystem, LocalFileSystem, MetadataMerger, NoOpMetadataMerger, TimesToSet};
use crate::overwrite::{ConflictOutcome, OverwriteMode, OverwritePolicy, OverwriteRequest};
use crate::password::PasswordCache;
use crate::progress::ProgressAggregator;
use crate::resolver::PathResolver;
use crate::sidecar::{SidecarEntry, SidecarKind, SidecarQueue, classify};
use crate::stream::ItemStream;
use crate::types::{AskMode, ItemDescriptor, ItemTimes, OperationResult, PropId, Summary};
use chrono::{DateTime, Utc};
use item::ActiveItem;
use tracing::{debug, info, warn};

/// State for one extraction run
pub struct ExtractSession<C: ExtractCallback> {
    config: ExtractionConfig,
    resolver: PathResolver,
    policy: OverwritePolicy,
    callback: C,
    filter: Box<dyn PathFilter>,
    fs: Box<dyn FileSystem>,
    merger: Box<dyn MetadataMerger>,
    progress: ProgressAggregator,
    sidecars: SidecarQueue,
    password: PasswordCache,
    summary: Summary,
    active: Option<ActiveItem>,
    root_ready: bool,
}

/// Progress channel handed to the engine while an item is decoding
pub(crate) struct SessionProgress<'a, C> {
    progress: &'a mut ProgressAggregator,
    callback: &'a mut C,
    password: &'a mut PasswordCache,
}

impl<C: ExtractCallback> ProgressSink for SessionProgress<'_, C> {
    fn completed(&mut self, unpacked: u64) -> Result<()> {
        let value = self.progress.completed(unpacked);
        self.callback.set_completed(value)
    }

    fn ratio(&mut self, in_size: Option<u64>, out_size: Option<u64>) {
        self.callback.set_ratio_info(in_size, out_size);
    }

    fn password(&mut self) -> Result<Option<String>> {
        let callback = &mut *self.callback;
        self.password.get(|| callback.get_password())
    }
}

impl<C: ExtractCallback> ExtractSession<C> {
    /// Create a session for `config`, reporting to `callback`
    ///
    /// The configuration is validated here. The destination directory is
    /// created through the session's [`FileSystem`] when the first item is
    /// routed to disk.
    pub fn new(config: ExtractionConfig, mut callback: C) -> Result<Self> {
        config.validate()?;

        let progress = ProgressAggregator::new(config.multi_volume, config.packed_size);
        if config.multi_volume {
            callback.set_total(config.packed_size);
        }

        Ok(Self {
            resolver: PathResolver::new(&config.destination_dir, config.path_mode.clone()),
            policy: OverwritePolicy::new(config.overwrite_mode, config.max_rename_attempts),
            sidecars: SidecarQueue::new(&config.destination_dir),
            password: PasswordCache::new(config.password.clone()),
            callback,
            filter: Box::new(AcceptAll),
            fs: Box::new(LocalFileSystem),
            merger: Box::new(NoOpMetadataMerger),
            progress,
            summary: Summary::default(),
            active: None,
            root_ready: false,
            config,
        })
    }

    /// Only process items the filter accepts
    pub fn with_filter(mut self, filter: impl PathFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Route every filesystem primitive through `fs`
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    /// Merge sidecar payloads with `merger`
    ///
    /// AppleDouble items are only staged when the merger supports merging;
    /// otherwise they are written as ordinary files.
    pub fn with_metadata_merger(mut self, merger: impl MetadataMerger + 'static) -> Self {
        self.merger = Box::new(merger);
        self
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Current overwrite mode, after any narrowing
    pub fn overwrite_mode(&self) -> OverwriteMode {
        self.policy.mode()
    }

    /// Totals so far
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The host callback
    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Sidecar payloads waiting for [`finish`](Self::finish)
    pub fn pending_sidecars(&self) -> &[SidecarEntry] {
        self.sidecars.entries()
    }

    /// Lifecycle state of the current item, `None` before the first one
    pub fn item_state(&self) -> Option<ItemState> {
        self.active.as_ref().map(|a| a.state)
    }

    /// Engine announces the total decoded size
    pub fn set_total(&mut self, total: u64) {
        if let Some(forward) = self.progress.set_total(total) {
            self.callback.set_total(forward);
        }
    }

    /// Engine reports decoded bytes completed
    pub fn set_completed(&mut self, completed: u64) -> Result<()> {
        self.progress_sink().completed(completed)
    }

    /// Engine reports compression ratio information
    pub fn set_ratio_info(&mut self, in_size: Option<u64>, out_size: Option<u64>) {
        self.progress_sink().ratio(in_size, out_size);
    }

    /// Engine asks for the archive password
    pub fn get_password(&mut self) -> Result<Option<String>> {
        self.progress_sink().password()
    }

    fn progress_sink(&mut self) -> SessionProgress<'_, C> {
        SessionProgress {
            progress: &mut self.progress,
            callback: &mut self.callback,
            password: &mut self.password,
        }
    }

    /// Output stream of the current item, if one was assigned
    pub fn writer(&mut self) -> Option<&mut ItemStream> {
        self.active.as_mut().and_then(|a| a.stream.as_mut())
    }

    /// Start item `index`: resolve its destination and choose its stream
    ///
    /// Returns whether a stream was assigned. Non-fatal problems (existing
    /// file kept, rename or delete failure, open failure) are reported through
    /// the callback and yield `Ok(false)`.
    pub fn get_stream(&mut self, reader: &dyn ArchiveReader, index: u32, mode: AskMode) -> Result<bool> {
        if let Some(active) = &self.active
            && active.state != ItemState::ResultRecorded
        {
            return Err(Error::InvalidState {
                operation: "get_stream",
                state: active.state.name(),
            });
        }
        self.active = None;

        let mut active = ActiveItem::new(ItemDescriptor::read(reader, index)?);
        self.route(reader, &mut active, mode)?;

        active.state = ItemState::StreamAssigned;
        let has_stream = active.stream.is_some();
        self.active = Some(active);
        Ok(has_stream)
    }

    fn route(&mut self, reader: &dyn ArchiveReader, active: &mut ActiveItem, mode: AskMode) -> Result<()> {
        let item = &active.item;

        if !self.filter.accept(&item.raw_path, item.is_dir) {
            debug!(index = item.index, path = %item.raw_path, "item filtered out");
            active.skipped = true;
            return Ok(());
        }

        let produces_bytes = !item.is_dir && !item.is_anti;
        let checksum = self.config.checksum;

        if mode == AskMode::Skip {
            active.skipped = true;
            return Ok(());
        }
        if mode == AskMode::Test || self.config.test {
            if produces_bytes {
                active.stream = Some(ItemStream::discard(checksum));
            }
            return Ok(());
        }
        if self.config.stdout {
            if produces_bytes {
                active.stream = Some(ItemStream::console(checksum));
            }
            return Ok(());
        }

        self.route_to_disk(reader, active)
    }

    fn route_to_disk(&mut self, reader: &dyn ArchiveReader, active: &mut ActiveItem) -> Result<()> {
        if !self.root_ready {
            self.resolver.create_root(self.fs.as_ref())?;
            self.root_ready = true;
        }
        let item = &active.item;

        let kind = if self.config.sidecar_metadata && self.merger.supports_merge() {
            classify(&item.components, item.is_dir)
        } else {
            SidecarKind::Regular
        };
        let (components, sidecar) = match kind {
            SidecarKind::Noise => {
                debug!(index = item.index, path = %item.raw_path, "sidecar container noise skipped");
                active.skipped = true;
                return Ok(());
            }
            SidecarKind::Metadata(target) => (target, true),
            SidecarKind::Regular => (item.components.clone(), false),
        };

        let resolved = self.resolver.resolve(&item.raw_path, components)?;
        let fs = self.fs.as_ref();

        if item.is_dir {
            if item.is_anti {
                if let Err(e) = fs.remove_dir(&resolved.path) {
                    warn!(path = ?resolved.path, error = %e, "anti item: directory not removed");
                }
            } else {
                let times = self.times_to_set(&item.times, reader.archive_mtime());
                self.resolver.create_dir_item(fs, &resolved.components, &times);
            }
            debug!(index = item.index, path = ?resolved.path, anti = item.is_anti, "directory item");
            active.disk_path = Some(resolved.path);
            return Ok(());
        }

        if item.is_anti {
            if fs.find(&resolved.path).is_some()
                && let Err(e) = fs.delete_file(&resolved.path)
            {
                warn!(path = ?resolved.path, error = %e, "anti item: file not removed");
            }
            active.disk_path = Some(resolved.path);
            return Ok(());
        }

        let parents = &resolved.components[..resolved.components.len() - 1];
        if !sidecar && !parents.is_empty() {
            self.resolver.create_dirs(fs, parents);
        }

        let checksum = self.config.checksum;

        if sidecar {
            return match self.sidecars.stage(resolved.path.clone()) {
                Ok((file, payload)) => {
                    active.stream = Some(ItemStream::file(file, &payload, None, checksum)?);
                    active.disk_path = Some(payload);
                    active.sidecar = true;
                    Ok(())
                }
                Err(e) => {
                    self.report(
                        active,
                        ItemError::CannotOpenOutputFile {
                            path: resolved.path,
                            reason: e.to_string(),
                        },
                    );
                    Ok(())
                }
            };
        }

        let mut target = resolved.path;
        if !item.is_split()
            && let Some(existing) = fs.find(&target)
        {
            let request = OverwriteRequest {
                existing_path: target.clone(),
                existing_modified: existing.modified,
                existing_size: existing.size,
                item_path: item.raw_path.clone(),
                item_modified: item.times.modified,
                item_size: item.size,
            };
            let callback = &mut self.callback;
            match self
                .policy
                .resolve(fs, &request, |r| callback.ask_overwrite(r))?
            {
                ConflictOutcome::Write(path) => target = path,
                ConflictOutcome::Skip => {
                    self.summary.skipped += 1;
                    active.skip();
                    return Ok(());
                }
                ConflictOutcome::Failed(error) => {
                    self.report(active, error);
                    return Ok(());
                }
            }
        }

        match fs.open_output(&target, !item.is_split()) {
            Ok(file) => {
                active.stream = Some(ItemStream::file(file, &target, item.position, checksum)?);
                debug!(index = item.index, path = ?target, position = ?item.position, "file stream opened");
            }
            Err(e) => {
                self.report(
                    active,
                    ItemError::CannotOpenOutputFile {
                        path: target.clone(),
                        reason: e.to_string(),
                    },
                );
            }
        }
        active.disk_path = Some(target);
        Ok(())
    }

    fn report(&mut self, active: &mut ActiveItem, error: ItemError) {
        warn!(index = active.item.index, code = error.error_code(), %error, "item skipped");
        self.summary.warnings += 1;
        self.summary.skipped += 1;
        self.callback.message_error(&error);
        active.skip();
    }

    fn times_to_set(&self, times: &ItemTimes, archive_mtime: Option<DateTime<Utc>>) -> TimesToSet {
        let flags = self.config.timestamps;
        let times = times.with_mtime_fallback(archive_mtime);
        TimesToSet {
            created: times.created.filter(|_| flags.creation),
            accessed: times.accessed.filter(|_| flags.access),
            modified: times.modified.filter(|_| flags.modification),
        }
    }

    /// Engine announces what it is about to do with the current item
    ///
    /// An extract request becomes a test in verify-only runs. Returns the
    /// effective mode.
    pub fn prepare_operation(&mut self, mode: AskMode) -> Result<AskMode> {
        let test = self.config.test;
        let writes_files = self.config.writes_files();
        let active = expect_state(&mut self.active, "prepare_operation", ItemState::StreamAssigned)?;

        let effective = match mode {
            AskMode::Extract if test => AskMode::Test,
            other => other,
        };
        active.extract_mode = effective == AskMode::Extract && writes_files;
        active.state = ItemState::Prepared;

        let item = &active.item;
        self.callback
            .prepare_operation(&item.raw_path, item.is_dir, effective, item.position);
        Ok(effective)
    }

    /// Engine reports the result for the current item
    ///
    /// Soft results (ok, unsupported method, data error, CRC error) are
    /// recorded; any other code drops the stream and fails the run.
    pub fn set_operation_result(&mut self, reader: &dyn ArchiveReader, code: i32) -> Result<()> {
        expect_state(&mut self.active, "set_operation_result", ItemState::Prepared)?;
        let Some(mut active) = self.active.take() else {
            return Err(Error::InvalidState {
                operation: "set_operation_result",
                state: "idle",
            });
        };

        let result = OperationResult::from_code(code);
        let index = active.item.index;
        if !result.is_recoverable() {
            warn!(index, code, "engine reported a fatal item result");
            return Err(Error::ItemFailed { index, code });
        }

        let mut size = None;
        if let Some(stream) = active.stream.take() {
            let totals = stream.finish()?;
            if let Some((crc, bytes)) = totals.checksum {
                self.summary.crc_sum = self.summary.crc_sum.wrapping_add(crc);
                size = Some(bytes);
            }
            if let Some((path, processed)) = totals.file {
                if !active.sidecar {
                    let times = self.times_to_set(&active.item.times, reader.archive_mtime());
                    if !times.is_empty()
                        && let Err(e) = self.fs.set_times(&path, &times)
                    {
                        debug!(?path, error = %e, "could not stamp file times");
                    }
                }
                if size.is_none() {
                    size = Some(processed);
                }
            }
        }
        if size.is_none() {
            size = reader.property(index, PropId::Size)?.into_u64(index, PropId::Size)?;
        }

        let item = &active.item;
        if !active.skipped && !item.is_anti {
            if let Some(bytes) = size {
                self.summary.unpacked_size = self.summary.unpacked_size.saturating_add(bytes);
            }
            if item.is_dir {
                self.summary.folders += 1;
            } else {
                self.summary.files += 1;
            }
        }

        if active.extract_mode
            && !active.skipped
            && !active.sidecar
            && !item.is_anti
            && let (Some(attributes), Some(path)) = (item.attributes, &active.disk_path)
            && let Err(e) = self.fs.set_attributes(path, attributes)
        {
            debug!(?path, attributes, error = %e, "could not apply attributes");
        }

        debug!(index, ?result, size = ?size, "item recorded");
        self.callback.set_operation_result(result, item.encrypted)?;

        active.state = ItemState::ResultRecorded;
        self.active = Some(active);
        Ok(())
    }

    /// Drain the sidecar queue and return the run's totals
    pub fn finish(mut self) -> Result<Summary> {
        if let Some(active) = &self.active
            && active.state != ItemState::ResultRecorded
        {
            return Err(Error::InvalidState {
                operation: "finish",
                state: active.state.name(),
            });
        }

        let report = self.sidecars.drain(self.fs.as_ref(), self.merger.as_ref());
        self.summary.sidecars_merged += report.merged;
        self.summary.warnings += report.failed;

        info!(summary = %self.summary, "extraction finished");
        Ok(self.summary)
    }
}

fn expect_state<'a>(
    active: &'a mut Option<ActiveItem>,
    operation: &'static str,
    expected: ItemState,
) -> Result<&'a mut ActiveItem> {
    let state = active.as_ref().map(|a| a.state);
    match (state, active.as_mut()) {
        (Some(state), Some(active)) if state == expected => Ok(active),
        (Some(state), _) => Err(Error::InvalidState {
            operation,
            state: state.name(),
        }),
        _ => Err(Error::InvalidState {
            operation,
            state: "idle",
        }),
    }
}
