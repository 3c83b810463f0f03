//! Per-item lifecycle state

use crate::stream::ItemStream;
use crate::types::ItemDescriptor;
use std::path::PathBuf;

/// Where the current item is in its lifecycle
///
/// `Announced → StreamAssigned → Prepared → ResultRecorded`; the session
/// rejects calls that arrive out of this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Properties read, routing in progress
    Announced,
    /// Output decided (possibly "no stream")
    StreamAssigned,
    /// Engine told the host what it is about to do
    Prepared,
    /// Result recorded; the session is ready for the next item
    ResultRecorded,
}

impl ItemState {
    /// Lower-case name for error messages
    pub fn name(self) -> &'static str {
        match self {
            ItemState::Announced => "announced",
            ItemState::StreamAssigned => "stream_assigned",
            ItemState::Prepared => "prepared",
            ItemState::ResultRecorded => "result_recorded",
        }
    }
}

/// The item currently moving through the session
#[derive(Debug)]
pub(crate) struct ActiveItem {
    pub(crate) item: ItemDescriptor,
    pub(crate) state: ItemState,
    /// Destination on disk: file, directory, or staged sidecar payload
    pub(crate) disk_path: Option<PathBuf>,
    pub(crate) stream: Option<ItemStream>,
    /// Bytes go to the sidecar staging area
    pub(crate) sidecar: bool,
    /// Routing decided not to process this item
    pub(crate) skipped: bool,
    /// Prepared in true extraction mode (not test, not stdout)
    pub(crate) extract_mode: bool,
}

impl ActiveItem {
    pub(crate) fn new(item: ItemDescriptor) -> Self {
        Self {
            item,
            state: ItemState::Announced,
            disk_path: None,
            stream: None,
            sidecar: false,
            skipped: false,
            extract_mode: false,
        }
    }

    pub(crate) fn skip(&mut self) {
        self.skipped = true;
        self.stream = None;
    }
}
