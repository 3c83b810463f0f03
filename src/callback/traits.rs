//! Traits for the host side of an extraction run

use crate::error::{ItemError, Result};
use crate::overwrite::OverwriteRequest;
use crate::types::{AskMode, OperationResult, OverwriteAnswer};

/// Host notifications and prompts for one extraction run
///
/// Every method except [`ask_overwrite`] has a no-op default, so a host only
/// implements what it displays. Calls arrive on the thread driving the
/// session, one item at a time.
///
/// # Examples
///
/// ```
/// use extract_orchestrator::{ExtractCallback, OverwriteAnswer, OverwriteRequest, Result};
///
/// struct Overwriter {
///     bytes: u64,
/// }
///
/// impl ExtractCallback for Overwriter {
///     fn set_completed(&mut self, completed: u64) -> Result<()> {
///         self.bytes = completed;
///         Ok(())
///     }
///
///     fn ask_overwrite(&mut self, _request: &OverwriteRequest) -> Result<OverwriteAnswer> {
///         Ok(OverwriteAnswer::YesToAll)
///     }
/// }
/// ```
///
/// [`ask_overwrite`]: ExtractCallback::ask_overwrite
pub trait ExtractCallback {
    /// Total size of the run, in decoded bytes (single archive) or packed
    /// bytes (multi-volume)
    fn set_total(&mut self, _total: u64) {}

    /// Progress report
    ///
    /// # Errors
    ///
    /// Returning [`crate::Error::Aborted`] cancels the run after the current
    /// engine call.
    fn set_completed(&mut self, _completed: u64) -> Result<()> {
        Ok(())
    }

    /// Compression ratio report, forwarded verbatim from the engine
    fn set_ratio_info(&mut self, _in_size: Option<u64>, _out_size: Option<u64>) {}

    /// Decide what to do about a destination file that already exists
    ///
    /// Hosts that receive raw numeric answers should convert them with
    /// [`OverwriteAnswer::from_code`], which rejects unknown values.
    fn ask_overwrite(&mut self, request: &OverwriteRequest) -> Result<OverwriteAnswer>;

    /// An item is about to be decoded
    ///
    /// `position` is the split-volume offset for continuation fragments.
    fn prepare_operation(
        &mut self,
        _item_path: &str,
        _is_dir: bool,
        _mode: AskMode,
        _position: Option<u64>,
    ) {
    }

    /// A non-fatal error; the item has been skipped
    fn message_error(&mut self, _error: &ItemError) {}

    /// The engine finished an item
    fn set_operation_result(&mut self, _result: OperationResult, _encrypted: bool) -> Result<()> {
        Ok(())
    }

    /// Credential prompt; asked at most once per run
    fn get_password(&mut self) -> Result<Option<String>> {
        Ok(None)
    }
}

impl<C: ExtractCallback + ?Sized> ExtractCallback for &mut C {
    fn set_total(&mut self, total: u64) {
        (**self).set_total(total)
    }

    fn set_completed(&mut self, completed: u64) -> Result<()> {
        (**self).set_completed(completed)
    }

    fn set_ratio_info(&mut self, in_size: Option<u64>, out_size: Option<u64>) {
        (**self).set_ratio_info(in_size, out_size)
    }

    fn ask_overwrite(&mut self, request: &OverwriteRequest) -> Result<OverwriteAnswer> {
        (**self).ask_overwrite(request)
    }

    fn prepare_operation(
        &mut self,
        item_path: &str,
        is_dir: bool,
        mode: AskMode,
        position: Option<u64>,
    ) {
        (**self).prepare_operation(item_path, is_dir, mode, position)
    }

    fn message_error(&mut self, error: &ItemError) {
        (**self).message_error(error)
    }

    fn set_operation_result(&mut self, result: OperationResult, encrypted: bool) -> Result<()> {
        (**self).set_operation_result(result, encrypted)
    }

    fn get_password(&mut self) -> Result<Option<String>> {
        (**self).get_password()
    }
}

/// Decides which items are extracted at all
///
/// Closures `Fn(&str, bool) -> bool` taking the raw item path and the
/// directory flag implement this trait.
pub trait PathFilter {
    /// Whether the item should be processed
    fn accept(&self, item_path: &str, is_dir: bool) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&str, bool) -> bool,
{
    fn accept(&self, item_path: &str, is_dir: bool) -> bool {
        self(item_path, is_dir)
    }
}

/// Filter that accepts every item
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl PathFilter for AcceptAll {
    fn accept(&self, _item_path: &str, _is_dir: bool) -> bool {
        true
    }
}
