use super::{BackgroundProcessor, Dispatchable};
use crate::error::ProcessorError;
use crate::options::BackgroundOptions;

/// 空处理器：不执行、不记录
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackgroundProcessor;

impl BackgroundProcessor for NullBackgroundProcessor {
    fn commit(
        &self,
        _command: &dyn Dispatchable,
        _options: &BackgroundOptions,
    ) -> Result<(), ProcessorError> {
        Ok(())
    }
}
