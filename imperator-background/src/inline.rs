use imperator::{BackgroundOptions, BackgroundProcessor, Dispatchable, ProcessorError};

/// 同步处理器：`commit` 时立即在调用线程执行动作
///
/// 动作错误作为处理器错误返回，可 `downcast_ref` 还原为原始类型。
/// 投递选项被忽略。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineBackgroundProcessor;

impl BackgroundProcessor for InlineBackgroundProcessor {
    fn commit(
        &self,
        command: &dyn Dispatchable,
        _options: &BackgroundOptions,
    ) -> Result<(), ProcessorError> {
        tracing::debug!(command = command.name(), id = %command.id(), "running command inline");
        command.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imperator::attribute::AttributeType;
    use imperator::{Command, CommandContext, CommandDefinition, CommandInstance, CommitError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[derive(Default)]
    struct Exploding {
        runs: Arc<AtomicUsize>,
    }

    impl Command for Exploding {
        const NAME: &'static str = "exploding";
        type Output = ();
        type Error = Boom;

        fn define(def: &mut CommandDefinition) {
            def.attribute("explode", AttributeType::Boolean).default(false);
        }

        fn action(&self, command: &CommandInstance<Self>) -> Result<(), Boom> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match command.get_as::<bool>("explode") {
                Ok(Some(true)) => Err(Boom),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn commit_runs_the_action_immediately() {
        let ctx = CommandContext::new(Arc::new(InlineBackgroundProcessor));
        let runs = Arc::new(AtomicUsize::new(0));
        let cmd = ctx.instance_with(Exploding { runs: runs.clone() }, [("explode", false)]);

        cmd.commit().unwrap();
        cmd.commit().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn action_errors_surface_as_processor_errors() {
        let ctx = CommandContext::new(Arc::new(InlineBackgroundProcessor));
        let cmd: CommandInstance<Exploding> = ctx.instance([("explode", "yes")]);

        let err = cmd.commit().unwrap_err();
        assert!(err.downcast_ref::<Boom>().is_some());

        match cmd.commit_checked() {
            Err(CommitError::Processor(err)) => assert!(err.is::<Boom>()),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
