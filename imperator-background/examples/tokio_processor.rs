use imperator::attribute::AttributeType;
use imperator::{Command, CommandContext, CommandDefinition, CommandInstance};
use imperator_background::{TokioBackgroundProcessor, TokioProcessorConfig};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct SendReminder;

impl Command for SendReminder {
    const NAME: &'static str = "send_reminder";
    type Output = ();
    type Error = Infallible;

    fn define(def: &mut CommandDefinition) {
        def.attribute("user_id", AttributeType::Integer);
        def.attribute("channel", AttributeType::String).default("email");
        def.background([("queue", "reminders")]);
    }

    fn action(&self, command: &CommandInstance<Self>) -> Result<(), Infallible> {
        let user_id: i64 = command.get_as("user_id").ok().flatten().unwrap_or_default();
        let channel: String = command.get_as("channel").ok().flatten().unwrap_or_default();
        std::thread::sleep(Duration::from_millis(10));
        println!("[{}] reminder sent to user {user_id} via {channel}", command.id());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TokioProcessorConfig::builder()
        .max_concurrency(2)
        .build();
    let processor = Arc::new(TokioBackgroundProcessor::from_current(config)?);
    let ctx = CommandContext::new(processor.clone());

    for user_id in 1..=4 {
        let cmd: CommandInstance<SendReminder> = ctx.instance([("user_id", user_id)]);
        cmd.commit()?;
    }

    // 延迟 50ms 投递
    let cmd: CommandInstance<SendReminder> = ctx.instance([
        ("user_id", serde_json::json!(99)),
        ("channel", serde_json::json!("sms")),
    ]);
    cmd.commit_with([("delay_ms", 50)])?;

    println!("pending: {}", processor.pending());
    for result in processor.drain().await {
        result?;
    }
    processor.close();
    Ok(())
}
