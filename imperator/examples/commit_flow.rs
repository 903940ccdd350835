use imperator::attribute::AttributeType;
use imperator::command::{Command, CommandInstance};
use imperator::context::CommandContext;
use imperator::definition::CommandDefinition;
use imperator::error::PerformError;
use imperator::processor::TestBackgroundProcessor;
use imperator::validation::{Present, Validator};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
enum SignupError {
    #[error("email already taken: {0}")]
    Taken(String),
}

#[derive(Default)]
struct Signup;

impl Command for Signup {
    const NAME: &'static str = "signup";
    type Output = String;
    type Error = SignupError;

    fn define(def: &mut CommandDefinition) {
        def.attribute("email", AttributeType::String);
        def.attribute("plan", AttributeType::String).default("free");
        def.attribute("seats", AttributeType::Integer).default(1);
        def.background([("queue", "signups")]);
        def.validate(
            "email_present",
            Present("email").and(|a: &imperator::Attributes| {
                a.get_as::<String>("email")
                    .ok()
                    .flatten()
                    .is_some_and(|e| e.contains('@'))
            }),
        );
    }

    fn action(&self, command: &CommandInstance<Self>) -> Result<String, SignupError> {
        let email: String = command.get_as("email").ok().flatten().unwrap_or_default();
        if email.starts_with("admin@") {
            return Err(SignupError::Taken(email));
        }
        let plan: String = command.get_as("plan").ok().flatten().unwrap_or_default();
        Ok(format!("{email} signed up on {plan}"))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 同步执行
    let cmd = CommandInstance::<Signup>::new([("email", "alice@example.com"), ("source", "ad")]);
    println!("{}", cmd.perform_checked()?);

    // 未通过校验 -> 动作不会执行
    let cmd = CommandInstance::<Signup>::new([("email", "nope")]);
    if let Err(PerformError::Invalid(err)) = cmd.perform_checked() {
        eprintln!("rejected as expected: {err}");
    }

    // 提交到记录型处理器
    let recorder = Arc::new(TestBackgroundProcessor::new());
    let ctx = CommandContext::new(recorder.clone());
    let cmd: CommandInstance<Signup> = ctx.instance([("email", "bob@example.com"), ("seats", "3")]);
    cmd.commit_checked_with([("priority", 5)])?;

    for record in recorder.commits() {
        println!("{}", serde_json::to_string(&record)?);
    }
    for result in recorder.perform_all() {
        result?;
    }
    Ok(())
}
