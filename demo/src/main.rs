use imperator::attribute::AttributeType;
use imperator::processor::TestBackgroundProcessor;
use imperator::validation::{Present, Satisfies};
use imperator::{
    Attributes, ClosureCommand, Command, CommandContext, CommandDefinition, CommandInstance,
    PerformError,
};
use imperator_background::{TokioBackgroundProcessor, TokioProcessorConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

type Ledger = Arc<Mutex<HashMap<String, i64>>>;

#[derive(Debug, thiserror::Error)]
enum AccountError {
    #[error("account not opened: {0}")]
    NotOpened(String),
    #[error("insufficient funds: account={account}, balance={balance}, amount={amount}")]
    InsufficientFunds {
        account: String,
        balance: i64,
        amount: i64,
    },
}

/// 所有资金类命令共享的声明
#[derive(Default)]
struct MoneyCommand;

impl Command for MoneyCommand {
    const NAME: &'static str = "money";
    type Output = ();
    type Error = AccountError;

    fn define(def: &mut CommandDefinition) {
        def.attribute("account", AttributeType::String);
        def.attribute("amount", AttributeType::Integer);
        def.attribute("currency", AttributeType::String).default("CNY");
        def.background([("queue", "ledger")]);
        def.validate("account_present", Present("account"));
        def.validate(
            "amount_positive",
            Satisfies::new("amount", |v| v.as_i64().is_some_and(|amount| amount > 0)),
        );
    }

    fn action(&self, _command: &CommandInstance<Self>) -> Result<(), AccountError> {
        Ok(())
    }
}

#[derive(Default)]
struct Deposit {
    ledger: Ledger,
}

impl Command for Deposit {
    const NAME: &'static str = "deposit";
    type Output = i64;
    type Error = AccountError;

    fn define(def: &mut CommandDefinition) {
        def.inherit::<MoneyCommand>();
    }

    fn action(&self, command: &CommandInstance<Self>) -> Result<i64, AccountError> {
        let account: String = command.get_as("account").ok().flatten().unwrap_or_default();
        let amount: i64 = command.get_as("amount").ok().flatten().unwrap_or_default();
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let balance = ledger
            .get_mut(&account)
            .ok_or_else(|| AccountError::NotOpened(account.clone()))?;
        *balance += amount;
        tracing::info!(account = %account, amount, balance = *balance, "deposited");
        Ok(*balance)
    }
}

#[derive(Default)]
struct Withdraw {
    ledger: Ledger,
}

impl Command for Withdraw {
    const NAME: &'static str = "withdraw";
    type Output = i64;
    type Error = AccountError;

    fn define(def: &mut CommandDefinition) {
        def.inherit::<MoneyCommand>();
        def.background([("queue", "ledger-critical")]);
    }

    fn action(&self, command: &CommandInstance<Self>) -> Result<i64, AccountError> {
        let account: String = command.get_as("account").ok().flatten().unwrap_or_default();
        let amount: i64 = command.get_as("amount").ok().flatten().unwrap_or_default();
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let balance = ledger
            .get_mut(&account)
            .ok_or_else(|| AccountError::NotOpened(account.clone()))?;
        if *balance < amount {
            return Err(AccountError::InsufficientFunds {
                account,
                balance: *balance,
                amount,
            });
        }
        *balance -= amount;
        tracing::info!(account = %account, amount, balance = *balance, "withdrawn");
        Ok(*balance)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let ledger: Ledger = Arc::new(Mutex::new(HashMap::new()));
    let open = ClosureCommand::new("open_account", {
        let ledger = ledger.clone();
        move |attributes: &Attributes| -> Result<(), AccountError> {
            let account: String = attributes.get_as("account").ok().flatten().unwrap_or_default();
            ledger
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entry(account)
                .or_insert(0);
            Ok(())
        }
    })
    .define(|def| {
        def.attribute("account", AttributeType::String);
        def.validate("account_present", Present("account"));
    });

    // 同步执行
    open.instance([("account", "acc-1")]).perform_checked()?;
    let deposit = CommandInstance::with_handler(
        Deposit { ledger: ledger.clone() },
        [("account", "acc-1"), ("amount", "100"), ("memo", "ignored")],
    );
    println!("balance after deposit: {}", deposit.perform_checked()?);

    // 校验失败：动作不会执行
    let bad = CommandInstance::with_handler(
        Withdraw { ledger: ledger.clone() },
        [("account", serde_json::json!("acc-1")), ("amount", serde_json::json!(-5))],
    );
    if let Err(PerformError::Invalid(err)) = bad.perform_checked() {
        println!("rejected: {err} (failed: {:?})", err.failed());
    }

    // 动作错误原样返回
    let overdraw = CommandInstance::with_handler(
        Withdraw { ledger: ledger.clone() },
        [("account", serde_json::json!("acc-1")), ("amount", serde_json::json!(1_000))],
    );
    match overdraw.perform_checked() {
        Err(PerformError::Action(err)) => println!("action failed: {err}"),
        other => println!("unexpected: {other:?}"),
    }

    // 记录型处理器：只记录，不执行
    let recorder = Arc::new(TestBackgroundProcessor::new());
    let recording = CommandContext::new(recorder.clone());
    let queued = recording.instance_with(
        Withdraw { ledger: ledger.clone() },
        [("account", "acc-1"), ("amount", "30")],
    );
    queued.commit_checked_with([("priority", "high")])?;
    for record in recorder.commits() {
        println!("recorded: {}", serde_json::to_string(&record)?);
    }

    // tokio 处理器：后台执行
    let config = TokioProcessorConfig::builder().max_concurrency(4).build();
    let processor = Arc::new(TokioBackgroundProcessor::from_current(config)?);
    let background = CommandContext::new(processor.clone());
    for amount in [10, 20, 30] {
        background
            .instance_with(
                Deposit { ledger: ledger.clone() },
                [("account", serde_json::json!("acc-1")), ("amount", serde_json::json!(amount))],
            )
            .commit_checked()?;
    }
    for result in processor.drain().await {
        if let Err(err) = result {
            tracing::error!(error = %err, "background deposit failed");
        }
    }

    let balance = ledger
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get("acc-1")
        .copied()
        .unwrap_or_default();
    println!("final balance: {balance}");
    Ok(())
}
