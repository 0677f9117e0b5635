use clap::{Args, Parser, Subcommand};
use spesr_lib::features::auth::{GuardDecision, Registration};
use spesr_lib::features::expenses::{format_expense_amount, ExpenseDraft, PictureUpload};
use spesr_lib::features::migrations::{MigrationService, RevertScope};
use spesr_lib::features::stores::UpdateFilter;
use spesr_lib::shared::config::{
    catalog_db_path, initialize_logging_system, load_environment_variables,
};
use spesr_lib::shared::database::open_catalog;
use spesr_lib::shared::errors::{AppError, AppResult, ErrorSeverity};
use spesr_lib::App;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spesr", version, about = "経費管理クライアント")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// スキーママイグレーション
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// ログイン（--register で先にアカウントを作成）
    Login(LoginArgs),
    /// ログアウト
    Logout,
    /// ログイン中のアカウントを表示
    Whoami,
    /// パスに対するルートガードの判定を表示
    Guard { pathname: String },
    /// 経費
    #[command(subcommand)]
    Expenses(ExpensesCommand),
    /// ファイルのURLを表示
    FileUrl {
        collection_id: String,
        record_id: String,
        filename: String,
    },
}

#[derive(Debug, Subcommand)]
enum MigrateCommand {
    /// 未適用のマイグレーションを全て適用
    Up,
    /// 適用済みのマイグレーションを取り消す
    Down {
        #[arg(long, default_value_t = 1, conflicts_with = "all")]
        steps: usize,
        #[arg(long)]
        all: bool,
    },
    /// 適用状態を表示
    Status,
}

#[derive(Debug, Args)]
struct LoginArgs {
    #[arg(long, env = "SPESR_EMAIL")]
    email: String,
    #[arg(long, env = "SPESR_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    register: bool,
    #[arg(long, requires = "register")]
    name: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ExpensesCommand {
    /// 経費を一覧表示
    List {
        #[arg(long)]
        id: Option<String>,
    },
    /// 経費を作成（所有者はログイン中のアカウント）
    Create(CreateExpenseArgs),
    /// 経費を削除
    Delete { id: String },
}

#[derive(Debug, Args)]
struct CreateExpenseArgs {
    #[arg(long)]
    customer: String,
    #[arg(long)]
    expense_type: String,
    #[arg(long)]
    amount: f64,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    company_credit_card: bool,
    #[arg(long)]
    picture: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    load_environment_variables();
    initialize_logging_system();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        if e.severity() >= ErrorSeverity::High {
            log::error!("コマンドの実行に失敗しました: {e}");
        } else {
            log::warn!("コマンドの実行に失敗しました: {e}");
        }
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(command: Command) -> AppResult<()> {
    match command {
        Command::Migrate(command) => migrate(command),
        Command::Login(args) => {
            let app = App::from_env()?;
            let registration = args.register.then(|| Registration {
                name: args.name,
                extra: serde_json::Map::new(),
            });
            let user = app.auth.login(&args.email, &args.password, registration).await?;
            println!("ログインしました: {} ({})", user.email, user.id);
            Ok(())
        }
        Command::Logout => {
            App::from_env()?.auth.logout()?;
            println!("ログアウトしました");
            Ok(())
        }
        Command::Whoami => {
            match App::from_env()?.auth.current_user() {
                Some(user) => println!("{} ({}) role={}", user.email, user.id, user.role),
                None => println!("ログインしていません"),
            }
            Ok(())
        }
        Command::Guard { pathname } => {
            match App::from_env()?.auth.guard(&pathname)? {
                GuardDecision::Stay => println!("stay"),
                GuardDecision::Redirect(target) => println!("redirect {target}"),
            }
            Ok(())
        }
        Command::Expenses(command) => expenses(command).await,
        Command::FileUrl {
            collection_id,
            record_id,
            filename,
        } => {
            let app = App::from_env()?;
            println!("{}", app.records.file_url(&collection_id, &record_id, &filename));
            Ok(())
        }
    }
}

fn migrate(command: MigrateCommand) -> AppResult<()> {
    let db_path = catalog_db_path();
    let mut conn = open_catalog(&db_path)?;
    let backup_dir = db_path
        .parent()
        .map(|dir| dir.join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"));
    let service = MigrationService::new()?.with_backup_dir(backup_dir);

    match command {
        MigrateCommand::Up => {
            let result = service.run_pending(&mut conn)?;
            println!("{}", result.message);
        }
        MigrateCommand::Down { steps, all } => {
            let scope = if all {
                RevertScope::All
            } else {
                RevertScope::Steps(steps)
            };
            let result = service.revert(&mut conn, scope)?;
            println!("{}", result.message);
        }
        MigrateCommand::Status => {
            println!("{}", service.status(&conn)?);
        }
    }
    Ok(())
}

async fn expenses(command: ExpensesCommand) -> AppResult<()> {
    let app = App::from_env()?;

    match command {
        ExpensesCommand::List { id } => {
            let filter = id.map_or_else(UpdateFilter::all, UpdateFilter::record);
            let report = app.loader.refresh_all(&filter).await;
            if !report.is_complete() {
                log::warn!("一部のコレクションを取得できませんでした: {:?}", report.failed);
            }

            for expense in app.stores().expenses.snapshot().iter() {
                let expand = expense.expand.as_ref();
                let type_name = expand
                    .and_then(|e| e.expense_type.as_ref())
                    .map(|t| t.record.name.as_str())
                    .unwrap_or_default();
                let customer = expand
                    .and_then(|e| e.customer.as_ref())
                    .map(|c| c.record.name.as_str())
                    .unwrap_or_default();
                println!(
                    "{}  {}  {:<20} {:<20} {}",
                    expense.id(),
                    expense.record.datetime,
                    customer,
                    type_name,
                    format_expense_amount(expense.record.amount, type_name)
                );
            }
        }
        ExpensesCommand::Create(args) => {
            let user = app
                .auth
                .current_user()
                .ok_or_else(|| AppError::authentication("ログインしていません"))?;
            let picture = args
                .picture
                .as_deref()
                .map(PictureUpload::from_path)
                .transpose()?;
            let draft = ExpenseDraft {
                datetime: chrono::Utc::now(),
                customer: args.customer,
                expense_type: args.expense_type,
                description: args.description,
                amount: args.amount,
                company_credit_card: args.company_credit_card,
                user: user.id,
                picture,
            };
            let created = app.expenses.create_expense(&draft).await?;
            println!("経費を作成しました: {}", created.id());
        }
        ExpensesCommand::Delete { id } => {
            app.expenses.delete_expense(&id).await?;
            println!("経費を削除しました: {id}");
        }
    }
    Ok(())
}
