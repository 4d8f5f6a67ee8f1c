//! 用法：seed-users <username> <email> <password> [--admin]

use std::process::ExitCode;

use clap::Parser;

use student_registry::{
    config::Config,
    database::{
        RecordStore,
        repositories::{NewUser, UserRepository},
    },
    error::AppError,
    routes::user::RegisterRequest,
    utils::hash_password_blocking,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 直接向数据文件写入用户（管理员只能通过这里创建）
#[derive(Debug, Parser)]
#[command(name = "seed-users", version)]
struct SeedArgs {
    username: String,
    email: String,
    password: String,
    /// 创建管理员账号
    #[arg(long)]
    admin: bool,
}

impl SeedArgs {
    fn registration(&self) -> RegisterRequest {
        RegisterRequest {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            email: Some(self.email.clone()),
        }
    }
}

async fn seed(config: &Config, args: SeedArgs) -> Result<(), AppError> {
    let valid = args.registration().validate()?;
    let password_hash = hash_password_blocking(valid.password, config.bcrypt_cost).await?;
    let store = RecordStore::new(config.data_file.clone());
    let user = UserRepository::create(
        &store,
        NewUser {
            username: valid.username,
            email: valid.email,
            password_hash,
            is_admin: args.admin,
        },
    )
    .await?;
    println!(
        "created user {} (id {}, admin: {}) in {}",
        user.username,
        user.id,
        user.is_admin,
        store.path().display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = SeedArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match seed(&config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Validation(errors)) => {
            for e in errors {
                eprintln!("{}: {}", e.field, e.message);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
