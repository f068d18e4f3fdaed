//! Server entry point.

use clap::Parser;
use journal_core::{open_db, AccountService, SqliteAccountRepository};
use journal_server::config::{Args, Command};
use journal_server::{build_router, AppState, CookieSettings};
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Err(err) = journal_core::init_logging(args.log_level(), args.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=server status=error error={err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    args.validate()?;
    let tokens = args.token_service()?;
    let conn = open_db(&args.database_path)?;

    if let Some(Command::CreateSuperuser { email, password }) = &args.command {
        let accounts = AccountService::new(SqliteAccountRepository::try_new(&conn)?, tokens);
        let user = accounts.create_superuser(email, password)?;
        info!(
            "event=create_superuser module=server status=ok user_id={}",
            user.id
        );
        println!("created superuser {}", user.email);
        return Ok(());
    }

    {
        let accounts =
            AccountService::new(SqliteAccountRepository::try_new(&conn)?, tokens.clone());
        let purged = accounts.purge_expired_tokens()?;
        info!("event=token_purge module=server status=ok removed={purged}");
    }

    if args.dev_mode {
        info!("event=dev_mode module=server status=ok");
    }

    let state = AppState::new(
        conn,
        tokens,
        CookieSettings {
            secure: args.jwt_cookie_secure,
        },
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(
        "event=server_start module=server status=ok listen={} db={}",
        args.listen,
        args.database_path.display()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=shutdown_signal module=server status=error error={err}");
    }
}
