use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use clap::Args;
use client::auth_form::AuthForm;
use client::{Navigation, Route, SessionError, guard};
use rpassword::prompt_password;

use super::context::{AppContext, report_invalid};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email (prompted when omitted)
    #[arg(long, short)]
    pub email: Option<String>,

    /// Read the password from the first line of stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Account email (prompted when omitted)
    #[arg(long, short)]
    pub email: Option<String>,

    /// Display name (prompted when omitted)
    #[arg(long, short)]
    pub name: Option<String>,

    /// Read the password from the first line of stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

pub async fn login(ctx: &mut AppContext, args: LoginArgs) -> Result<()> {
    if already_signed_in(ctx, Route::Login).await {
        return Ok(());
    }
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = read_password(args.password_stdin)?;
    submit(ctx, AuthForm::login(email, password)).await
}

pub async fn register(ctx: &mut AppContext, args: RegisterArgs) -> Result<()> {
    if already_signed_in(ctx, Route::Register).await {
        return Ok(());
    }
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let name = match args.name {
        Some(name) => name,
        None => prompt("Full name: ")?,
    };
    let password = read_password(args.password_stdin)?;
    submit(ctx, AuthForm::register(email, name, password)).await
}

pub fn logout(ctx: &mut AppContext) -> Result<()> {
    if !ctx.session.logout() {
        println!("Not signed in.");
    }
    ctx.flush_notices();
    Ok(())
}

pub async fn whoami(ctx: &mut AppContext) -> Result<()> {
    let session = ctx.require_session().await?;
    let Some(user) = session.user() else {
        bail!("no profile loaded");
    };
    println!("{} <{}>", user.full_name, user.email);
    println!(
        "  status: {}",
        if user.is_active { "Active" } else { "Inactive" }
    );
    println!("  member since: {}", user.created_at.0.format("%Y-%m-%d"));
    Ok(())
}

/// Public pages send a signed-in user to the dashboard; here that means
/// there is nothing to do.
async fn already_signed_in(ctx: &mut AppContext, route: Route) -> bool {
    let session = ctx.session.bootstrap().await;
    ctx.flush_notices();
    match (guard(route, session.status()), session.user()) {
        (Navigation::Redirect(_), Some(user)) => {
            println!(
                "Already signed in as {} <{}>. Run `todo logout` first to switch accounts.",
                user.full_name, user.email
            );
            true
        }
        _ => false,
    }
}

async fn submit(ctx: &mut AppContext, form: AuthForm) -> Result<()> {
    let result = form.submit(&ctx.session).await;
    ctx.settle().await;
    match result {
        Ok(session) => match session.user() {
            Some(user) if session.is_authenticated() => {
                println!("Signed in as {} <{}>", user.full_name, user.email);
                Ok(())
            }
            _ => bail!("signed in, but the profile could not be loaded"),
        },
        Err(SessionError::Validation(errors)) => Err(report_invalid(&errors)),
        Err(err) => Err(err).context("authentication failed"),
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

fn read_password(from_stdin: bool) -> Result<String> {
    let password = if from_stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read password from stdin")?;
        line.trim_end_matches(['\r', '\n']).to_string()
    } else {
        prompt_password("Password: ").context("failed to read password")?
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}
