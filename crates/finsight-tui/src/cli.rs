//! Non-interactive commands: `status`, `login <email>` and `logout`.
//!
//! These share the session store with the TUI, so signing in here signs in
//! the next TUI launch too.

use anyhow::{bail, Context, Result};

use finsight_core::auth;
use finsight_core::{ApiClient, AuthSession, Config, Credential, SessionState};

pub const USAGE: &str = "\
Usage: finsight [COMMAND]

Without a command, starts the terminal UI.

Commands:
  status          Show whether a session is stored on this device
  login <email>   Sign in; the password is prompted for
  logout          Forget the stored session";

fn open_session(config: &Config) -> Result<AuthSession> {
    let store = auth::open_store(config).context("Failed to open session store")?;
    let api = ApiClient::new(config).context("Failed to create HTTP client")?;
    Ok(AuthSession::start(store, api))
}

pub fn status(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    match session.state() {
        SessionState::Authenticated(identity) => {
            println!("Signed in as {} <{}>", identity.display_name(), identity.email);
        }
        _ => println!("Not signed in"),
    }
    println!("Server: {}", config.api_base());
    Ok(())
}

pub async fn login(config: &Config, email: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let session = open_session(config)?;

    match session.login(Credential::new(email, password)).await {
        Ok(identity) => {
            println!("Signed in as {}", identity.display_name());
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

pub fn logout(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    session.logout();
    println!("Signed out");
    Ok(())
}
