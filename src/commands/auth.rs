use anyhow::{anyhow, Result};

use crate::commands::App;
use crate::models::{LoginCredentials, RegisterCredentials};
use crate::utils::{passwords_match, validate_password};

pub async fn login(app: &App, credentials: LoginCredentials) -> Result<()> {
    let remember_me = credentials.remember_me;
    let user = app.client.login(&credentials).await?;
    let session = app.session.save(user, remember_me)?;
    tracing::info!(email = %session.user.email, "Logged in");
    println!(
        "Logged in as {} {} (session valid until {})",
        session.user.first_name,
        session.user.last_name,
        session.expires_at.format("%Y-%m-%d")
    );
    Ok(())
}

pub async fn register(app: &App, credentials: RegisterCredentials, confirmation: &str) -> Result<()> {
    if !credentials.accept_terms {
        return Err(anyhow!("The terms of use must be accepted"));
    }
    if !passwords_match(&credentials.password, confirmation) {
        return Err(anyhow!("Passwords do not match"));
    }
    let validation = validate_password(&credentials.password);
    if !validation.is_valid {
        return Err(anyhow!(validation.errors.join("\n")));
    }

    let user = app.client.register(&credentials).await?;
    let session = app.session.save(user, false)?;
    println!("Account created for {}", session.user.email);
    Ok(())
}

/// The local session is cleared even when the backend call fails.
pub async fn logout(app: &App) -> Result<()> {
    let remote = app.client.logout().await;
    app.session.clear()?;
    if let Err(err) = remote {
        tracing::warn!(error = %err, "Backend logout failed");
    }
    println!("Logged out");
    Ok(())
}
