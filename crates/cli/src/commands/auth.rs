//! Session commands.

use secrecy::SecretString;
use tracing::info;

use shopfront_client::{ClientError, Registration, Shop};
use shopfront_core::format_money;

/// Log in and persist the session.
///
/// # Errors
///
/// Returns an error if the credentials are rejected or the session cannot be
/// saved.
#[allow(clippy::print_stdout)]
pub async fn login(shop: &Shop, username: &str, password: &str) -> Result<(), ClientError> {
    let snapshot = shop.login(username, password).await?;
    println!(
        "Logged in as {} ({})",
        snapshot.username.as_deref().unwrap_or(username),
        snapshot.display_role().label()
    );
    Ok(())
}

/// Create an account.
///
/// # Errors
///
/// Returns an error if the form is invalid or the backend refuses it.
#[allow(clippy::print_stdout)]
pub async fn register(
    shop: &Shop,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> Result<(), ClientError> {
    let profile = shop
        .register(Registration {
            username,
            email,
            password: SecretString::from(password),
            first_name,
            last_name,
        })
        .await?;
    println!("Account {} created. Log in to start shopping.", profile.username);
    Ok(())
}

/// Forget the session.
///
/// # Errors
///
/// Returns an error if the session file cannot be written.
pub fn logout(shop: &Shop) -> Result<(), ClientError> {
    shop.logout()?;
    info!("Session cleared");
    Ok(())
}

/// Show the current session and, for customers, the wallet balance.
///
/// # Errors
///
/// Returns an error if the profile cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn whoami(shop: &Shop) -> Result<(), ClientError> {
    let snapshot = shop.session().snapshot();
    let Some(user_id) = snapshot.user_id.as_ref() else {
        println!("Not logged in");
        return Ok(());
    };

    println!(
        "{} (id {user_id}, {})",
        snapshot.username.as_deref().unwrap_or("unknown"),
        snapshot.display_role().label()
    );

    if snapshot.is_customer() {
        let profile = shop.current_user().await?;
        println!("Wallet: {}", format_money(profile.wallet));
    }
    Ok(())
}
