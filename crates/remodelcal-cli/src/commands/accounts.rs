//! Account commands.

use chrono::{DateTime, Utc};
use serde::Serialize;

use remodelcal_core::{CalendarAccount, ProviderKind};

use super::{Context, print_json};
use crate::cli::AccountAction;
use crate::error::{CliError, CliResult};

/// An account as printed; tokens are never shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub provider: ProviderKind,
    pub account_id: String,
    pub color: String,
    pub is_primary: bool,
    pub sync_enabled: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl AccountView {
    pub fn new(account: &CalendarAccount, now: DateTime<Utc>) -> Self {
        Self {
            provider: account.provider,
            account_id: account.account_id.clone(),
            color: account.display_color().to_string(),
            is_primary: account.is_primary,
            sync_enabled: account.sync_enabled,
            connected: account.is_connected(now),
            expires_at: account.expires_at,
            scopes: account.scopes.clone(),
        }
    }
}

impl std::fmt::Display for AccountView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<8} {}", self.provider.as_str(), self.account_id)?;
        if self.is_primary {
            f.write_str(" [primary]")?;
        }
        if !self.sync_enabled {
            f.write_str(" [sync off]")?;
        }
        if !self.connected {
            f.write_str(" [reconnect needed]")?;
        }
        Ok(())
    }
}

pub async fn run(context: &Context, action: AccountAction, json: bool) -> CliResult<()> {
    let service = context.accounts();
    let now = Utc::now();
    let (heading, accounts) = match action {
        AccountAction::List { user } => ("", service.list(&user).await?),
        AccountAction::Connect {
            user,
            provider,
            code,
            redirect_uri,
        } => (
            "Connected",
            vec![service.connect(&user, provider, &code, &redirect_uri).await?],
        ),
        AccountAction::ConnectApple {
            user,
            apple_id,
            password,
        } => {
            let password = crate::secret::resolve(&password).map_err(CliError::invalid)?;
            (
                "Connected",
                vec![service.connect_apple(&user, &apple_id, &password).await?],
            )
        }
        AccountAction::Disconnect { user, provider } => {
            ("Disconnected", vec![service.disconnect(&user, provider).await?])
        }
        AccountAction::Enable { user, provider } => (
            "Sync enabled",
            vec![service.set_sync_enabled(&user, provider, true).await?],
        ),
        AccountAction::Disable { user, provider } => (
            "Sync disabled",
            vec![service.set_sync_enabled(&user, provider, false).await?],
        ),
        AccountAction::Primary { user, provider } => {
            ("Primary", vec![service.set_primary(&user, provider).await?])
        }
    };

    let views: Vec<AccountView> = accounts.iter().map(|a| AccountView::new(a, now)).collect();
    if json {
        return print_json(&views);
    }
    if views.is_empty() {
        println!("No calendars connected.");
    }
    for view in &views {
        if heading.is_empty() {
            println!("{}", view);
        } else {
            println!("{}: {}", heading, view);
        }
    }
    Ok(())
}
