use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use rolebridge::prelude::*;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// In-memory host
// ---------------------------------------------------------------------------

/// Stand-in for the host's permission store.
#[derive(Default)]
struct Grants {
    held: HashSet<(LocalUserId, String)>,
}

impl GrantTable for Grants {
    fn has_grant(&self, user: LocalUserId, node: &str) -> bool {
        self.held.contains(&(user, node.to_string()))
    }

    fn set_grant(&mut self, user: LocalUserId, node: &str, granted: bool) {
        tracing::info!(%user, node, granted, "grant changed");
        if granted {
            self.held.insert((user, node.to_string()));
        } else {
            self.held.remove(&(user, node.to_string()));
        }
    }
}

/// Stand-in for the chat platform's guild roles. Unknown accounts start
/// with no roles.
#[derive(Default)]
struct Guild {
    roles: Mutex<HashMap<RemoteAccountId, BTreeSet<String>>>,
}

impl RoleDirectory for Guild {
    async fn get_roles(&self, account: &RemoteAccountId) -> Result<BTreeSet<String>, SyncError> {
        let roles = self.roles.lock().map_err(|_| SyncError::Remote {
            account: account.clone(),
            reason: "guild state poisoned".into(),
        })?;
        Ok(roles.get(account).cloned().unwrap_or_default())
    }

    async fn set_roles(
        &self,
        account: &RemoteAccountId,
        roles: BTreeSet<String>,
    ) -> Result<(), SyncError> {
        tracing::info!(%account, ?roles, "guild roles set");
        let mut guild = self.roles.lock().map_err(|_| SyncError::Remote {
            account: account.clone(),
            reason: "guild state poisoned".into(),
        })?;
        guild.insert(account.clone(), roles);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Usage: `rolebridge-loopback [config.json] [player-uuid]`
///
/// Without a config file the gateway stays disabled (no OAuth credentials)
/// and only the sync loop runs. Without a player id a random one is used.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config: BridgeConfig = match args.next() {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => BridgeConfig::default(),
    };
    let player: LocalUserId = match args.next() {
        Some(id) => id.parse()?,
        None => LocalUserId::new_random(),
    };
    let mut grants = Grants::default();
    for role in config.governed_roles.iter() {
        grants
            .held
            .insert((player, permission_node(&config.permission_prefix, role)));
    }

    let dispatcher = TaskDispatcher::start(grants, DispatchConfig::default());
    let mut bridge = RoleBridge::start(config, dispatcher.clone(), Guild::default()).await?;

    // Keep the sender alive so the relay runs for the life of the demo.
    let (_role_events, rx) = mpsc::channel::<RemoteRoleEvent>(32);
    bridge.relay_role_events(rx);

    match bridge.sign_up_url(player).await {
        Ok(url) => println!("Link player {player}: {url}"),
        Err(e) => println!("Linking unavailable: {e}"),
    }
    if let Ok(url) = bridge.bot_invite_url() {
        println!("Invite the bot: {url}");
    }
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;

    bridge.shutdown().await;
    dispatcher.shutdown().await?;
    Ok(())
}
