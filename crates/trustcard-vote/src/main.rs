//! Trust Card Vote binary
//!
//! Runs a scripted voting session against the in-memory network and prints
//! the resulting page as JSON.

use std::sync::Arc;

use trustcard_core::{Side, WEI_PER_TRUST};
use trustcard_protocols::{memory::MemoryNetwork, IdentityMetadata, StakeOrchestrator};
use trustcard_vote::{VoteConfig, VotePage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trustcard_vote=info,trustcard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = VoteConfig::from_env()?;
    tracing::info!(chain_id = config.chain_id, account = %config.demo_account, "Starting Trust Card Vote");

    let net = Arc::new(MemoryNetwork::new());
    let alice = net.add_claim("Alice", WEI_PER_TRUST / 50, 0);
    let bob = net.add_claim("Bob", WEI_PER_TRUST / 10, WEI_PER_TRUST / 20);
    net.add_atom("Carol", 2 * WEI_PER_TRUST);
    if let Some((support, _)) = net.vaults_of(&bob) {
        net.add_position("0x00000000000000000000000000000000000000b2", support, WEI_PER_TRUST);
    }
    net.connect(&config.demo_account, config.chain_id);

    let orchestrator = StakeOrchestrator::new(
        Arc::clone(&net),
        Arc::clone(&net),
        config.orchestrator(net.predicate_id(), net.object_id()),
    );
    let mut page = VotePage::new(orchestrator);
    page.load().await;

    page.handle_upvote(alice, "0.05").await;
    // Rejected locally: the wallet now holds support on Alice
    page.handle_downvote(alice, "0.05").await;
    page.handle_downvote(bob, "0.03").await;

    let preview = page.preview(bob, Side::Oppose, "1").await;
    tracing::info!(preview, "Preview for 1 TRUST on Bob's oppose vault");

    let hits = page.search("car").await;
    if let Some(hit) = hits.first() {
        page.use_existing(&hit.atom.display_label(), hit.atom.term_id);
    } else {
        page.handle_create_identity("Carol", "", IdentityMetadata::default()).await;
    }
    let subject = page.pending_subject().map(|s| s.term_id);
    page.handle_create_claim(subject, "0.02").await;

    println!("{}", serde_json::to_string_pretty(&page.view().await)?);
    Ok(())
}
