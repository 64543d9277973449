//! Reward & Integrity Engine demo
//!
//! Runs the engine end to end against an in-memory store for a handful of
//! canned scenarios (a pioneer-phase honest user, a bot-like session, a
//! referral network promotion) and prints each resulting outcome.
//!
//! Usage:
//!   cargo run --bin finengine-demo -- --scenario pioneer
//!   cargo run --bin finengine-demo -- --scenario bot
//!   cargo run --bin finengine-demo -- --scenario referral

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, ValueEnum};

use finengine::antibot::{BehavioralSample, StubAnomalyScorer};
use finengine::config::EngineConfig;
use finengine::demo::InMemoryStore;
use finengine::event::{
    ActivityEventWire, ActivityKind, ConnectionType, ContentPayload, DeviceDescriptor,
    NetworkDescriptor, Platform,
};
use finengine::store::{NetworkState, StateStore};
use finengine::Engine;

#[derive(ValueEnum, Clone, Debug)]
enum Scenario {
    /// Pioneer-phase, KYC-verified, good-quality content, no referrals.
    Pioneer,
    /// Uniform click cadence, short session, all-night activity.
    Bot,
    /// A user with 30 active direct referrals, promoted to Influencer.
    Referral,
}

#[derive(Parser, Debug)]
#[command(name = "finengine-demo")]
#[command(about = "Run the reward & integrity engine against canned scenarios")]
struct Cli {
    #[arg(long, value_enum, default_value = "pioneer")]
    scenario: Scenario,
}

fn honest_sample(user_id: &str) -> BehavioralSample {
    BehavioralSample {
        user_id: user_id.to_string(),
        click_intervals_ms: vec![400, 900, 650, 1200, 300, 800],
        session_start: Utc::now(),
        session_end: Utc::now() + chrono::Duration::minutes(35),
        hour_histogram: {
            let mut h = [0.02; 24];
            for i in 8..20 {
                h[i] = 0.08;
            }
            h
        },
        device_id: "device-1".into(),
        distinct_devices_30d: 1,
        primary_device_share: 0.95,
        mutual_connections: 12,
        connection_age_days: 200,
        content_hash: None,
    }
}

fn bot_sample(user_id: &str) -> BehavioralSample {
    let mut hist = [0.0; 24];
    hist[2] = 0.7;
    hist[3] = 0.3;
    BehavioralSample {
        user_id: user_id.to_string(),
        click_intervals_ms: vec![500, 500, 500, 500, 500, 500],
        session_start: Utc::now(),
        session_end: Utc::now() + chrono::Duration::seconds(1),
        hour_histogram: hist,
        device_id: "device-farm-9".into(),
        distinct_devices_30d: 6,
        primary_device_share: 0.1,
        mutual_connections: 0,
        connection_age_days: 1,
        content_hash: None,
    }
}

fn wire(user_id: &str, event_id: &str) -> ActivityEventWire {
    ActivityEventWire {
        event_id: event_id.to_string(),
        user_id: user_id.to_string(),
        kind: ActivityKind::Post,
        platform: Platform::Instagram,
        timestamp: Utc::now(),
        content: Some(ContentPayload {
            text_hash: "h1".into(),
            text: Some("A beautiful sunrise over the mountains today! #travel #nature".into()),
            media_descriptor: None,
        }),
        device: DeviceDescriptor {
            fingerprint_hex: "deadbeef".into(),
            primary: true,
        },
        network_descriptor: NetworkDescriptor {
            country: "USA".into(),
            connection_type: ConnectionType::Residential,
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("finengine_demo=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    let store = Arc::new(InMemoryStore::new(
        NetworkState {
            total_users: 50_000,
            daily_reward_pool: 1_000_000.0,
            last_refresh: Utc::now(),
        },
        config.active_referral_window_days,
    ));
    let engine = Engine::new(store.clone(), Arc::new(StubAnomalyScorer::default()), config);

    match cli.scenario {
        Scenario::Pioneer => {
            store.get_user("alice").await?;
            let outcome = engine.submit_activity(wire("alice", "E1"), honest_sample("alice")).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Scenario::Bot => {
            store.get_user("mallory").await?;
            let outcome = engine
                .submit_activity(wire("mallory", "E1"), bot_sample("mallory"))
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Scenario::Referral => {
            store.get_user("dana").await?;
            for i in 0..30 {
                let referee = format!("referee-{i}");
                store.get_user(&referee).await?;
                store.set_direct_referrer(&referee, "dana").await?;
                store
                    .update_user(
                        &referee,
                        Box::new(|acc| {
                            acc.xp_total = finengine::numeric::Fixed::from_f64(2_000.0);
                            acc.recompute_derived();
                            Ok(())
                        }),
                    )
                    .await?;
            }
            let result = engine.recompute_referral_tier("dana").await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
