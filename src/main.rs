/*!
 * Lifecycle Daemon - Main Entry Point
 *
 * Runs the lifecycle kernel against real OS processes:
 * - Task requests are read from stdin, one JSON document per line
 * - `{"registered": "<app id>"}` on stdin reports a native app registration
 * - Task replies are written to stdout, one JSON document per line
 * - Outbound bus messages go to a loopback peer that acknowledges them
 */

use app_lifecycle::{
    init_tracing, ChannelTransport, EventBus, FnCheck, GateResult, LifecycleConfig,
    LifecycleService, OsProcessController, PrerequisiteGate, StagePipelineEngine,
    StandardChains, StaticAppDirectory, TaskRequest,
};
use miette::{miette, IntoDiagnostic};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// One line of stdin input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Registered { registered: String },
    Request(TaskRequest),
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    info!("Lifecycle kernel starting...");
    let config = LifecycleConfig::from_env();
    let strict_boot = config.strict_boot;

    let apps = match &config.apps_path {
        Some(path) => StaticAppDirectory::from_manifest(path)?,
        None => {
            warn!("LIFECYCLE_APPS_PATH not set, starting with an empty app directory");
            StaticAppDirectory::new()
        }
    };
    let manifest_loaded = config.apps_path.is_none() || !apps.is_empty();

    let bus = EventBus::new();
    let _event_log = bus.subscribe(|event| info!(?event, "lifecycle event"));

    let chains = StandardChains::new(&config)?;
    let (transport, outbound) = ChannelTransport::new();
    let engine = StagePipelineEngine::builder()
        .with_config(config)
        .with_apps(Arc::new(apps))
        .with_transport(transport)
        .with_process_controller(OsProcessController::new())
        .with_event_bus(bus.clone())
        .gated()
        .build();
    let service = LifecycleService::spawn(engine, chains);

    let mut gate = PrerequisiteGate::new(|result| info!(?result, "prerequisite gate resolved"))
        .with_events(bus.clone());
    gate.register(FnCheck::predicate("app-manifest", move || manifest_loaded))?;
    gate.register(FnCheck::predicate("process-controller", || cfg!(unix)))?;

    match service.bootstrap(gate).await? {
        GateResult::Passed => {}
        GateResult::Failed if strict_boot => {
            service.shutdown().await?;
            return Err(miette!("prerequisite checks failed and LIFECYCLE_STRICT_BOOT is set"));
        }
        GateResult::Failed => {
            warn!("continuing in degraded mode");
            service.set_ready(true)?;
        }
    }

    info!("Lifecycle kernel ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received");
                break;
            }

            envelope = outbound.recv_async() => {
                let Ok(envelope) = envelope else { break };
                debug!(token = %envelope.token, method = %envelope.request.method, "loopback peer acknowledging");
                service.external_reply(envelope.token, json!({ "returnValue": true }))?;
            }

            line = lines.next_line(), if stdin_open => {
                match line.into_diagnostic()? {
                    None => stdin_open = false,
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match serde_json::from_str::<Inbound>(&line) {
                        Ok(Inbound::Registered { registered }) => {
                            service.app_registered(registered)?;
                        }
                        Ok(Inbound::Request(request)) => {
                            let reply = service.submit(request)?;
                            tokio::spawn(async move {
                                if let Ok(reply) = reply.await {
                                    match serde_json::to_string(&reply) {
                                        Ok(doc) => println!("{}", doc),
                                        Err(e) => warn!(error = %e, "failed to encode reply"),
                                    }
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "ignoring malformed request"),
                    },
                }
            }
        }
    }

    let (_, cancelled) = service.shutdown().await?;
    info!(cancelled, "Lifecycle kernel stopped");
    Ok(())
}
