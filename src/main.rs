use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pod_route::config::{CliArgs, Command, Config};
use pod_route::exec::SystemRunner;
use pod_route::vm::lima::LimaVm;
use pod_route::{Context, PodRouting, RoutingStatus};

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    let config = match Config::load(&cli_args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over the configured level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runner = Arc::new(SystemRunner);
    let mut vm = LimaVm::new(runner.clone(), &config.profile).with_interface(config.interface.clone());
    if let Some(instance) = &config.instance {
        vm = vm.with_instance(instance.clone());
    }
    tracing::debug!("Using Lima instance {} for profile {}", vm.instance(), config.profile);
    let routing = PodRouting::new(runner, Arc::new(vm));

    // Ctrl-C cancels whatever command is in flight
    let (ctx, cancel) = Context::new(config.command_timeout);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    match cli_args.command {
        Command::Setup => match routing.setup_for_profile(&ctx, &config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::warn!("{}", e);
                eprintln!("{}", e.user_message());
                ExitCode::FAILURE
            }
        },
        Command::Cleanup => match routing.cleanup_for_profile(&ctx, &config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::warn!("{}", e);
                ExitCode::FAILURE
            }
        },
        Command::Status { json } => {
            let status = routing.status_for_profile(&ctx, &config).await;
            if json {
                match serde_json::to_string_pretty(&status) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_status(&status);
            }
            ExitCode::SUCCESS
        }
    }
}

fn print_status(status: &RoutingStatus) {
    println!("profile:         {}", status.profile);
    println!("platform:        {}", status.platform);
    println!("enabled:         {}", status.enabled);
    match (&status.vm_address, &status.vm_address_error) {
        (Some(addr), _) => println!("vm address:      {}", addr),
        (None, Some(e)) => println!("vm address:      unavailable ({})", e),
        (None, None) => println!("vm address:      unavailable"),
    }
    match (&status.pod_cidr, &status.pod_cidr_error) {
        (Some(cidr), _) => println!("pod cidr:        {}", cidr),
        (None, Some(e)) => println!("pod cidr:        unavailable ({})", e),
        (None, None) => println!("pod cidr:        unavailable"),
    }
    println!("route installed: {}", status.route_installed);
}
