use clap::{Arg, Command};
use tokio::sync::watch;
use tracing::info;

mod config;
mod error;
mod node;

use component::ComponentKind;
use config::SystemConfig;
use error::Result;
use node::ComponentNode;
use registry::RegistryServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("eventmesh")
        .version("0.1.0")
        .about("Distributed multi-protocol component runtime")
        .arg(
            Arg::new("component")
                .help("Component type to start: gateway | componentA | componentB")
                .required(false),
        )
        .arg(
            Arg::new("instance")
                .help("Instance number (default: 1)")
                .required(false),
        )
        .get_matches();

    let component_type = matches
        .get_one::<String>("component")
        .map(|value| value.to_lowercase())
        .unwrap_or_else(|| "gateway".to_string());

    let instance = match matches.get_one::<String>("instance") {
        None => 1,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                print_usage();
                std::process::exit(1);
            }
        },
    };

    let config = SystemConfig::load();

    match component_type.as_str() {
        "gateway" => run_gateway(&config).await,
        "componenta" => run_component(ComponentKind::A, instance, &config).await,
        "componentb" => run_component(ComponentKind::B, instance, &config).await,
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn run_component(kind: ComponentKind, instance: u32, config: &SystemConfig) -> Result<()> {
    let node = ComponentNode::new(kind, instance, config).await?;
    node.run_until_shutdown().await
}

async fn run_gateway(config: &SystemConfig) -> Result<()> {
    info!("Starting the API gateway registry");

    let server = RegistryServer::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    server
        .run(&config.gateway_host(), config.registration_port(), shutdown_rx)
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping the gateway");
    let _ = shutdown_tx.send(true);
    Ok(())
}

fn print_usage() {
    println!("Uso: eventmesh [tipoComponente] [numeroInstancia]");
    println!("  onde tipoComponente é um dos seguintes:");
    println!("    gateway     - Inicia o Gateway de API");
    println!("    componentA  - Inicia uma instância do Componente A");
    println!("    componentB  - Inicia uma instância do Componente B");
    println!("  numeroInstancia é opcional (padrão: 1):");
    println!("    1          - Primeira instância do componente");
    println!("    2          - Segunda instância do componente");
}
