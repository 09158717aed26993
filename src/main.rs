// sc-toolkit CLI
//
// Scaffold, compile and deploy smart contracts, and generate typed callers
// for their functions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deployer::{prepare, Deployer, Network, NodeClient};
use log::{info, warn};
use protogen::{CallerGenerator, Protoc, Target};
use sc_toolkit::compiler::{BuildTarget, Compiler, CompilerConfig};
use sc_toolkit::config::{ConfigManager, DeployConfig, Environment};
use sc_toolkit::project::{ProjectInitializer, Template};
use sc_toolkit::proto::{fetch_proto_files, generate_callers, HelperPlugin};

/// Smart contract toolkit
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new contract project
    Init {
        /// npm package name, also used as the directory name
        name: String,

        /// Template directory to copy instead of the built-in template
        #[clap(short, long)]
        template: Option<PathBuf>,

        /// Parent directory of the project
        #[clap(short, long, default_value = ".")]
        dir: PathBuf,

        #[clap(long, default_value = "npm")]
        package_manager: String,

        /// Do not install dependencies
        #[clap(long)]
        skip_install: bool,
    },

    /// Compile every contract of a project
    Compile {
        #[clap(short, long, default_value = ".")]
        project: PathBuf,

        /// Build with `--target debug`
        #[clap(long)]
        debug: bool,

        /// Skip bytecode validation of the outputs
        #[clap(long)]
        no_validate: bool,

        /// Only print the build order
        #[clap(long)]
        dry_run: bool,
    },

    /// Deploy the contracts listed in a configuration file
    Deploy {
        #[clap(short, long, default_value = "deploy.json")]
        config: PathBuf,

        /// Validate and print the datastore without sending anything
        #[clap(long)]
        dry_run: bool,

        /// Return once the node accepted the operation
        #[clap(long)]
        no_wait: bool,

        /// mainnet or buildnet; overrides the configured node and chain id
        #[clap(long)]
        network: Option<Network>,
    },

    /// Generate a default deploy configuration file
    Config {
        #[clap(short, long, default_value = "deploy.json")]
        output: PathBuf,
    },

    /// Typed callers from .proto files
    #[clap(subcommand)]
    Proto(ProtoCommands),
}

#[derive(Subcommand)]
enum ProtoCommands {
    /// Generate callers from local .proto files
    Generate {
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// ts or as
        #[clap(short, long, default_value = "ts")]
        target: String,

        #[clap(short, long, default_value = "callers")]
        out: PathBuf,

        /// Default contract address baked into the callers
        #[clap(short, long)]
        address: Option<String>,

        /// protoc plugin generating the message helpers
        #[clap(long)]
        helpers_plugin: Option<PathBuf>,

        #[clap(long, default_value = "protoc")]
        protoc: PathBuf,

        /// Extra import directories
        #[clap(short = 'I', long)]
        include: Vec<PathBuf>,
    },

    /// Download the .proto files a deployed contract stores
    Fetch {
        address: String,

        #[clap(short, long, default_value = "protos")]
        out: PathBuf,

        /// Node URL, defaults to JSON_RPC_URL_PUBLIC or the configured node
        #[clap(long, conflicts_with = "network")]
        node: Option<String>,

        /// mainnet or buildnet
        #[clap(long)]
        network: Option<Network>,

        /// Also generate callers for this target (ts or as)
        #[clap(short, long)]
        target: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init {
            name,
            template,
            dir,
            package_manager,
            skip_install,
        } => {
            let template = template.map(Template::Directory).unwrap_or(Template::Builtin);
            let report = ProjectInitializer::new(template)
                .package_manager(package_manager)
                .skip_install(skip_install)
                .init(&dir, &name)
                .context("Failed to initialize project")?;

            println!("Created {} ({} files)", report.root.display(), report.files);
            if !report.installed {
                println!("Run `npm install` in {} before building", report.root.display());
            }
            Ok(())
        }

        Commands::Compile {
            project,
            debug,
            no_validate,
            dry_run,
        } => {
            let mut config = CompilerConfig::new(project);
            config.validate = !no_validate;
            if debug {
                config.target = BuildTarget::Debug;
            }
            let compiler = Compiler::new(config);

            if dry_run {
                for entry in compiler.plan().context("Failed to plan compilation")? {
                    println!("{} -> {}", entry.source.display(), entry.output.display());
                }
                return Ok(());
            }

            let compiled = compiler.compile_all().context("Compilation failed")?;
            for contract in &compiled {
                match &contract.summary {
                    Some(summary) => println!("{} ({} bytes)", contract.entry.output.display(), summary.size),
                    None => println!("{}", contract.entry.output.display()),
                }
            }
            println!("Compiled {} contract(s)", compiled.len());
            Ok(())
        }

        Commands::Deploy {
            config,
            dry_run,
            no_wait,
            network,
        } => deploy(&config, dry_run, no_wait, network).await,

        Commands::Config { output } => {
            ConfigManager::save_to_file(&DeployConfig::default(), &output)
                .context("Failed to save configuration")?;
            println!("Default configuration saved to {:?}", output);
            Ok(())
        }

        Commands::Proto(ProtoCommands::Generate {
            files,
            target,
            out,
            address,
            helpers_plugin,
            protoc,
            include,
        }) => {
            let target: Target = target.parse()?;
            let protoc = include
                .into_iter()
                .fold(Protoc::new(protoc), |protoc, dir| protoc.include(dir));
            let mut generator = CallerGenerator::new(target);
            if let Some(address) = address {
                generator = generator.with_address(address);
            }
            let helpers = helpers_plugin.map(|plugin| HelperPlugin { plugin });

            let written = generate_callers(&protoc, &files, &generator, &out, helpers.as_ref())
                .context("Failed to generate callers")?;
            println!("Generated {} {} caller(s) in {}", written.len(), target, out.display());
            Ok(())
        }

        Commands::Proto(ProtoCommands::Fetch {
            address,
            out,
            node,
            network,
            target,
        }) => {
            let env = Environment::from_env();
            let url = match (node, network) {
                (Some(url), _) => url,
                (None, Some(network)) => network.url().to_string(),
                (None, None) => env.node_url(&DeployConfig::default()).to_string(),
            };
            let client = NodeClient::new(&url).context("Failed to create node client")?;
            info!("Using node {}", client.url());

            let files = fetch_proto_files(&client, &address, &out)
                .await
                .with_context(|| format!("Failed to fetch .proto files of {}", address))?;
            println!("Fetched {} .proto file(s) into {}", files.len(), out.display());

            if let Some(target) = target {
                let target: Target = target.parse()?;
                let generator = CallerGenerator::new(target).with_address(address);
                let written = generate_callers(&Protoc::default(), &files, &generator, &out, None)
                    .context("Failed to generate callers")?;
                println!("Generated {} {} caller(s) in {}", written.len(), target, out.display());
            }
            Ok(())
        }
    }
}

async fn deploy(config_path: &Path, dry_run: bool, no_wait: bool, network: Option<Network>) -> Result<()> {
    let config = ConfigManager::load_from_file(config_path).context("Failed to load configuration")?;
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));

    let contracts = config.load_contracts(base).context("Failed to load contracts")?;
    let deployer_path = config.deployer_path(base);
    let deployer_bytecode = fs::read(&deployer_path)
        .with_context(|| format!("Failed to read deployer bytecode {}", deployer_path.display()))?;

    if dry_run {
        let prepared = prepare(&deployer_bytecode, &contracts).context("Invalid deployment")?;
        for contract in &prepared.contracts {
            println!(
                "#{}: {} bytes, args {}, coins {} MAS{}",
                contract.index,
                contract.size,
                contract
                    .args_len
                    .map(|len| format!("{} bytes", len))
                    .unwrap_or_else(|| "none".to_string()),
                contract.coins,
                if contract.has_constructor { "" } else { ", no constructor" }
            );
        }
        println!(
            "Datastore: {} entries, {} bytes; total coins {} MAS",
            prepared.datastore.len(),
            prepared.datastore_size(),
            prepared.total_coins
        );
        return Ok(());
    }

    let env = Environment::from_env();
    let keypair = env.keypair()?;
    let url = network.map_or_else(|| env.node_url(&config), |network| network.url());
    let client = NodeClient::new(url).context("Failed to create node client")?;
    info!("Using node {}", client.url());

    let mut options = config.options();
    if let Some(network) = network {
        options.chain_id = Some(network.chain_id());
    }
    if no_wait {
        options.wait = None;
    }

    let deployer = Deployer::new(client, keypair);
    println!("Deploying {} contract(s) from {}", contracts.len(), deployer.address());
    let outcome = deployer
        .deploy(&deployer_bytecode, &contracts, &options)
        .await
        .context("Deployment failed")?;

    println!("Operation {}", outcome.operation_id);
    for event in &outcome.events {
        println!("  {}", event);
    }
    if outcome.deployed_addresses.is_empty() && options.wait.is_some() {
        warn!("Operation executed but no contract address was reported");
    }
    for address in &outcome.deployed_addresses {
        println!("Deployed {}", address);
    }
    if outcome.is_final {
        println!("Operation is final");
    }
    Ok(())
}
