// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Health, Init, Pins, Run, Version};

command_enum! {
    (Run, Run),
    (Init, Init),
    (Pins, Pins),
    (Health, Health),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = cli::op::OpContext::new(args.api_url, args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
